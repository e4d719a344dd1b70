use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;

/// Filesystem primitives used while sorting a single file.
///
/// Directory traversal is not part of this trait; see [`crate::walk`].
pub trait FileSystem {
    /// Read the whole file into memory.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read at most `len` bytes from the start of the file.
    fn read_prefix(&self, path: &Path, len: usize) -> io::Result<Vec<u8>>;

    /// Last modification time.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Create a directory and all missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Move a file. Never falls back to copy + delete.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_prefix(&self, path: &Path, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len);
        File::open(path)?.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

#[cfg(test)]
pub use memory::MemoryFs;
