use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::date::DateBucket;
use crate::fs::FileSystem;

/// Prefix added to every relocated filename.
pub const SORTED_PREFIX: &str = "sorted_";

/// Where a file goes and whether to actually move it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    pub source: PathBuf,
    /// Bucket directory, `dest_root/YYYY/MM/DD`
    pub directory: PathBuf,
    pub destination: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    Moved { destination: PathBuf },
    Planned { destination: PathBuf },
}

impl Relocation {
    pub fn destination(&self) -> &Path {
        match self {
            Relocation::Moved { destination } | Relocation::Planned { destination } => destination,
        }
    }
}

impl RelocationPlan {
    /// `dest_root/YYYY/MM/DD/sorted_<filename>`
    pub fn new(
        source: &Path,
        filename: &OsStr,
        bucket: &DateBucket,
        dest_root: &Path,
        dry_run: bool,
    ) -> Self {
        let mut name = OsString::from(SORTED_PREFIX);
        name.push(filename);
        let directory = dest_root.join(bucket.relative_dir());
        Self {
            source: source.to_path_buf(),
            destination: directory.join(name),
            directory,
            dry_run,
        }
    }

    /// Create the bucket directory and rename the file into it. A dry run
    /// touches nothing.
    pub fn execute<F: FileSystem + ?Sized>(&self, fs: &F) -> anyhow::Result<Relocation> {
        if self.dry_run {
            return Ok(Relocation::Planned {
                destination: self.destination.clone(),
            });
        }

        fs.create_dir_all(&self.directory)
            .with_context(|| format!("creating directory {}", self.directory.display()))?;
        fs.rename(&self.source, &self.destination).with_context(|| {
            format!(
                "moving {} to {}",
                self.source.display(),
                self.destination.display()
            )
        })?;

        Ok(Relocation::Moved {
            destination: self.destination.clone(),
        })
    }
}

/// Build the plan for one file and carry it out.
pub fn relocate<F: FileSystem + ?Sized>(
    fs: &F,
    source: &Path,
    filename: &OsStr,
    bucket: &DateBucket,
    dest_root: &Path,
    dry_run: bool,
) -> anyhow::Result<Relocation> {
    RelocationPlan::new(source, filename, bucket, dest_root, dry_run).execute(fs)
}
