use std::path::{Path, PathBuf};

use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// Entering a directory (the root included)
    Dir(PathBuf),
    /// A regular file
    File(PathBuf),
    /// An entry that could not be read; the walk continues past it
    Error(String),
}

/// Lazily walk `root` in file-name order.
///
/// Symlinks are neither followed nor reported. `exclude`, if given, is pruned
/// together with everything below it; it must be spelled with the same prefix
/// as `root`.
pub fn walk(root: &Path, exclude: Option<PathBuf>) -> impl Iterator<Item = WalkEvent> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| exclude.as_deref().map_or(true, |x| e.path() != x))
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_dir() => Some(WalkEvent::Dir(e.into_path())),
            Ok(e) if e.file_type().is_file() => Some(WalkEvent::File(e.into_path())),
            Ok(_) => None,
            Err(e) => Some(WalkEvent::Error(e.to_string())),
        })
}

/// If `dest` lies strictly inside `source`, return it spelled relative to
/// `source` as given, so it can be handed to [`walk`] as `exclude`.
pub fn nested_destination(source: &Path, dest: &Path) -> Option<PathBuf> {
    let source_canon = source.canonicalize().ok()?;
    let dest_canon = dest.canonicalize().ok()?;
    let rel = dest_canon.strip_prefix(&source_canon).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(source.join(rel))
}
