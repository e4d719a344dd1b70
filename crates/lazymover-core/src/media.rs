use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Coarse file kind guessed from the extension. Only used for diagnostics and
/// summary counts; whether a file is an image is decided by decoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        match mime_guess::from_path(path).first() {
            Some(mime) if mime.type_() == mime_guess::mime::IMAGE => MediaKind::Image,
            Some(mime) if mime.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
            _ => {
                // mime_guess has no entry for some camera containers
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase);
                match ext.as_deref() {
                    Some("heic" | "heif" | "hif" | "avif") => MediaKind::Image,
                    _ => MediaKind::Other,
                }
            }
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A file discovered under the source root.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Full path as produced by the walk
    pub path: PathBuf,
    /// Just the filename, kept as an `OsString` so non-UTF-8 names survive the move
    pub filename: OsString,
    /// Kind guessed from the extension
    pub kind: MediaKind,
}

impl MediaFile {
    /// Returns `None` for paths without a final component (e.g. `/` or `..`).
    pub fn new(path: PathBuf) -> Option<Self> {
        let filename = path.file_name()?.to_os_string();
        let kind = MediaKind::from_path(&path);
        Some(Self {
            path,
            filename,
            kind,
        })
    }
}
