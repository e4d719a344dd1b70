pub mod exif;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::Serialize;

use self::exif::ExifDate;
use crate::fs::FileSystem;

/// Destination grouping for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateBucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateBucket {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Local calendar day of a filesystem timestamp.
    pub fn from_system_time(time: SystemTime) -> Self {
        let local: DateTime<Local> = time.into();
        Self::from_date(local.date_naive())
    }

    /// Zero-padded `(YYYY, MM, DD)`.
    pub fn parts(&self) -> (String, String, String) {
        (
            format!("{:04}", self.year),
            format!("{:02}", self.month),
            format!("{:02}", self.day),
        )
    }

    /// `YYYY/MM/DD`, relative to the destination root.
    pub fn relative_dir(&self) -> PathBuf {
        let (y, m, d) = self.parts();
        [y, m, d].iter().collect()
    }
}

impl fmt::Display for DateBucket {
    /// `DD/MM/YYYY`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

/// Why metadata was not used for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    NotAnImage,
    NoMetadata,
    TagAbsent,
    Malformed(String),
    DecodeFailure(String),
    Unreadable(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NotAnImage => write!(f, "not an image"),
            FallbackReason::NoMetadata => write!(f, "no EXIF data"),
            FallbackReason::TagAbsent => write!(f, "no EXIF DateTime tag"),
            FallbackReason::Malformed(v) => write!(f, "malformed EXIF DateTime {:?}", v),
            FallbackReason::DecodeFailure(e) => write!(f, "unreadable EXIF: {}", e),
            FallbackReason::Unreadable(e) => write!(f, "could not read file: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DateSource {
    Metadata,
    ModifiedTime(FallbackReason),
}

/// Result of date resolution: bucket + where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub bucket: DateBucket,
    pub source: DateSource,
}

/// Resolve the destination bucket for a file.
///
/// For images the EXIF DateTime tag wins when present and parseable; every
/// other case falls back to the local-time modification date. Only a failure
/// to stat the file is an error.
pub fn resolve_bucket<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    is_image: bool,
) -> anyhow::Result<Resolution> {
    let reason = if is_image {
        match fs.read(path) {
            Ok(bytes) => return resolve_image_bucket(fs, path, &bytes),
            Err(e) => FallbackReason::Unreadable(e.to_string()),
        }
    } else {
        FallbackReason::NotAnImage
    };
    modified_bucket(fs, path, reason)
}

/// [`resolve_bucket`] for an image whose bytes are already in memory.
pub fn resolve_image_bucket<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    bytes: &[u8],
) -> anyhow::Result<Resolution> {
    let reason = match exif::read_capture_date(bytes) {
        ExifDate::Found(date) => {
            return Ok(Resolution {
                bucket: DateBucket::from_date(date),
                source: DateSource::Metadata,
            })
        }
        ExifDate::NoMetadata => FallbackReason::NoMetadata,
        ExifDate::TagAbsent => FallbackReason::TagAbsent,
        ExifDate::Malformed(v) => FallbackReason::Malformed(v),
        ExifDate::DecodeFailure(e) => FallbackReason::DecodeFailure(e),
    };
    modified_bucket(fs, path, reason)
}

fn modified_bucket<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    reason: FallbackReason,
) -> anyhow::Result<Resolution> {
    let modified = fs
        .modified(path)
        .with_context(|| format!("reading modification time of {}", path.display()))?;

    Ok(Resolution {
        bucket: DateBucket::from_system_time(modified),
        source: DateSource::ModifiedTime(reason),
    })
}
