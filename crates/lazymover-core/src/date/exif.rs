use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;

/// EXIF DateTime (0x0132), the date the image file was last written by the camera.
pub const DATE_TIME_TAG: Tag = Tag::DateTime;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Outcome of looking for the DateTime tag in an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExifDate {
    Found(NaiveDate),
    /// No EXIF block, or an empty one
    NoMetadata,
    /// EXIF present but without a DateTime tag in the primary IFD
    TagAbsent,
    /// Tag present but its value does not parse
    Malformed(String),
    /// The container or the EXIF block itself could not be parsed
    DecodeFailure(String),
}

/// Read the DateTime tag from raw image bytes (JPEG, TIFF, HEIF, PNG, WebP).
/// EXIF datetimes have no timezone info, the date is taken as-is.
pub fn read_capture_date(bytes: &[u8]) -> ExifDate {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) | Err(exif::Error::BlankValue(_)) => {
            return ExifDate::NoMetadata
        }
        Err(e) => return ExifDate::DecodeFailure(e.to_string()),
    };

    if exif.fields().next().is_none() {
        return ExifDate::NoMetadata;
    }

    let Some(field) = exif
        .fields()
        .find(|f| f.tag == DATE_TIME_TAG && f.ifd_num == In::PRIMARY)
    else {
        return ExifDate::TagAbsent;
    };

    let raw = match &field.value {
        Value::Ascii(parts) => match parts.first() {
            Some(first) => String::from_utf8_lossy(first).into_owned(),
            None => return ExifDate::Malformed(String::new()),
        },
        other => return ExifDate::Malformed(format!("{:?}", other)),
    };

    match parse_exif_datetime(&raw) {
        Some(dt) => ExifDate::Found(dt.date()),
        None => ExifDate::Malformed(raw),
    }
}

pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT).ok()
}
