use std::io::Cursor;

use image::{ImageReader, Limits};

use super::{ContainerDecoder, DecodeError};

/// Every format the `image` crate can decode (JPEG, PNG, GIF, WebP, TIFF, BMP, ...).
/// Validation is a full pixel decode; the decoded buffer is dropped immediately.
///
/// The default runs without `image`'s allocation limits: a large panorama or
/// 16-bit TIFF is still a valid photo and must keep its EXIF date.
pub struct RasterDecoder {
    limits: Limits,
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::with_limits(Limits::no_limits())
    }
}

impl RasterDecoder {
    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }
}

impl ContainerDecoder for RasterDecoder {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn sniff(&self, head: &[u8]) -> bool {
        image::guess_format(head).is_ok()
    }

    fn validate(&self, bytes: &[u8]) -> Result<(), DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::new(self.name(), e.to_string()))?;
        if reader.format().is_none() {
            return Err(DecodeError::new(self.name(), "unrecognized image format"));
        }
        reader.limits(self.limits.clone());
        reader
            .decode()
            .map(drop)
            .map_err(|e| DecodeError::new(self.name(), e.to_string()))
    }
}
