//! Decides whether a file is a valid, fully decodable image.
//!
//! Decoders are registered on a [`Classifier`]; each one recognises a header
//! and validates the whole file. The first decoder whose `sniff` accepts the
//! header prefix gets to validate. Files no decoder recognises are rejected
//! without being read past the prefix, so videos are never loaded whole.

pub mod heif;
pub mod raster;

use std::fmt;
use std::path::Path;

use crate::fs::FileSystem;
use crate::{Report, ReportCallback};

/// Bytes read from the start of a file for header sniffing.
pub const HEAD_LEN: usize = 512;

/// Error returned by a decoder that rejected a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub decoder: &'static str,
    pub reason: String,
}

impl DecodeError {
    pub fn new(decoder: &'static str, reason: impl Into<String>) -> Self {
        Self {
            decoder,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.decoder, self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// A pluggable image container decoder.
pub trait ContainerDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this decoder recognises the header prefix.
    fn sniff(&self, head: &[u8]) -> bool;

    /// Validate the complete file. Decoded content must not be retained.
    fn validate(&self, bytes: &[u8]) -> Result<(), DecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Image { decoder: &'static str },
    Rejected { reason: String },
}

impl Classification {
    pub fn is_image(&self) -> bool {
        matches!(self, Classification::Image { .. })
    }
}

pub struct Classifier {
    decoders: Vec<Box<dyn ContainerDecoder>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Classifier {
    /// A classifier with no decoders; rejects everything.
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// HEIF/HEIC first (its `ftyp` header would otherwise be claimed by the
    /// raster sniffer for AVIF), then every raster format `image` decodes.
    pub fn with_defaults() -> Self {
        let mut classifier = Self::empty();
        classifier.register(heif::HeifDecoder);
        classifier.register(raster::RasterDecoder::default());
        classifier
    }

    pub fn register(&mut self, decoder: impl ContainerDecoder + 'static) {
        self.decoders.push(Box::new(decoder));
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    pub fn classify<F: FileSystem + ?Sized>(&self, fs: &F, path: &Path) -> Classification {
        match self.inspect(fs, path) {
            Ok((decoder, _)) => Classification::Image { decoder },
            Err(reason) => Classification::Rejected { reason },
        }
    }

    /// Classify and report rejections. Never fails.
    pub fn is_valid_image<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        path: &Path,
        report: &ReportCallback,
    ) -> bool {
        self.load_image(fs, path, report).is_some()
    }

    /// Like [`Classifier::is_valid_image`], but hands back the bytes that were
    /// validated so callers do not read the file a second time.
    pub fn load_image<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        path: &Path,
        report: &ReportCallback,
    ) -> Option<Vec<u8>> {
        match self.inspect(fs, path) {
            Ok((_, bytes)) => Some(bytes),
            Err(reason) => {
                report(&Report::ImageRejected {
                    path: path.to_path_buf(),
                    reason,
                });
                None
            }
        }
    }

    /// Sniff the header, then read and validate the whole file with the first
    /// decoder that recognised it.
    fn inspect<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        path: &Path,
    ) -> Result<(&'static str, Vec<u8>), String> {
        let head = fs
            .read_prefix(path, HEAD_LEN)
            .map_err(|e| format!("unreadable: {}", e))?;

        let decoder = self
            .decoders
            .iter()
            .find(|d| d.sniff(&head))
            .ok_or_else(|| "unrecognized image format".to_string())?;

        let bytes = fs
            .read(path)
            .map_err(|e| format!("unreadable: {}", e))?;
        decoder.validate(&bytes).map_err(|e| e.to_string())?;
        Ok((decoder.name(), bytes))
    }
}
