pub mod cancel;
pub mod classify;
pub mod date;
pub mod fs;
pub mod media;
pub mod relocate;
pub mod walk;

#[cfg(test)]
pub(crate) mod testutil;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::date::{DateBucket, DateSource, Resolution};
use crate::fs::{FileSystem, OsFs};
use crate::media::{MediaFile, MediaKind};
use crate::relocate::{Relocation, RelocationPlan};
use crate::walk::WalkEvent;

pub use cancel::{CancellationToken, CancelledError};

#[derive(Debug, Clone, Serialize)]
pub struct SortOptions {
    /// Root of the tree to sort
    pub source: PathBuf,
    /// Root that receives `YYYY/MM/DD/sorted_<name>`
    pub destination: PathBuf,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortResult {
    pub files_seen: u64,
    /// Files that decoded as images
    pub images: u64,
    /// By extension, see [`MediaKind`]
    #[serde(default)]
    pub videos: u64,
    #[serde(default)]
    pub others: u64,
    pub relocated: u64,
    /// Moves computed but not performed (dry run)
    pub planned: u64,
    pub dated_by_metadata: u64,
    pub dated_by_mtime: u64,
    pub failed: u64,
    #[serde(default)]
    pub failures: Vec<String>,
}

impl SortResult {
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("writing report {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("writing report {}", path.display()))?;
        Ok(())
    }
}

/// Control options for a run (cancellation).
#[derive(Debug, Clone, Default)]
pub struct SortControl {
    pub cancel_token: Option<CancellationToken>,
}

impl SortControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Progress and decision events emitted while sorting. The core never prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    DirEntered {
        path: PathBuf,
    },
    ImageRejected {
        path: PathBuf,
        reason: String,
    },
    FileStarted {
        path: PathBuf,
        is_image: bool,
        kind: MediaKind,
    },
    DateResolved {
        path: PathBuf,
        bucket: DateBucket,
        source: DateSource,
    },
    Planned {
        source: PathBuf,
        destination: PathBuf,
    },
    Moved {
        source: PathBuf,
        destination: PathBuf,
    },
    FileFailed {
        path: PathBuf,
        error: String,
    },
    WalkError {
        message: String,
    },
}

/// Type alias for the report callback
pub type ReportCallback = dyn Fn(&Report) + Send + Sync;

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub is_image: bool,
    pub resolution: Resolution,
    pub relocation: Relocation,
}

/// Dispatches each file to classifier, date resolver and relocator.
pub struct Sorter<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    options: &'a SortOptions,
    classifier: Classifier,
    report: &'a ReportCallback,
}

impl<'a, F: FileSystem + ?Sized> Sorter<'a, F> {
    pub fn new(fs: &'a F, options: &'a SortOptions, report: &'a ReportCallback) -> Self {
        Self {
            fs,
            options,
            classifier: Classifier::with_defaults(),
            report,
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Classify, resolve and relocate one file.
    pub fn process_file(&self, file: &MediaFile) -> anyhow::Result<FileOutcome> {
        let image = self
            .classifier
            .load_image(self.fs, &file.path, self.report);
        let is_image = image.is_some();
        (self.report)(&Report::FileStarted {
            path: file.path.clone(),
            is_image,
            kind: file.kind,
        });

        let resolution = match image {
            Some(bytes) => date::resolve_image_bucket(self.fs, &file.path, &bytes)?,
            None => date::resolve_bucket(self.fs, &file.path, false)?,
        };
        (self.report)(&Report::DateResolved {
            path: file.path.clone(),
            bucket: resolution.bucket,
            source: resolution.source.clone(),
        });

        let plan = RelocationPlan::new(
            &file.path,
            &file.filename,
            &resolution.bucket,
            &self.options.destination,
            self.options.dry_run,
        );
        let relocation = plan.execute(self.fs)?;
        let event = match &relocation {
            Relocation::Planned { destination } => Report::Planned {
                source: file.path.clone(),
                destination: destination.clone(),
            },
            Relocation::Moved { destination } => Report::Moved {
                source: file.path.clone(),
                destination: destination.clone(),
            },
        };
        (self.report)(&event);

        Ok(FileOutcome {
            is_image,
            resolution,
            relocation,
        })
    }

    /// Process walk events one file at a time. A failing file is reported and
    /// counted; the run continues with the next one.
    pub fn run<I>(&self, events: I, control: &SortControl) -> anyhow::Result<SortResult>
    where
        I: IntoIterator<Item = WalkEvent>,
    {
        let mut result = SortResult::default();

        for event in events {
            if let Some(ref token) = control.cancel_token {
                token.check()?;
            }

            let path = match event {
                WalkEvent::Dir(path) => {
                    (self.report)(&Report::DirEntered { path });
                    continue;
                }
                WalkEvent::Error(message) => {
                    (self.report)(&Report::WalkError {
                        message: message.clone(),
                    });
                    result.failed += 1;
                    result.failures.push(message);
                    continue;
                }
                WalkEvent::File(path) => path,
            };

            let Some(file) = MediaFile::new(path) else {
                continue;
            };
            result.files_seen += 1;
            match file.kind {
                MediaKind::Video => result.videos += 1,
                MediaKind::Other => result.others += 1,
                MediaKind::Image => {}
            }

            match self.process_file(&file) {
                Ok(outcome) => {
                    if outcome.is_image {
                        result.images += 1;
                    }
                    match outcome.resolution.source {
                        DateSource::Metadata => result.dated_by_metadata += 1,
                        DateSource::ModifiedTime(_) => result.dated_by_mtime += 1,
                    }
                    match outcome.relocation {
                        Relocation::Moved { .. } => result.relocated += 1,
                        Relocation::Planned { .. } => result.planned += 1,
                    }
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    (self.report)(&Report::FileFailed {
                        path: file.path.clone(),
                        error: error.clone(),
                    });
                    result.failed += 1;
                    result
                        .failures
                        .push(format!("{}: {}", file.path.display(), error));
                }
            }
        }

        Ok(result)
    }
}

/// Sort every file under `options.source` into `options.destination`.
pub fn sort_tree(options: &SortOptions, report: &ReportCallback) -> anyhow::Result<SortResult> {
    sort_tree_with_control(options, &SortControl::default(), report)
}

/// Like [`sort_tree`], with cancellation support.
pub fn sort_tree_with_control(
    options: &SortOptions,
    control: &SortControl,
    report: &ReportCallback,
) -> anyhow::Result<SortResult> {
    let meta = std::fs::metadata(&options.source)
        .with_context(|| format!("source directory {}", options.source.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("{} is not a directory", options.source.display());
    }

    if !options.dry_run {
        std::fs::create_dir_all(&options.destination).with_context(|| {
            format!(
                "creating destination directory {}",
                options.destination.display()
            )
        })?;
    }

    // Never revisit files already moved into a destination nested in the source
    let exclude = walk::nested_destination(&options.source, &options.destination);
    let events = walk::walk(&options.source, exclude);

    Sorter::new(&OsFs, options, report).run(events, control)
}
