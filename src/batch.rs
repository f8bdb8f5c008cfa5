//! Compress, verify and retain: the file manager behind the CLI and GUI.
//!
//! [`FileManager::process_file`] compresses one file, verifies the result
//! and then keeps exactly one of the two files according to the
//! [`Retention`] policy. [`FileManager::process_path`] does the same for a
//! single file or for every TIFF below a directory, reporting progress to a
//! [`ProgressSink`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compress::{is_compressed_output, CompressionMethod, CompressionStats, TiffCompressorManager};
use crate::error::{BatchError, IoError};
use crate::io::{find_tiff_files, move_into, remove_file};
use crate::verify::{log_report, TiffVerifier, VerificationReport};

pub const NO_FILES_MESSAGE: &str = "No TIFF files found in the selected folder.";

const SEPARATOR: &str = "--------------------------------------------------";

// =============================================================================
// Retention
// =============================================================================

/// What happens to the file that is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Retention {
    /// Remove it permanently.
    #[default]
    Delete,
    /// Move it into this directory.
    Backup(PathBuf),
    /// Leave both files in place.
    KeepBoth,
}

impl Retention {
    /// Build a policy from a mode name (`delete`, `backup`, `keep-both`)
    /// and an optional backup directory.
    pub fn from_parts(mode: &str, backup_dir: Option<PathBuf>) -> Result<Self, String> {
        match (mode.trim().to_ascii_lowercase().as_str(), backup_dir) {
            ("delete", None) => Ok(Retention::Delete),
            ("keep-both" | "keep_both" | "keepboth", None) => Ok(Retention::KeepBoth),
            ("backup", Some(dir)) => Ok(Retention::Backup(dir)),
            ("backup", None) => Err("backup retention requires a backup directory".to_string()),
            ("delete" | "keep-both" | "keep_both" | "keepboth", Some(_)) => {
                Err("a backup directory is only valid with backup retention".to_string())
            }
            (other, _) => Err(format!(
                "unknown retention '{other}' (expected delete, backup or keep-both)"
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Retention::Delete => "delete",
            Retention::Backup(_) => "backup",
            Retention::KeepBoth => "keep-both",
        }
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Progress notifications emitted while processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { total: usize },
    /// `index` is 1-based.
    FileStarted { index: usize, total: usize, path: PathBuf },
    Percent(u8),
    Log(String),
    Finished,
}

/// Receiver of [`ProgressEvent`]s.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Adapts a closure into a [`ProgressSink`].
pub struct FnProgress<F>(pub F);

impl<F: FnMut(ProgressEvent)> ProgressSink for FnProgress<F> {
    fn emit(&mut self, event: ProgressEvent) {
        (self.0)(event);
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of compressing, verifying and retaining one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub compressed: PathBuf,
    pub stats: CompressionStats,
    /// `None` when verification itself failed to run
    pub report: Option<VerificationReport>,
    pub verified: bool,
    /// The file that remains as the canonical copy
    pub kept: PathBuf,
    /// Where the discarded file was moved, under [`Retention::Backup`]
    pub backup: Option<PathBuf>,
    pub verify_error: Option<String>,
    pub retention_error: Option<String>,
}

/// A file that could not be compressed at all.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Aggregate result of a [`FileManager::process_path`] run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
    pub skipped: Vec<PathBuf>,
    pub log: Vec<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.verified).count()
    }

    pub fn failed(&self) -> usize {
        self.failures.len() + self.files.iter().filter(|f| !f.verified).count()
    }

    /// True when every processed file compressed and verified.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} verified, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped.len()
        )
    }
}

/// Forwards events to the caller's sink and keeps log lines for the report.
struct Recorder<'a> {
    sink: &'a mut dyn ProgressSink,
    log: Vec<String>,
}

impl Recorder<'_> {
    fn emit(&mut self, event: ProgressEvent) {
        self.sink.emit(event);
    }

    fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.log.push(line.clone());
        self.sink.emit(ProgressEvent::Log(line));
    }
}

// =============================================================================
// FileManager
// =============================================================================

/// Drives the compress, verify and retain workflow.
#[derive(Debug, Clone)]
pub struct FileManager {
    method: CompressionMethod,
    retention: Retention,
}

impl FileManager {
    pub fn new(method: CompressionMethod) -> Self {
        Self {
            method,
            retention: Retention::default(),
        }
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn method(&self) -> CompressionMethod {
        self.method
    }

    pub fn retention(&self) -> &Retention {
        &self.retention
    }

    /// Process one file, reporting 33/66/100 percent.
    ///
    /// A compression failure is an error. A failed or errored verification
    /// is recorded in the outcome and the original is kept.
    pub fn process_file(
        &self,
        path: impl AsRef<Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<FileOutcome, BatchError> {
        let mut recorder = Recorder {
            sink,
            log: Vec::new(),
        };
        recorder.emit(ProgressEvent::Started { total: 1 });
        let outcome = self.run_single(path.as_ref(), &mut recorder, true)?;
        recorder.emit(ProgressEvent::Finished);
        Ok(outcome)
    }

    /// Process a single file or every TIFF below a directory.
    pub fn process_path(
        &self,
        path: impl AsRef<Path>,
        sink: &mut dyn ProgressSink,
    ) -> Result<BatchReport, BatchError> {
        let path = path.as_ref();
        let mut recorder = Recorder {
            sink,
            log: Vec::new(),
        };

        let mut report = if path.is_dir() {
            self.run_directory(path, &mut recorder)?
        } else if path.is_file() {
            recorder.emit(ProgressEvent::Started { total: 1 });
            let outcome = self.run_single(path, &mut recorder, true)?;
            BatchReport {
                files: vec![outcome],
                ..BatchReport::default()
            }
        } else {
            return Err(IoError::NotFound(path.display().to_string()).into());
        };

        recorder.emit(ProgressEvent::Finished);
        report.log = recorder.log;
        info!(path = %path.display(), summary = %report, "Batch finished");
        Ok(report)
    }

    fn run_directory(&self, dir: &Path, recorder: &mut Recorder<'_>) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport::default();
        let (files, skipped): (Vec<_>, Vec<_>) = find_tiff_files(dir, true)?
            .into_iter()
            .partition(|p| !is_compressed_output(p));
        for path in &skipped {
            debug!(path = %path.display(), "Skipping compressed output");
        }
        report.skipped = skipped;

        let total = files.len();
        recorder.emit(ProgressEvent::Started { total });
        if total == 0 {
            recorder.log(NO_FILES_MESSAGE);
            return Ok(report);
        }

        for (i, path) in files.iter().enumerate() {
            let index = i + 1;
            recorder.emit(ProgressEvent::FileStarted {
                index,
                total,
                path: path.clone(),
            });
            recorder.emit(ProgressEvent::Percent(percent(index, total)));

            match self.run_single(path, recorder, false) {
                Ok(outcome) => report.files.push(outcome),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Error processing file");
                    recorder.log(format!("Error processing {}: {e}", display_name(path)));
                    recorder.log(SEPARATOR);
                    report.failures.push(FileFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn run_single(
        &self,
        input: &Path,
        recorder: &mut Recorder<'_>,
        report_percent: bool,
    ) -> Result<FileOutcome, BatchError> {
        if report_percent {
            recorder.emit(ProgressEvent::Percent(33));
        }
        let (compressed, stats) = TiffCompressorManager::compress_file(input, self.method)?;

        if report_percent {
            recorder.emit(ProgressEvent::Percent(66));
        }
        let (report, verify_error) = match TiffVerifier::new(input, &compressed).verify_all() {
            Ok(report) => {
                log_report(input, &report);
                (Some(report), None)
            }
            Err(e) => {
                warn!(file = %input.display(), error = %e, "Verification could not run");
                (None, Some(e.to_string()))
            }
        };
        let verified = report.is_some_and(|r| r.passed());

        recorder.log(format!("File: {}", display_name(input)));
        recorder.log(format!("Compressed to: {}", display_name(&compressed)));
        recorder.log(format!("Size: {stats}"));
        recorder.log(format!(
            "Verification: {}",
            if verified { "Success" } else { "Failed" }
        ));
        if let Some(report) = &report {
            for check in report.failed_checks() {
                recorder.log(format!("- Failed: {check}"));
            }
        }
        if let Some(e) = &verify_error {
            recorder.log(format!("Verification error: {e}"));
        }

        let mut outcome = FileOutcome {
            input: input.to_path_buf(),
            compressed: compressed.clone(),
            stats,
            report,
            verified,
            kept: input.to_path_buf(),
            backup: None,
            verify_error,
            retention_error: None,
        };
        self.retain(&mut outcome, recorder);

        recorder.log(format!("Kept file: {}", display_name(&outcome.kept)));
        recorder.log(SEPARATOR);
        if report_percent {
            recorder.emit(ProgressEvent::Percent(100));
        }
        Ok(outcome)
    }

    /// Discard the losing file according to the retention policy.
    fn retain(&self, outcome: &mut FileOutcome, recorder: &mut Recorder<'_>) {
        let (keep, discard, label) = if outcome.verified {
            (outcome.compressed.clone(), outcome.input.clone(), "Original")
        } else {
            (outcome.input.clone(), outcome.compressed.clone(), "Compressed")
        };

        let result = match &self.retention {
            Retention::Delete => remove_file(&discard).map(|()| {
                recorder.log(format!("{label} file deleted: {}", display_name(&discard)));
            }),
            Retention::Backup(dir) => move_into(&discard, dir).map(|target| {
                recorder.log(format!(
                    "{label} file moved to: {}",
                    target.display()
                ));
                outcome.backup = Some(target);
            }),
            Retention::KeepBoth => {
                recorder.log(format!("{label} file left in place: {}", display_name(&discard)));
                Ok(())
            }
        };

        match result {
            Ok(()) => outcome.kept = keep,
            Err(e) => {
                warn!(path = %discard.display(), error = %e, "Error managing files");
                recorder.log(format!("Error managing files: {e}"));
                outcome.retention_error = Some(e.to_string());
                outcome.kept = outcome.input.clone();
            }
        }
    }
}

fn percent(index: usize, total: usize) -> u8 {
    (index * 100 / total.max(1)).min(100) as u8
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
