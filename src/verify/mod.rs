//! Lossless-compression verification.
//!
//! [`TiffVerifier`] compares an original TIFF with its compressed copy along
//! five independent checks:
//!
//! | Check                 | Passes when                                      |
//! |-----------------------|--------------------------------------------------|
//! | `pixel_values_match`  | shapes match and every sample is exactly equal   |
//! | `file_hash_different` | the SHA-256 of the raw files differ              |
//! | `dimensions_match`    | the declared series shapes are equal             |
//! | `metadata_matches`    | ImageJ frames/slices/channels agree              |
//! | `statistical_match`   | min, max, mean and std are exactly equal         |
//!
//! A mismatch is a `false` in the [`VerificationReport`]; only failures to
//! read or decode a file are errors.

mod diff;
mod plot;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::VerifyError;
use crate::format::imagej::{ImageJMetadata, MetadataValue};
use crate::format::tiff::TiffSeries;
use crate::io::file_digest;
use crate::stack::{read_stack, ImageStack};

pub use diff::DifferenceMap;
pub use plot::{render_verification_png, PlotInput, MAX_PANEL_EDGE, MIN_PANEL_HEIGHT};

/// ImageJ fields that must agree between original and compressed files.
pub const CRUCIAL_METADATA_FIELDS: [&str; 3] = ["frames", "slices", "channels"];

// =============================================================================
// VerificationReport
// =============================================================================

/// Outcome of the five checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub pixel_values_match: bool,
    pub file_hash_different: bool,
    pub dimensions_match: bool,
    pub metadata_matches: bool,
    pub statistical_match: bool,
}

impl VerificationReport {
    /// Check names and results, in report order.
    pub fn checks(&self) -> [(&'static str, bool); 5] {
        [
            ("pixel_values_match", self.pixel_values_match),
            ("file_hash_different", self.file_hash_different),
            ("dimensions_match", self.dimensions_match),
            ("metadata_matches", self.metadata_matches),
            ("statistical_match", self.statistical_match),
        ]
    }

    /// True only when all five checks pass.
    pub fn passed(&self) -> bool {
        self.checks().iter().all(|(_, ok)| *ok)
    }

    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks()
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect()
    }
}

// =============================================================================
// TiffVerifier
// =============================================================================

/// Compares an original TIFF against its compressed counterpart.
#[derive(Debug, Clone)]
pub struct TiffVerifier {
    original: PathBuf,
    compressed: PathBuf,
}

impl TiffVerifier {
    pub fn new(original: impl Into<PathBuf>, compressed: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            compressed: compressed.into(),
        }
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn compressed(&self) -> &Path {
        &self.compressed
    }

    /// Exact pixel equality. Different shapes fail without comparing values.
    pub fn verify_pixel_values(&self) -> Result<bool, VerifyError> {
        let (original, compressed) = self.read_stacks().map_err(VerifyError::PixelComparison)?;
        Ok(pixels_match(&original, &compressed))
    }

    /// True when the raw file contents differ, i.e. compression actually
    /// changed the encoding. The same file twice is `false`.
    pub fn verify_file_hashes(&self) -> Result<bool, VerifyError> {
        let original = file_digest(&self.original).map_err(VerifyError::FileHash)?;
        let compressed = file_digest(&self.compressed).map_err(VerifyError::FileHash)?;
        debug!(%original, %compressed, "File digests");
        Ok(original != compressed)
    }

    /// Compare the declared series shapes without decoding pixels.
    pub fn verify_dimensions(&self) -> Result<bool, VerifyError> {
        let (original, compressed) = self.open_series().map_err(VerifyError::Dimensions)?;
        Ok(original.shape == compressed.shape)
    }

    pub fn verify_metadata(&self) -> Result<bool, VerifyError> {
        let (original, compressed) = self.open_series().map_err(VerifyError::Metadata)?;
        Ok(metadata_matches(
            original.imagej.as_ref(),
            compressed.imagej.as_ref(),
        ))
    }

    pub fn verify_statistics(&self) -> Result<bool, VerifyError> {
        let (original, compressed) = self.read_stacks().map_err(VerifyError::Statistics)?;
        statistics_match(&original, &compressed)
    }

    /// Run all five checks, decoding and parsing each file once.
    pub fn verify_all(&self) -> Result<VerificationReport, VerifyError> {
        let (original, compressed) = self.read_stacks().map_err(VerifyError::PixelComparison)?;
        let (original_series, compressed_series) =
            self.open_series().map_err(VerifyError::Dimensions)?;

        let report = VerificationReport {
            pixel_values_match: pixels_match(&original, &compressed),
            file_hash_different: self.verify_file_hashes()?,
            dimensions_match: original_series.shape == compressed_series.shape,
            metadata_matches: metadata_matches(
                original_series.imagej.as_ref(),
                compressed_series.imagej.as_ref(),
            ),
            statistical_match: statistics_match(&original, &compressed)?,
        };

        debug!(
            original = %self.original.display(),
            compressed = %self.compressed.display(),
            report = ?report,
            "Verification finished"
        );
        Ok(report)
    }

    /// `original - compressed` for one frame.
    pub fn generate_difference_map(&self, frame: usize) -> Result<DifferenceMap, VerifyError> {
        let (original, compressed) = self.read_stacks().map_err(VerifyError::PixelComparison)?;
        DifferenceMap::compute(&original, &compressed, frame)
    }

    /// Render original, compressed and difference panels for one frame as
    /// PNG bytes.
    pub fn plot_verification(&self, frame: usize) -> Result<Bytes, VerifyError> {
        let (original, compressed) = self.read_stacks().map_err(VerifyError::PixelComparison)?;
        let diff = DifferenceMap::compute(&original, &compressed, frame)?;

        let frames = original.frame_count();
        let out_of_range = || VerifyError::FrameOutOfRange { frame, frames };
        let original_frame = original.frame_f64(frame).ok_or_else(out_of_range)?;
        let compressed_frame = compressed.frame_f64(frame).ok_or_else(out_of_range)?;

        render_verification_png(&PlotInput {
            page: diff.page,
            original: &original_frame,
            compressed: &compressed_frame,
            difference: &diff.values,
        })
    }

    fn read_stacks(&self) -> Result<(ImageStack, ImageStack), crate::error::StackError> {
        Ok((read_stack(&self.original)?, read_stack(&self.compressed)?))
    }

    fn open_series(&self) -> Result<(TiffSeries, TiffSeries), crate::error::TiffError> {
        Ok((
            TiffSeries::open(&self.original)?,
            TiffSeries::open(&self.compressed)?,
        ))
    }
}

// =============================================================================
// Comparisons
// =============================================================================

fn pixels_match(original: &ImageStack, compressed: &ImageStack) -> bool {
    if original.shape != compressed.shape {
        debug!(
            original = ?original.shape,
            compressed = ?compressed.shape,
            "Shapes differ"
        );
        return false;
    }
    original.pixels.values_equal(&compressed.pixels)
}

fn statistics_match(original: &ImageStack, compressed: &ImageStack) -> Result<bool, VerifyError> {
    let a = original.statistics().map_err(VerifyError::Statistics)?;
    let b = compressed.statistics().map_err(VerifyError::Statistics)?;
    debug!(original = ?a, compressed = ?b, "Pixel statistics");
    Ok(a == b)
}

/// Compare optional ImageJ metadata.
///
/// Both absent match; exactly one absent does not. Otherwise each of
/// [`CRUCIAL_METADATA_FIELDS`] present in the original must have an equal
/// value in the compressed file.
pub fn metadata_matches(
    original: Option<&ImageJMetadata>,
    compressed: Option<&ImageJMetadata>,
) -> bool {
    match (original, compressed) {
        (None, None) => true,
        (Some(_), None) | (None, Some(_)) => false,
        (Some(orig), Some(comp)) => CRUCIAL_METADATA_FIELDS.iter().all(|field| {
            match (orig.get(field), comp.get(field)) {
                (None, _) => true,
                (Some(a), Some(b)) => values_equal(a, b),
                (Some(_), None) => false,
            }
        }),
    }
}

/// Numeric values compare by value, so `2` equals `2.0`.
fn values_equal(a: &MetadataValue, b: &MetadataValue) -> bool {
    match (a, b) {
        (MetadataValue::Int(x), MetadataValue::Float(y))
        | (MetadataValue::Float(y), MetadataValue::Int(x)) => *x as f64 == *y,
        _ => a == b,
    }
}

/// Verify a pair and log the outcome.
///
/// Returns whether all five checks passed.
pub fn check_compression(
    original: impl AsRef<Path>,
    compressed: impl AsRef<Path>,
) -> Result<bool, VerifyError> {
    let original = original.as_ref();
    let report = TiffVerifier::new(original, compressed.as_ref()).verify_all()?;
    log_report(original, &report);
    Ok(report.passed())
}

/// Log a report at `info` when it passed, otherwise one `warn` per failed
/// check.
pub fn log_report(original: &Path, report: &VerificationReport) {
    if report.passed() {
        info!(file = %original.display(), "Compression successful with no data loss");
    } else {
        warn!(file = %original.display(), "Issues detected");
        for check in report.failed_checks() {
            warn!(file = %original.display(), check, "Failed check");
        }
    }
}
