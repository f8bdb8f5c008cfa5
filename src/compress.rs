//! Lossless re-encoding of TIFF files.
//!
//! [`TiffCompressor`] reads a file's first series and writes it back out
//! with LZW, Deflate ("zip") or PackBits, re-attaching ImageJ metadata.
//! [`TiffCompressorManager`] wraps it with the output naming conventions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CompressError, IoError, StackError};
use crate::format::detect::{detect_file_format, TiffFlavor};
use crate::io::{file_size, find_tiff_files, remove_file};
use crate::stack::{read_stack, write_stack, Codec};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// =============================================================================
// CompressionMethod
// =============================================================================

/// Lossless compression methods offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Lzw,
    /// Deflate, named after the zip container users know it from
    #[default]
    #[serde(alias = "deflate", alias = "zlib")]
    Zip,
    PackBits,
}

impl CompressionMethod {
    pub const ALL: [CompressionMethod; 3] = [
        CompressionMethod::Lzw,
        CompressionMethod::Zip,
        CompressionMethod::PackBits,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CompressionMethod::Lzw => "lzw",
            CompressionMethod::Zip => "zip",
            CompressionMethod::PackBits => "packbits",
        }
    }

    pub const fn codec(self) -> Codec {
        match self {
            CompressionMethod::Lzw => Codec::Lzw,
            CompressionMethod::Zip => Codec::Deflate,
            CompressionMethod::PackBits => Codec::PackBits,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMethod {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lzw" => Ok(CompressionMethod::Lzw),
            "zip" | "deflate" | "zlib" => Ok(CompressionMethod::Zip),
            "packbits" => Ok(CompressionMethod::PackBits),
            _ => Err(CompressError::UnknownMethod(s.to_string())),
        }
    }
}

// =============================================================================
// CompressionStats
// =============================================================================

/// Size comparison between an input and its compressed output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressionStats {
    pub original_size: u64,
    pub compressed_size: u64,
    /// `(1 - compressed / original) * 100`; negative when the output grew
    pub compression_ratio: f64,
    /// Bytes saved; negative when the output grew
    pub space_saved: i64,
}

impl CompressionStats {
    pub fn new(original_size: u64, compressed_size: u64) -> Self {
        let compression_ratio = if original_size == 0 {
            0.0
        } else {
            (1.0 - compressed_size as f64 / original_size as f64) * 100.0
        };
        Self {
            original_size,
            compressed_size,
            compression_ratio,
            space_saved: original_size as i64 - compressed_size as i64,
        }
    }

    pub fn original_size_mb(&self) -> f64 {
        self.original_size as f64 / BYTES_PER_MB
    }

    pub fn compressed_size_mb(&self) -> f64 {
        self.compressed_size as f64 / BYTES_PER_MB
    }

    pub fn space_saved_mb(&self) -> f64 {
        self.space_saved as f64 / BYTES_PER_MB
    }
}

impl fmt::Display for CompressionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} MB -> {:.2} MB ({:.1}% smaller, {:.2} MB saved)",
            self.original_size_mb(),
            self.compressed_size_mb(),
            self.compression_ratio,
            self.space_saved_mb()
        )
    }
}

// =============================================================================
// TiffCompressor
// =============================================================================

/// Compresses a single TIFF file.
#[derive(Debug, Clone)]
pub struct TiffCompressor {
    input: PathBuf,
    original_size: u64,
    flavor: TiffFlavor,
}

impl TiffCompressor {
    /// Open `input`, rejecting anything that is not a TIFF.
    pub fn new(input: impl Into<PathBuf>) -> Result<Self, CompressError> {
        let input = input.into();
        let original_size = file_size(&input)?;
        let flavor = detect_file_format(&input)?;
        debug!(input = %input.display(), flavor = flavor.name(), "Detected input format");
        Ok(Self {
            input,
            original_size,
            flavor,
        })
    }

    pub fn flavor(&self) -> TiffFlavor {
        self.flavor
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Re-encode the input into `output` with `method`.
    ///
    /// An existing `output` is never replaced. A partially written output is
    /// removed when encoding fails.
    pub fn compress(
        &self,
        output: impl AsRef<Path>,
        method: CompressionMethod,
    ) -> Result<CompressionStats, CompressError> {
        let output = output.as_ref();
        if output.exists() {
            return Err(CompressError::OutputExists(output.display().to_string()));
        }

        let stack = read_stack(&self.input).map_err(|source| CompressError::Read {
            path: self.input.display().to_string(),
            source,
        })?;
        debug!(
            input = %self.input.display(),
            shape = ?stack.shape,
            imagej = stack.imagej.is_some(),
            "Read stack for compression"
        );

        if let Err(source) = write_stack(&stack, output, method.codec()) {
            if let StackError::Io(IoError::AlreadyExists(path)) = source {
                return Err(CompressError::OutputExists(path));
            }
            if output.exists() {
                if let Err(e) = remove_file(output) {
                    warn!(output = %output.display(), error = %e, "Could not remove partial output");
                }
            }
            return Err(CompressError::Write {
                path: output.display().to_string(),
                source,
            });
        }

        let stats = CompressionStats::new(self.original_size, file_size(output)?);
        info!(
            input = %self.input.display(),
            output = %output.display(),
            method = %method,
            ratio = %format!("{:.1}%", stats.compression_ratio),
            "Compressed TIFF"
        );
        Ok(stats)
    }
}

// =============================================================================
// Output naming
// =============================================================================

/// `<dir>/<stem>_compressed_<method>.tif`
pub fn compressed_path_for(input: impl AsRef<Path>, method: CompressionMethod) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}_compressed_{method}.tif");
    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Whether `path` looks like an output of any compression method.
pub fn is_compressed_output(path: impl AsRef<Path>) -> bool {
    let Some(stem) = path.as_ref().file_stem().map(|s| s.to_string_lossy()) else {
        return false;
    };
    CompressionMethod::ALL
        .iter()
        .any(|m| stem.ends_with(&format!("_compressed_{}", m.as_str())))
}

// =============================================================================
// TiffCompressorManager
// =============================================================================

/// Result of one file in [`TiffCompressorManager::batch_compress_directory`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchCompressEntry {
    pub file_name: String,
    pub output: PathBuf,
    pub stats: CompressionStats,
}

/// Convenience entry points over [`TiffCompressor`].
pub struct TiffCompressorManager;

impl TiffCompressorManager {
    /// Compress `input` next to itself, named by [`compressed_path_for`].
    pub fn compress_file(
        input: impl AsRef<Path>,
        method: CompressionMethod,
    ) -> Result<(PathBuf, CompressionStats), CompressError> {
        let input = input.as_ref();
        let output = compressed_path_for(input, method);
        let stats = TiffCompressor::new(input)?.compress(&output, method)?;
        Ok((output, stats))
    }

    /// Compress every `*.tif*` directly inside `input_dir` into
    /// `output_dir/compressed_<name>`.
    ///
    /// Nothing is verified or deleted. Files that fail are logged and left
    /// out of the result.
    pub fn batch_compress_directory(
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        method: CompressionMethod,
    ) -> Result<Vec<BatchCompressEntry>, CompressError> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)
            .map_err(|e| crate::error::IoError::write(output_dir, e))?;

        let mut results = Vec::new();
        for file in find_tiff_files(input_dir, false)? {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output = output_dir.join(format!("compressed_{file_name}"));

            let stats = TiffCompressor::new(&file).and_then(|c| c.compress(&output, method));
            match stats {
                Ok(stats) => results.push(BatchCompressEntry {
                    file_name,
                    output,
                    stats,
                }),
                Err(e) => warn!(file = %file.display(), error = %e, "Error processing file"),
            }
        }
        Ok(results)
    }
}
