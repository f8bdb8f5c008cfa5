use std::path::Path;

use thiserror::Error;

/// I/O errors that can occur when touching files on local disk
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// File or directory does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested range exceeds file bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Reading from a file failed
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    /// Target of a write is already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Writing to a file failed
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    /// Removing or moving a file failed
    #[error("Failed to remove {path}: {message}")]
    Remove { path: String, message: String },
}

impl IoError {
    /// Classify a `std::io::Error` raised while reading `path`.
    pub fn read(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.display().to_string())
        } else {
            IoError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Wrap a `std::io::Error` raised while writing `path`.
    pub fn write(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            IoError::AlreadyExists(path.display().to_string())
        } else {
            IoError::Write {
                path: path.display().to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Wrap a `std::io::Error` raised while removing or moving `path`.
    pub fn remove(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.display().to_string())
        } else {
            IoError::Remove {
                path: path.display().to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Errors related to format detection
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File is not a TIFF at all
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing the TIFF container structure
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// The file declares no image at all
    #[error("TIFF file contains no images")]
    NoImages,

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised while decoding or encoding pixel data
#[derive(Debug, Clone, Error)]
pub enum StackError {
    /// I/O error while opening or creating the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Container structure could not be parsed
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// The TIFF codec rejected the data
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    /// The TIFF codec failed to write the data
    #[error("Failed to encode {path}: {message}")]
    Encode { path: String, message: String },

    /// Sample layout the codec bridge cannot represent
    #[error("Unsupported pixel layout: {0}")]
    UnsupportedLayout(String),

    /// Pages within one series decoded to different sample types
    #[error("Inconsistent sample type in page {page}: expected {expected}, got {actual}")]
    InconsistentPages {
        page: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// Statistics were requested for an empty stack
    #[error("Stack contains no samples")]
    Empty,
}

/// Errors raised by the compressor
#[derive(Debug, Clone, Error)]
pub enum CompressError {
    /// Input could not be inspected
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Input is not a TIFF
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Output path is already taken; existing files are never replaced
    #[error("Refusing to overwrite existing output {0}")]
    OutputExists(String),

    /// Reading the input stack failed
    #[error("TIFF compression failed while reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: StackError,
    },

    /// Writing the compressed stack failed
    #[error("TIFF compression failed while writing {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: StackError,
    },

    /// Compression method name was not recognised
    #[error("Unknown compression method '{0}' (expected lzw, zip or packbits)")]
    UnknownMethod(String),
}

/// Errors raised by an individual verification check
///
/// Mismatches are not errors; they are reported as `false` in the report.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    #[error("Pixel comparison failed: {0}")]
    PixelComparison(#[source] StackError),

    #[error("File hash comparison failed: {0}")]
    FileHash(#[source] IoError),

    #[error("Dimension comparison failed: {0}")]
    Dimensions(#[source] TiffError),

    #[error("Metadata comparison failed: {0}")]
    Metadata(#[source] TiffError),

    #[error("Statistical comparison failed: {0}")]
    Statistics(#[source] StackError),

    /// Difference map needs same-shaped inputs
    #[error("Cannot compute difference map: shapes {original:?} and {compressed:?} differ")]
    ShapeMismatch {
        original: Vec<usize>,
        compressed: Vec<usize>,
    },

    #[error("Frame {frame} out of range (stack has {frames} frames)")]
    FrameOutOfRange { frame: usize, frames: usize },

    #[error("Failed to render verification plot: {message}")]
    Render { message: String },
}

/// Errors raised by the batch/file manager
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// Input path could not be inspected
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error(transparent)]
    Compress(#[from] CompressError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}
