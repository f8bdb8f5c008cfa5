//! # TIFF Squeeze
//!
//! Lossless re-compression of TIFF image stacks, with pixel-exact
//! verification before anything is deleted.
//!
//! Each file is decoded, re-encoded with LZW, Deflate ("zip") or PackBits,
//! and the result is checked against the original five ways: pixel
//! equality, differing file hashes, series dimensions, ImageJ metadata and
//! summary statistics. Only when every check passes is the original
//! replaced.
//!
//! ## Architecture
//!
//! - [`io`] - Local file access, hashing and TIFF discovery
//! - [`mod@format`] - TIFF container parsing, series shapes and ImageJ metadata
//! - [`stack`] - Decoding and encoding whole pixel stacks
//! - [`compress`] - The compressor and output naming
//! - [`verify`] - The five checks, difference maps and plots
//! - [`batch`] - Compress, verify and retain over files and folders
//! - [`server`] - Axum-based local web GUI
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiff_squeeze::{CompressionMethod, FileManager, NoProgress, Retention};
//!
//! let manager = FileManager::new(CompressionMethod::Zip)
//!     .with_retention(Retention::Backup("/data/originals".into()));
//! let report = manager.process_path("/data/scans", &mut NoProgress)?;
//! println!("{report}");
//! # Ok::<(), tiff_squeeze::BatchError>(())
//! ```

pub mod batch;
pub mod compress;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod stack;
pub mod verify;

// Re-export commonly used types
pub use batch::{
    BatchReport, FileFailure, FileManager, FileOutcome, FnProgress, NoProgress, ProgressEvent,
    ProgressSink, Retention,
};
pub use compress::{
    compressed_path_for, is_compressed_output, CompressionMethod, CompressionStats,
    TiffCompressor, TiffCompressorManager,
};
pub use config::{Cli, Command, CompressConfig, ServeConfig, VerifyConfig};
pub use error::{
    BatchError, CompressError, FormatError, IoError, StackError, TiffError, VerifyError,
};
pub use format::tiff::{SeriesKind, TiffSeries};
pub use format::{detect_file_format, detect_format, ImageJMetadata, MetadataValue, TiffFlavor};
pub use server::{create_router, AppState, RouterConfig};
pub use stack::{read_stack, write_stack, Codec, ImageStack, PageShape, PixelBuffer, SampleType};
pub use verify::{check_compression, DifferenceMap, TiffVerifier, VerificationReport};
