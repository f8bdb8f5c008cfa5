//! TIFF structure and metadata.
//!
//! Pixel decoding lives in [`crate::stack`]; this module only reads what the
//! container declares:
//!
//! - [`tiff`]: header, IFD chain and the first image series
//! - [`imagej`]: ImageJ hyperstack metadata from the ImageDescription
//! - [`detect`]: quick classification of a file as ImageJ, BigTIFF or TIFF

pub mod detect;
pub mod imagej;
pub mod tiff;

pub use detect::{detect_file_format, detect_format, has_tiff_extension, is_tiff_header, TiffFlavor};
pub use imagej::{ImageJMetadata, MetadataValue, IMAGEJ_MARKER};
