//! TIFF container parsing.
//!
//! Reads the structure of TIFF and BigTIFF files without decoding pixels:
//!
//! - **Byte order**: declared in the header (II = little-endian,
//!   MM = big-endian); every multi-byte value follows it.
//! - **Classic TIFF vs BigTIFF**: 32-bit vs 64-bit offsets, handled
//!   transparently.
//! - **IFD (Image File Directory)**: one per page, holding the tags that
//!   describe the page and point at its pixel data.
//! - **Series**: the pages that together form the first N-dimensional image,
//!   see [`TiffSeries`].

mod parser;
mod series;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use series::{shape_len, PageInfo, SeriesKind, TiffSeries, MAX_IFDS};
pub use tags::{Compression, FieldType, SampleFormat, TiffTag};
pub use values::{parse_u64_array, ValueReader};
