//! Local file access.
//!
//! - [`RangeReader`]: byte-range reads used by the container parser
//! - hashing, sizing, removing and moving files for the batch workflow
//! - [`find_tiff_files`]: directory discovery

mod discover;
mod file_reader;
mod range_reader;

pub use discover::find_tiff_files;
pub use file_reader::{
    file_digest, file_size, move_into, remove_file, FileRangeReader, HASH_CHUNK_SIZE,
};
pub use range_reader::{BytesRangeReader, RangeReader};
