//! Decoded pixel data.
//!
//! Bridges the TIFF codec and the verifier: [`read_stack`] decodes the first
//! series of a file into an [`ImageStack`], [`write_stack`] encodes one back
//! out with a lossless [`Codec`].

mod array;
mod reader;
mod writer;

pub use array::{ImageStack, PageShape, PixelBuffer, PixelStatistics, SampleType};
pub use reader::read_stack;
pub use writer::{write_stack, Codec};
