//! Encoding an [`ImageStack`] with a lossless codec.
//!
//! Every frame becomes one page. The first page carries the description:
//! the regenerated ImageJ metadata when the stack has it, otherwise a JSON
//! `{"shape": [...]}` so the series shape survives for plain stacks.

use std::fs::OpenOptions;
use std::io::{Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{Compression, Deflate, Lzw, Packbits};
use tiff::encoder::{TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;

use crate::error::{IoError, StackError};
use crate::format::imagej::MetadataValue;

use super::array::{ImageStack, PixelBuffer};

/// Payload size above which the output switches to BigTIFF.
const BIGTIFF_THRESHOLD: u64 = 3 * 1024 * 1024 * 1024;

/// Lossless codecs available to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Lzw,
    Deflate,
    PackBits,
}

/// Write `stack` to a new file at `path` with `codec`.
///
/// Fails with [`IoError::AlreadyExists`] rather than replace an existing file.
pub fn write_stack(
    stack: &ImageStack,
    path: impl AsRef<Path>,
    codec: Codec,
) -> Result<(), StackError> {
    let path = path.as_ref();
    let description = page_description(stack)?;

    let encode_err = |e: tiff::TiffError| StackError::Encode {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| IoError::write(path, e))?;
    let payload = (stack.pixels.len() as u64).saturating_mul(sample_bytes(&stack.pixels));

    let written = if payload > BIGTIFF_THRESHOLD {
        let mut encoder = TiffEncoder::new_big(file).map_err(encode_err)?;
        encode(&mut encoder, stack, &description, codec)
    } else {
        let mut encoder = TiffEncoder::new(file).map_err(encode_err)?;
        encode(&mut encoder, stack, &description, codec)
    };

    match written {
        Some(result) => result.map_err(encode_err),
        None => Err(StackError::UnsupportedLayout(format!(
            "{} samples with {} per pixel cannot be written as TIFF",
            stack.sample_type().name(),
            stack.page.samples
        ))),
    }
}

/// Description attached to the first page.
fn page_description(stack: &ImageStack) -> Result<String, StackError> {
    match &stack.imagej {
        Some(meta) => {
            let mut meta = meta.clone();
            meta.set("images", MetadataValue::Int(stack.frame_count() as i64));
            Ok(meta.to_description())
        }
        None => serde_json::to_string(&serde_json::json!({ "shape": stack.shape }))
            .map_err(|e| StackError::UnsupportedLayout(e.to_string())),
    }
}

fn sample_bytes(pixels: &PixelBuffer) -> u64 {
    match pixels {
        PixelBuffer::U8(_) | PixelBuffer::I8(_) => 1,
        PixelBuffer::U16(_) | PixelBuffer::I16(_) => 2,
        PixelBuffer::U32(_) | PixelBuffer::I32(_) | PixelBuffer::F32(_) => 4,
        PixelBuffer::U64(_) | PixelBuffer::I64(_) | PixelBuffer::F64(_) => 8,
    }
}

fn encode<W: Write + Seek, K: TiffKind>(
    encoder: &mut TiffEncoder<W, K>,
    stack: &ImageStack,
    description: &str,
    codec: Codec,
) -> Option<tiff::TiffResult<()>> {
    match codec {
        Codec::Lzw => encode_with(encoder, stack, description, Lzw::default()),
        Codec::Deflate => encode_with(encoder, stack, description, Deflate::default()),
        Codec::PackBits => encode_with(encoder, stack, description, Packbits::default()),
    }
}

/// Pick the colour type matching the buffer and samples per pixel.
///
/// Returns `None` when no TIFF colour type fits the layout.
fn encode_with<W: Write + Seek, K: TiffKind, D: Compression + Clone>(
    encoder: &mut TiffEncoder<W, K>,
    stack: &ImageStack,
    description: &str,
    compression: D,
) -> Option<tiff::TiffResult<()>> {
    macro_rules! pages {
        ($color:ty, $data:expr) => {
            write_pages::<$color, W, K, D>(encoder, stack, $data, description, compression)
        };
    }

    let result = match (&stack.pixels, stack.page.samples) {
        (PixelBuffer::U8(d), 1) => pages!(colortype::Gray8, d),
        (PixelBuffer::U8(d), 3) => pages!(colortype::RGB8, d),
        (PixelBuffer::U8(d), 4) => pages!(colortype::RGBA8, d),
        (PixelBuffer::U16(d), 1) => pages!(colortype::Gray16, d),
        (PixelBuffer::U16(d), 3) => pages!(colortype::RGB16, d),
        (PixelBuffer::U16(d), 4) => pages!(colortype::RGBA16, d),
        (PixelBuffer::U32(d), 1) => pages!(colortype::Gray32, d),
        (PixelBuffer::U32(d), 3) => pages!(colortype::RGB32, d),
        (PixelBuffer::U32(d), 4) => pages!(colortype::RGBA32, d),
        (PixelBuffer::U64(d), 1) => pages!(colortype::Gray64, d),
        (PixelBuffer::U64(d), 3) => pages!(colortype::RGB64, d),
        (PixelBuffer::U64(d), 4) => pages!(colortype::RGBA64, d),
        (PixelBuffer::I8(d), 1) => pages!(colortype::GrayI8, d),
        (PixelBuffer::I16(d), 1) => pages!(colortype::GrayI16, d),
        (PixelBuffer::I32(d), 1) => pages!(colortype::GrayI32, d),
        (PixelBuffer::I64(d), 1) => pages!(colortype::GrayI64, d),
        (PixelBuffer::F32(d), 1) => pages!(colortype::Gray32Float, d),
        (PixelBuffer::F32(d), 3) => pages!(colortype::RGB32Float, d),
        (PixelBuffer::F32(d), 4) => pages!(colortype::RGBA32Float, d),
        (PixelBuffer::F64(d), 1) => pages!(colortype::Gray64Float, d),
        (PixelBuffer::F64(d), 3) => pages!(colortype::RGB64Float, d),
        (PixelBuffer::F64(d), 4) => pages!(colortype::RGBA64Float, d),
        _ => return None,
    };
    Some(result)
}

fn write_pages<C, W, K, D>(
    encoder: &mut TiffEncoder<W, K>,
    stack: &ImageStack,
    data: &[C::Inner],
    description: &str,
    compression: D,
) -> tiff::TiffResult<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
    K: TiffKind,
    D: Compression + Clone,
{
    let width = stack.page.width as u32;
    let height = stack.page.height as u32;
    let plane = stack.page.plane_len();

    for (index, frame) in data.chunks_exact(plane).enumerate() {
        let mut image =
            encoder.new_image_with_compression::<C, D>(width, height, compression.clone())?;
        if index == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description)?;
        }
        image.write_data(frame)?;
    }
    Ok(())
}
