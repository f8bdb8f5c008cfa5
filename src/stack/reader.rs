//! Decoding a TIFF series into an [`ImageStack`].
//!
//! The container parser decides which pages form series 0; the `tiff`
//! crate decodes each of those pages.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::debug;

use crate::error::{IoError, StackError};
use crate::format::tiff::TiffSeries;

use super::array::{ImageStack, PageShape, PixelBuffer};

/// Read the first series of a TIFF into memory.
pub fn read_stack(path: impl AsRef<Path>) -> Result<ImageStack, StackError> {
    let path = path.as_ref();
    let series = TiffSeries::open(path)?;

    let decode_err = |e: tiff::TiffError| StackError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let file = File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(decode_err)?
        .with_limits(Limits::unlimited());

    let mut current = 0usize;
    let mut page_shape: Option<PageShape> = None;
    let mut pixels: Option<PixelBuffer> = None;

    for &target in &series.page_indices {
        while current < target {
            if !decoder.more_images() {
                return Err(StackError::UnsupportedLayout(format!(
                    "page {target} declared but the file ends after page {current}"
                )));
            }
            decoder.next_image().map_err(decode_err)?;
            current += 1;
        }

        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        let samples = samples_per_pixel(decoder.colortype().map_err(decode_err)?)?;
        let shape = PageShape::new(height as usize, width as usize, samples);

        match page_shape {
            None => page_shape = Some(shape),
            Some(first) if first != shape => {
                return Err(StackError::UnsupportedLayout(format!(
                    "page {target} is {}x{}x{}, expected {}x{}x{}",
                    shape.height, shape.width, shape.samples, first.height, first.width, first.samples
                )));
            }
            Some(_) => {}
        }

        let page = into_buffer(decoder.read_image().map_err(decode_err)?);
        match pixels.as_mut() {
            None => pixels = Some(page),
            Some(buf) => buf.extend_from(page, target)?,
        }
    }

    let (page, pixels) = match (page_shape, pixels) {
        (Some(page), Some(pixels)) => (page, pixels),
        _ => return Err(StackError::Empty),
    };

    debug!(
        path = %path.display(),
        shape = ?series.shape,
        sample_type = pixels.sample_type().name(),
        "Decoded image stack"
    );

    ImageStack::new(series.shape, page, pixels, series.imagej)
}

fn samples_per_pixel(color: ColorType) -> Result<usize, StackError> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        other => Err(StackError::UnsupportedLayout(format!(
            "color type {:?}",
            other
        ))),
    }
}

fn into_buffer(result: DecodingResult) -> PixelBuffer {
    match result {
        DecodingResult::U8(v) => PixelBuffer::U8(v),
        DecodingResult::U16(v) => PixelBuffer::U16(v),
        DecodingResult::U32(v) => PixelBuffer::U32(v),
        DecodingResult::U64(v) => PixelBuffer::U64(v),
        DecodingResult::I8(v) => PixelBuffer::I8(v),
        DecodingResult::I16(v) => PixelBuffer::I16(v),
        DecodingResult::I32(v) => PixelBuffer::I32(v),
        DecodingResult::I64(v) => PixelBuffer::I64(v),
        DecodingResult::F32(v) => PixelBuffer::F32(v),
        DecodingResult::F64(v) => PixelBuffer::F64(v),
    }
}
