//! Test utilities for integration tests.
//!
//! Synthetic TIFFs are written two ways: through the `tiff` encoder for
//! realistic uncompressed inputs, and byte by byte for container edge cases
//! (big-endian, BigTIFF) the encoder does not produce.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

// =============================================================================
// Pixel Data
// =============================================================================

/// Deterministic 16-bit ramp with some structure, so compression has work
/// to do but the data is not trivially constant.
pub fn gradient_u16(frames: usize, width: usize, height: usize) -> Vec<u16> {
    (0..frames * width * height)
        .map(|i| ((i * 37 + i / width * 11) % 4096) as u16)
        .collect()
}

pub fn gradient_u8(frames: usize, width: usize, height: usize) -> Vec<u8> {
    (0..frames * width * height)
        .map(|i| ((i * 7) % 251) as u8)
        .collect()
}

/// ImageJ hyperstack description for a plain time series.
pub fn imagej_description(frames: usize) -> String {
    format!("ImageJ=1.53t\nimages={frames}\nframes={frames}\nhyperstack=true\nmode=grayscale\nunit=micron\nloop=false\n")
}

// =============================================================================
// Files Written With The tiff Encoder
// =============================================================================

/// Write an uncompressed 16-bit grayscale stack, one page per frame, with
/// an optional description on the first page.
pub fn write_gray16_stack(
    path: &Path,
    width: u32,
    height: u32,
    data: &[u16],
    description: Option<&str>,
) {
    let plane = (width * height) as usize;
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for (i, frame) in data.chunks_exact(plane).enumerate() {
        let mut image = encoder
            .new_image::<colortype::Gray16>(width, height)
            .unwrap();
        if i == 0 {
            if let Some(desc) = description {
                image
                    .encoder()
                    .write_tag(Tag::ImageDescription, desc)
                    .unwrap();
            }
        }
        image.write_data(frame).unwrap();
    }
}

/// Write an uncompressed 8-bit grayscale stack.
pub fn write_gray8_stack(path: &Path, width: u32, height: u32, data: &[u8]) {
    let plane = (width * height) as usize;
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for frame in data.chunks_exact(plane) {
        encoder
            .write_image::<colortype::Gray8>(width, height, frame)
            .unwrap();
    }
}

/// Write an uncompressed RGB image.
pub fn write_rgb8(path: &Path, width: u32, height: u32, data: &[u8]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::RGB8>(width, height, data)
        .unwrap();
}

/// Write an uncompressed 32-bit float grayscale image.
pub fn write_gray_f32(path: &Path, width: u32, height: u32, data: &[f32]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray32Float>(width, height, data)
        .unwrap();
}

/// Write a Deflate-compressed 16-bit stack, for hand-made "compressed"
/// counterparts in verification tests.
pub fn write_gray16_deflate(path: &Path, width: u32, height: u32, data: &[u16], description: Option<&str>) {
    use tiff::encoder::compression::Deflate;

    let plane = (width * height) as usize;
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for (i, frame) in data.chunks_exact(plane).enumerate() {
        let mut image = encoder
            .new_image_with_compression::<colortype::Gray16, _>(width, height, Deflate::default())
            .unwrap();
        if i == 0 {
            if let Some(desc) = description {
                image
                    .encoder()
                    .write_tag(Tag::ImageDescription, desc)
                    .unwrap();
            }
        }
        image.write_data(frame).unwrap();
    }
}

/// A 2-frame 8x8 16-bit stack with ImageJ metadata, at `dir/name`.
pub fn sample_stack(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    write_gray16_stack(
        &path,
        8,
        8,
        &gradient_u16(2, 8, 8),
        Some(&imagej_description(2)),
    );
    path
}

// =============================================================================
// Byte-Level Builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Build a single-page, single-strip, uncompressed 8-bit grayscale TIFF by
/// hand. Supports both byte orders and BigTIFF.
pub fn build_gray8_tiff(
    order: ByteOrderType,
    bigtiff: bool,
    width: u32,
    height: u32,
    pixels: &[u8],
    description: Option<&str>,
) -> Vec<u8> {
    assert_eq!(pixels.len(), (width * height) as usize);

    let mut data = Vec::new();
    data.extend_from_slice(match order {
        ByteOrderType::LittleEndian => b"II",
        ByteOrderType::BigEndian => b"MM",
    });
    let header_size = if bigtiff {
        put(&mut data, order, 43, 2);
        put(&mut data, order, 8, 2);
        put(&mut data, order, 0, 2);
        put(&mut data, order, 0, 8);
        16
    } else {
        put(&mut data, order, 42, 2);
        put(&mut data, order, 0, 4);
        8
    };
    assert_eq!(data.len(), header_size);

    let strip_offset = data.len() as u64;
    data.extend_from_slice(pixels);

    let desc = description.map(|d| {
        let mut b = d.as_bytes().to_vec();
        b.push(0);
        b
    });
    let desc_offset = data.len() as u64;
    if let Some(b) = &desc {
        data.extend_from_slice(b);
    }
    if data.len() % 2 == 1 {
        data.push(0);
    }

    // (tag, type, count, value) with SHORT = 3, LONG = 4, ASCII = 2
    let mut entries: Vec<(u16, u16, u64, u64)> = vec![
        (256, 4, 1, width as u64),
        (257, 4, 1, height as u64),
        (258, 3, 1, 8),
        (259, 3, 1, 1),
        (262, 3, 1, 1),
        (273, 4, 1, strip_offset),
        (277, 3, 1, 1),
        (278, 4, 1, height as u64),
        (279, 4, 1, pixels.len() as u64),
    ];
    if let Some(b) = &desc {
        entries.push((270, 2, b.len() as u64, desc_offset));
    }
    entries.sort_by_key(|e| e.0);

    let ifd_offset = data.len() as u64;
    let (count_size, field_size) = if bigtiff { (8, 8) } else { (2, 4) };

    put(&mut data, order, entries.len() as u64, count_size);
    for (tag, typ, count, value) in entries {
        put(&mut data, order, tag as u64, 2);
        put(&mut data, order, typ as u64, 2);
        put(&mut data, order, count, field_size);
        // Values are left-justified in the value field
        let size = if typ == 3 { 2 } else { 4 };
        let size = if typ == 2 || size > field_size { field_size } else { size };
        put(&mut data, order, value, size);
        for _ in size..field_size {
            data.push(0);
        }
    }
    put(&mut data, order, 0, field_size);

    let pos = if bigtiff { 8 } else { 4 };
    let mut offset = Vec::new();
    put(&mut offset, order, ifd_offset, field_size);
    data[pos..pos + field_size].copy_from_slice(&offset);
    data
}

fn put(data: &mut Vec<u8>, order: ByteOrderType, value: u64, size: usize) {
    let bytes = match order {
        ByteOrderType::LittleEndian => value.to_le_bytes(),
        ByteOrderType::BigEndian => value.to_be_bytes(),
    };
    match order {
        ByteOrderType::LittleEndian => data.extend_from_slice(&bytes[..size]),
        ByteOrderType::BigEndian => data.extend_from_slice(&bytes[8 - size..]),
    }
}

pub fn is_tiff_magic(data: &[u8]) -> bool {
    data.len() >= 4
        && ((data[0..2] == *b"II" && data[2] == 42 && data[3] == 0)
            || (data[0..2] == *b"MM" && data[2] == 0 && data[3] == 42))
}
