//! TIFF flavour detection.
//!
//! Identifies what kind of TIFF a file is by its magic bytes and the first
//! page's ImageDescription:
//!
//! - **ImageJ**: description starts with `ImageJ=`
//! - **BigTIFF**: version 43 header with 64-bit offsets
//! - **TIFF**: any other classic TIFF
//!
//! Anything else is rejected with an error that maps to HTTP 415.

use std::path::Path;

use crate::error::FormatError;
use crate::io::{FileRangeReader, RangeReader};

use super::imagej::IMAGEJ_MARKER;
use super::tiff::{ByteOrder, Ifd, TiffHeader, TiffTag, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

// =============================================================================
// TiffFlavor
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffFlavor {
    /// TIFF written by or for ImageJ, carrying hyperstack metadata
    ImageJ,

    BigTiff,

    /// Classic TIFF without ImageJ metadata
    Tiff,
}

impl TiffFlavor {
    pub const fn name(&self) -> &'static str {
        match self {
            TiffFlavor::ImageJ => "ImageJ TIFF",
            TiffFlavor::BigTiff => "BigTIFF",
            TiffFlavor::Tiff => "TIFF",
        }
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Only the start of the description is needed to spot the marker.
const MAX_DESCRIPTION_BYTES: usize = 64;

/// Detect the flavour of a TIFF.
///
/// # Errors
/// * `FormatError::UnsupportedFormat` if the bytes are not a TIFF header
/// * `FormatError::Tiff` if the header or first IFD is malformed
pub fn detect_format<R: RangeReader + ?Sized>(reader: &R) -> Result<TiffFlavor, FormatError> {
    if reader.size() < TIFF_HEADER_SIZE as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: "File too small to be a valid TIFF".to_string(),
        });
    }

    let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
    let header_bytes = reader.read_exact_at(0, header_len)?;
    if !is_tiff_header(&header_bytes) {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("{} is not a TIFF file", reader.identifier()),
        });
    }
    let header = TiffHeader::parse(&header_bytes, reader.size())?;

    if let Some(description) = read_description_prefix(reader, &header)? {
        if description.starts_with(IMAGEJ_MARKER.as_bytes()) {
            return Ok(TiffFlavor::ImageJ);
        }
    }

    if header.is_bigtiff {
        Ok(TiffFlavor::BigTiff)
    } else {
        Ok(TiffFlavor::Tiff)
    }
}

/// Detect the flavour of a TIFF on disk.
pub fn detect_file_format(path: impl AsRef<Path>) -> Result<TiffFlavor, FormatError> {
    let reader = FileRangeReader::open(path)?;
    detect_format(&reader)
}

/// Read the first bytes of the first page's ImageDescription, if any.
fn read_description_prefix<R: RangeReader + ?Sized>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Option<Vec<u8>>, FormatError> {
    let count_bytes = reader.read_exact_at(header.first_ifd_offset, header.ifd_count_size())?;
    let entry_count = header.read_entry_count(&count_bytes);
    let ifd_bytes = reader.read_exact_at(
        header.first_ifd_offset,
        Ifd::calculate_size(entry_count, header),
    )?;
    let ifd = Ifd::parse(&ifd_bytes, header)?;

    let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) else {
        return Ok(None);
    };

    let read_len = (entry.count as usize).min(MAX_DESCRIPTION_BYTES);
    if read_len == 0 {
        return Ok(None);
    }

    let bytes = if entry.is_inline {
        entry.value_offset_bytes[..read_len.min(entry.value_offset_bytes.len())].to_vec()
    } else {
        let offset = entry.value_offset(header.byte_order);
        reader.read_exact_at(offset, read_len)?.to_vec()
    };
    Ok(Some(bytes))
}

/// Quick check that `bytes` start with a TIFF or BigTIFF header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match u16::from_le_bytes([bytes[0], bytes[1]]) {
        0x4949 => ByteOrder::LittleEndian,
        0x4D4D => ByteOrder::BigEndian,
        _ => return false,
    };

    let version = byte_order.read_u16(&bytes[2..4]);
    version == 42 || version == 43
}

/// Whether a path has a `.tif`/`.tiff` extension (any case).
pub fn has_tiff_extension(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
