//! TIFF tag value reading.
//!
//! Small values live inline in the IFD entry; anything larger sits at an
//! offset and is fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values respecting the file's byte order and offset width.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw bytes of an entry's value, inline or fetched from its offset.
    pub fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order);
        let len = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: format!("value of {size} bytes is too large"),
        })?;
        Ok(self.reader.read_exact_at(offset, len)?)
    }

    /// Read a single Short or Long value.
    pub fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            });
        }
        self.read_u32_array(entry)?
            .first()
            .copied()
            .ok_or(TiffError::MissingTag(tag_name(entry)))
    }

    /// Read a single Short, Long or Long8 value.
    pub fn read_u64(&self, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            });
        }
        self.read_u64_array(entry)?
            .first()
            .copied()
            .ok_or(TiffError::MissingTag(tag_name(entry)))
    }

    /// Read an array of Short or Long values.
    ///
    /// Per-sample tags such as BitsPerSample and SampleFormat are read this
    /// way; RGB pages carry one value per channel.
    pub fn read_u32_array(&self, entry: &IfdEntry) -> Result<Vec<u32>, TiffError> {
        let field_type = self.field_type(entry)?;
        if !matches!(field_type, FieldType::Short | FieldType::Long) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Short or Long, got {:?}", field_type),
            });
        }
        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(&bytes, entry.count as usize, field_type, self.byte_order())
            .into_iter()
            .map(|v| v as u32)
            .collect())
    }

    /// Read an array of Short, Long or Long8 values (e.g. StripOffsets).
    pub fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = self.field_type(entry)?;
        if !matches!(
            field_type,
            FieldType::Short | FieldType::Long | FieldType::Long8
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Short, Long or Long8, got {:?}", field_type),
            });
        }
        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.byte_order(),
        ))
    }

    /// Read an ASCII value, dropping the NUL terminator and anything after.
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = self.field_type(entry)?;
        if !matches!(field_type, FieldType::Ascii | FieldType::Byte | FieldType::Undefined) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn field_type(&self, entry: &IfdEntry) -> Result<FieldType, TiffError> {
        entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))
    }
}

fn tag_name(entry: &IfdEntry) -> &'static str {
    entry.tag.map(|t| t.name()).unwrap_or("unknown")
}

/// Decode up to `count` unsigned integers of `field_type` from `bytes`.
///
/// Trailing partial values are ignored; other field types yield nothing.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .filter_map(|chunk| match field_type {
            FieldType::Short => Some(byte_order.read_u16(chunk) as u64),
            FieldType::Long => Some(byte_order.read_u32(chunk) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(chunk)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
