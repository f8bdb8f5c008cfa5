//! Page and series discovery.
//!
//! Walks the IFD chain and groups pages into the first image series without
//! decoding any pixel data. The series shape is what shape comparisons use.
//!
//! Three kinds of series are recognised:
//!
//! - **ImageJ**: the first page carries `ImageJ=` metadata; the leading axes
//!   come from its `frames`, `slices` and `channels` counts.
//! - **Shaped**: the first page carries a JSON description such as
//!   `{"shape": [2, 8, 8]}`, which is what this crate writes for plain
//!   stacks.
//! - **Generic**: every full-resolution page whose layout matches the first
//!   page, stacked along a leading axis when there is more than one.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::TiffError;
use crate::format::imagej::ImageJMetadata;
use crate::io::{FileRangeReader, RangeReader};

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, SampleFormat, TiffTag};
use super::values::ValueReader;

/// Upper bound on IFDs followed in one file.
pub const MAX_IFDS: usize = 65_536;

/// NewSubfileType bit marking a reduced-resolution page.
const SUBFILE_REDUCED: u32 = 1;

// =============================================================================
// PageInfo
// =============================================================================

/// Layout of a single page, read from its IFD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Position of the IFD in the chain
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u16,
    pub bits_per_sample: u16,
    #[serde(skip)]
    pub sample_format: SampleFormat,
    /// Raw compression code (1 = none)
    pub compression: u16,
    pub planar_configuration: u16,
    pub subfile_type: u32,
}

impl PageInfo {
    fn from_ifd<R: RangeReader + ?Sized>(
        ifd: &Ifd,
        index: usize,
        values: &ValueReader<'_, R>,
    ) -> Result<Self, TiffError> {
        let required = |tag: TiffTag| -> Result<u32, TiffError> {
            let entry = ifd
                .get_entry_by_tag(tag)
                .ok_or(TiffError::MissingTag(tag.name()))?;
            values.read_u32(entry)
        };
        let first_or = |tag: TiffTag, default: u32| -> Result<u32, TiffError> {
            match ifd.get_entry_by_tag(tag) {
                Some(entry) => Ok(values
                    .read_u32_array(entry)?
                    .first()
                    .copied()
                    .unwrap_or(default)),
                None => Ok(default),
            }
        };

        let sample_format_raw = first_or(TiffTag::SampleFormat, 1)? as u16;
        let sample_format =
            SampleFormat::from_u16(sample_format_raw).ok_or(TiffError::InvalidTagValue {
                tag: TiffTag::SampleFormat.name(),
                message: format!("unknown sample format {sample_format_raw}"),
            })?;

        Ok(PageInfo {
            index,
            width: required(TiffTag::ImageWidth)?,
            height: required(TiffTag::ImageLength)?,
            samples_per_pixel: first_or(TiffTag::SamplesPerPixel, 1)? as u16,
            bits_per_sample: first_or(TiffTag::BitsPerSample, 1)? as u16,
            sample_format,
            compression: first_or(TiffTag::Compression, 1)? as u16,
            planar_configuration: first_or(TiffTag::PlanarConfiguration, 1)? as u16,
            subfile_type: first_or(TiffTag::NewSubfileType, 0)?,
        })
    }

    /// Array shape of the page: `(h, w)`, `(h, w, s)` or `(s, h, w)` when
    /// samples are stored planar.
    pub fn shape(&self) -> Vec<usize> {
        let h = self.height as usize;
        let w = self.width as usize;
        let s = self.samples_per_pixel as usize;
        match (s, self.planar_configuration) {
            (1, _) => vec![h, w],
            (_, 2) => vec![s, h, w],
            _ => vec![h, w, s],
        }
    }

    pub fn is_reduced(&self) -> bool {
        self.subfile_type & SUBFILE_REDUCED != 0
    }

    pub fn compression_scheme(&self) -> Option<Compression> {
        Compression::from_u16(self.compression)
    }

    /// Pages with equal layout keys decode to same-shaped, same-typed arrays.
    fn layout_key(&self) -> (Vec<usize>, u16, SampleFormat) {
        (self.shape(), self.bits_per_sample, self.sample_format)
    }
}

// =============================================================================
// TiffSeries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    ImageJ,
    Shaped,
    Generic,
}

/// Container-level description of a TIFF file's first image series.
#[derive(Debug, Clone)]
pub struct TiffSeries {
    pub header: TiffHeader,

    /// Every page in the file, in IFD order
    pub pages: Vec<PageInfo>,

    /// ImageDescription of the first page
    pub description: Option<String>,

    pub imagej: Option<ImageJMetadata>,

    pub kind: SeriesKind,

    /// Declared shape of series 0
    pub shape: Vec<usize>,

    /// IFD indices of the pages belonging to series 0
    pub page_indices: Vec<usize>,
}

impl TiffSeries {
    /// Open a file on disk and parse its structure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TiffError> {
        let reader = FileRangeReader::open(path)?;
        Self::parse(&reader)
    }

    /// Parse the header, every IFD, and derive series 0.
    pub fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = read_ifd_chain(reader, &header)?;
        let values = ValueReader::new(reader, &header);

        let mut pages = Vec::with_capacity(ifds.len());
        for (index, ifd) in ifds.iter().enumerate() {
            pages.push(PageInfo::from_ifd(ifd, index, &values)?);
        }

        let description = match ifds
            .first()
            .and_then(|ifd| ifd.get_entry_by_tag(TiffTag::ImageDescription))
        {
            Some(entry) => Some(values.read_string(entry)?),
            None => None,
        };
        let imagej = description.as_deref().and_then(ImageJMetadata::parse);

        let (kind, shape, page_indices) = derive_series(&pages, description.as_deref(), imagej.as_ref())?;

        debug!(
            identifier = reader.identifier(),
            pages = pages.len(),
            kind = ?kind,
            shape = ?shape,
            "Parsed TIFF series"
        );

        Ok(TiffSeries {
            header,
            pages,
            description,
            imagej,
            kind,
            shape,
            page_indices,
        })
    }

    pub fn first_page(&self) -> Option<&PageInfo> {
        self.pages.first()
    }

    pub fn is_imagej(&self) -> bool {
        self.imagej.is_some()
    }

    /// Number of pages in series 0.
    pub fn series_len(&self) -> usize {
        self.page_indices.len()
    }
}

/// Follow the next-IFD chain, stopping at a zero offset, a revisited
/// offset, or [`MAX_IFDS`].
fn read_ifd_chain<R: RangeReader + ?Sized>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS {
        if offset >= reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        if !seen.insert(offset) {
            debug!(offset, "IFD chain loops back, stopping");
            break;
        }

        let count_bytes = reader.read_exact_at(offset, header.ifd_count_size())?;
        let entry_count = header.read_entry_count(&count_bytes);
        let ifd_size = Ifd::calculate_size(entry_count, header);
        let ifd_bytes = reader.read_exact_at(offset, ifd_size)?;
        let ifd = Ifd::parse(&ifd_bytes, header)?;

        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    if ifds.is_empty() {
        return Err(TiffError::NoImages);
    }
    Ok(ifds)
}

fn derive_series(
    pages: &[PageInfo],
    description: Option<&str>,
    imagej: Option<&ImageJMetadata>,
) -> Result<(SeriesKind, Vec<usize>, Vec<usize>), TiffError> {
    let first = pages.first().ok_or(TiffError::NoImages)?;
    let page_shape = first.shape();

    if let Some(meta) = imagej {
        let (shape, count) = imagej_shape(meta, first, pages.len())?;
        return Ok((SeriesKind::ImageJ, shape, (0..count).collect()));
    }

    if let Some(shape) = description.and_then(parse_shaped_description) {
        let plane = shape_len(&page_shape).ok_or_else(|| too_large("ImageWidth", &page_shape))?;
        let total = shape_len(&shape).ok_or_else(|| too_large("ImageDescription", &shape))?;
        if plane > 0 && total % plane == 0 {
            let count = (total / plane).min(pages.len());
            return Ok((SeriesKind::Shaped, shape, (0..count).collect()));
        }
        debug!(?shape, "Shaped description does not match page layout, ignoring");
    }

    let key = first.layout_key();
    let indices: Vec<usize> = pages
        .iter()
        .filter(|p| !p.is_reduced() && p.layout_key() == key)
        .map(|p| p.index)
        .collect();

    let mut shape = Vec::with_capacity(page_shape.len() + 1);
    if indices.len() > 1 {
        shape.push(indices.len());
    }
    shape.extend(page_shape);
    Ok((SeriesKind::Generic, shape, indices))
}

/// Series shape from ImageJ counts: frames, slices and channels (each only
/// when > 1), any remaining image count, then the page shape.
fn imagej_shape(
    meta: &ImageJMetadata,
    page: &PageInfo,
    available: usize,
) -> Result<(Vec<usize>, usize), TiffError> {
    let images = meta.images().unwrap_or(available).max(1);
    let frames = meta.frames().unwrap_or(1);
    let slices = meta.slices().unwrap_or(1);
    let channels = meta.channels().unwrap_or(1);
    let rgb = page.samples_per_pixel > 1;

    let mut shape = Vec::new();
    if frames > 1 {
        shape.push(frames);
    }
    if slices > 1 {
        shape.push(slices);
    }
    if channels > 1 && !rgb {
        shape.push(channels);
    }

    let declared = shape_len(&shape).ok_or_else(|| too_large("ImageDescription", &shape))?;
    let remain = images / declared.max(1);
    if remain > 1 {
        shape.push(remain);
    }
    shape.extend(page.shape());

    Ok((shape, images.min(available)))
}

/// Number of elements in an array of `shape`, or `None` if it overflows.
pub fn shape_len(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

fn too_large(tag: &'static str, shape: &[usize]) -> TiffError {
    TiffError::InvalidTagValue {
        tag,
        message: format!("shape {shape:?} is too large"),
    }
}

/// Parse `{"shape": [..]}` descriptions.
fn parse_shaped_description(description: &str) -> Option<Vec<usize>> {
    let trimmed = description.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    value
        .get("shape")?
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| usize::try_from(n).ok()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
