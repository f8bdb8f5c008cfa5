//! In-memory image stacks.
//!
//! An [`ImageStack`] is the decoded first series of a TIFF: a flat typed
//! sample buffer, the series shape, and the shape of a single page. Pages
//! are stored back to back in IFD order, samples interleaved.

use serde::Serialize;

use crate::error::StackError;
use crate::format::imagej::ImageJMetadata;
use crate::format::tiff::shape_len;

// =============================================================================
// SampleType
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    pub const fn name(self) -> &'static str {
        match self {
            SampleType::U8 => "uint8",
            SampleType::U16 => "uint16",
            SampleType::U32 => "uint32",
            SampleType::U64 => "uint64",
            SampleType::I8 => "int8",
            SampleType::I16 => "int16",
            SampleType::I32 => "int32",
            SampleType::I64 => "int64",
            SampleType::F32 => "float32",
            SampleType::F64 => "float64",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }
}

// =============================================================================
// PixelBuffer
// =============================================================================

/// Flat, typed sample storage.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Run `$body` with `$v` bound to the inner vector, whatever its type.
macro_rules! with_samples {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            PixelBuffer::U8($v) => $body,
            PixelBuffer::U16($v) => $body,
            PixelBuffer::U32($v) => $body,
            PixelBuffer::U64($v) => $body,
            PixelBuffer::I8($v) => $body,
            PixelBuffer::I16($v) => $body,
            PixelBuffer::I32($v) => $body,
            PixelBuffer::I64($v) => $body,
            PixelBuffer::F32($v) => $body,
            PixelBuffer::F64($v) => $body,
        }
    };
}

impl PixelBuffer {
    pub fn sample_type(&self) -> SampleType {
        match self {
            PixelBuffer::U8(_) => SampleType::U8,
            PixelBuffer::U16(_) => SampleType::U16,
            PixelBuffer::U32(_) => SampleType::U32,
            PixelBuffer::U64(_) => SampleType::U64,
            PixelBuffer::I8(_) => SampleType::I8,
            PixelBuffer::I16(_) => SampleType::I16,
            PixelBuffer::I32(_) => SampleType::I32,
            PixelBuffer::I64(_) => SampleType::I64,
            PixelBuffer::F32(_) => SampleType::F32,
            PixelBuffer::F64(_) => SampleType::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_samples!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `index` widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        with_samples!(self, v => v.get(index).map(|&x| x as f64))
    }

    /// Samples in `start..end` widened to `f64`.
    pub fn range_f64(&self, start: usize, end: usize) -> Option<Vec<f64>> {
        with_samples!(self, v => v
            .get(start..end)
            .map(|s| s.iter().map(|&x| x as f64).collect()))
    }

    /// Append another buffer of the same sample type.
    pub fn extend_from(&mut self, other: PixelBuffer, page: usize) -> Result<(), StackError> {
        match (self, other) {
            (PixelBuffer::U8(a), PixelBuffer::U8(b)) => a.extend(b),
            (PixelBuffer::U16(a), PixelBuffer::U16(b)) => a.extend(b),
            (PixelBuffer::U32(a), PixelBuffer::U32(b)) => a.extend(b),
            (PixelBuffer::U64(a), PixelBuffer::U64(b)) => a.extend(b),
            (PixelBuffer::I8(a), PixelBuffer::I8(b)) => a.extend(b),
            (PixelBuffer::I16(a), PixelBuffer::I16(b)) => a.extend(b),
            (PixelBuffer::I32(a), PixelBuffer::I32(b)) => a.extend(b),
            (PixelBuffer::I64(a), PixelBuffer::I64(b)) => a.extend(b),
            (PixelBuffer::F32(a), PixelBuffer::F32(b)) => a.extend(b),
            (PixelBuffer::F64(a), PixelBuffer::F64(b)) => a.extend(b),
            (a, b) => {
                return Err(StackError::InconsistentPages {
                    page,
                    expected: a.sample_type().name(),
                    actual: b.sample_type().name(),
                })
            }
        }
        Ok(())
    }

    /// Exact element-wise equality.
    ///
    /// Buffers of the same type compare natively, so NaN never equals NaN.
    /// Buffers of different types compare by value.
    pub fn values_equal(&self, other: &PixelBuffer) -> bool {
        if self.sample_type() == other.sample_type() {
            return self == other;
        }
        if self.len() != other.len() {
            return false;
        }
        (0..self.len()).all(|i| self.get_f64(i) == other.get_f64(i))
    }

    /// Min, max, mean and population standard deviation.
    ///
    /// The result only depends on the multiset of values, never on their
    /// order, so permuted data yields bit-identical statistics.
    pub fn statistics(&self) -> Result<PixelStatistics, StackError> {
        if self.is_empty() {
            return Err(StackError::Empty);
        }

        let exact = match self {
            PixelBuffer::U8(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::U16(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::U32(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::U64(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::I8(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::I16(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::I32(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::I64(v) => integer_statistics(v.iter().map(|&x| x as i128)),
            PixelBuffer::F32(_) | PixelBuffer::F64(_) => None,
        };

        match exact {
            Some(stats) => Ok(stats),
            None => {
                let values = with_samples!(self, v => v.iter().map(|&x| x as f64).collect::<Vec<f64>>());
                Ok(float_statistics(values))
            }
        }
    }
}

// =============================================================================
// PixelStatistics
// =============================================================================

/// Summary statistics, compared with exact `==`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Exact integer sums. Returns `None` if the wide sums overflow.
fn integer_statistics(values: impl Iterator<Item = i128>) -> Option<PixelStatistics> {
    let mut n: i128 = 0;
    let mut sum: i128 = 0;
    let mut sum_sq: i128 = 0;
    let mut min = i128::MAX;
    let mut max = i128::MIN;

    for x in values {
        n += 1;
        sum = sum.checked_add(x)?;
        sum_sq = sum_sq.checked_add(x.checked_mul(x)?)?;
        min = min.min(x);
        max = max.max(x);
    }

    // n^2 * variance = n * sum(x^2) - sum(x)^2, exact and never negative
    let scaled_var = n.checked_mul(sum_sq)?.checked_sub(sum.checked_mul(sum)?)?;
    let n_sq = n.checked_mul(n)?;

    Some(PixelStatistics {
        min: min as f64,
        max: max as f64,
        mean: sum as f64 / n as f64,
        std: (scaled_var as f64 / n_sq as f64).sqrt(),
    })
}

/// Two-pass statistics over a sorted copy. Any NaN makes every field NaN.
fn float_statistics(mut values: Vec<f64>) -> PixelStatistics {
    if values.iter().any(|x| x.is_nan()) {
        return PixelStatistics {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
        };
    }

    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;

    PixelStatistics {
        min: values[0],
        max: values[values.len() - 1],
        mean,
        std: var.sqrt(),
    }
}

// =============================================================================
// PageShape / ImageStack
// =============================================================================

/// Shape of one page: rows, columns and interleaved samples per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageShape {
    pub height: usize,
    pub width: usize,
    pub samples: usize,
}

impl PageShape {
    pub fn new(height: usize, width: usize, samples: usize) -> Self {
        Self {
            height,
            width,
            samples,
        }
    }

    /// Number of samples in one page.
    pub fn plane_len(&self) -> usize {
        self.height
            .saturating_mul(self.width)
            .saturating_mul(self.samples)
    }

    /// `(h, w)` for single-sample pages, `(h, w, s)` otherwise.
    pub fn dims(&self) -> Vec<usize> {
        if self.samples > 1 {
            vec![self.height, self.width, self.samples]
        } else {
            vec![self.height, self.width]
        }
    }
}

/// A decoded image series.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStack {
    /// Series shape, leading axes first
    pub shape: Vec<usize>,
    pub page: PageShape,
    pub pixels: PixelBuffer,
    pub imagej: Option<ImageJMetadata>,
}

impl ImageStack {
    /// Build a stack from raw parts, checking the buffer fits the shape.
    pub fn new(
        shape: Vec<usize>,
        page: PageShape,
        pixels: PixelBuffer,
        imagej: Option<ImageJMetadata>,
    ) -> Result<Self, StackError> {
        let expected = shape_len(&shape).ok_or_else(|| {
            StackError::UnsupportedLayout(format!("shape {shape:?} is too large"))
        })?;
        if expected != pixels.len() {
            return Err(StackError::UnsupportedLayout(format!(
                "shape {:?} needs {} samples, buffer holds {}",
                shape,
                expected,
                pixels.len()
            )));
        }
        if page.plane_len() == 0 || pixels.len() % page.plane_len() != 0 {
            return Err(StackError::UnsupportedLayout(format!(
                "buffer of {} samples is not a whole number of {}x{}x{} pages",
                pixels.len(),
                page.height,
                page.width,
                page.samples
            )));
        }

        Ok(Self {
            shape,
            page,
            pixels,
            imagej,
        })
    }

    /// Plain stack of `frames` pages with no metadata.
    ///
    /// A single frame keeps the page shape; more frames add a leading axis.
    pub fn from_frames(
        frames: usize,
        page: PageShape,
        pixels: PixelBuffer,
    ) -> Result<Self, StackError> {
        let mut shape = Vec::with_capacity(4);
        if frames > 1 {
            shape.push(frames);
        }
        shape.extend(page.dims());
        Self::new(shape, page, pixels, None)
    }

    pub fn sample_type(&self) -> SampleType {
        self.pixels.sample_type()
    }

    /// Number of page-shaped planes, counted over all leading axes.
    pub fn frame_count(&self) -> usize {
        self.pixels.len() / self.page.plane_len()
    }

    /// Samples of frame `index` widened to `f64`.
    pub fn frame_f64(&self, index: usize) -> Option<Vec<f64>> {
        let plane = self.page.plane_len();
        let start = index.checked_mul(plane)?;
        self.pixels.range_f64(start, start.checked_add(plane)?)
    }

    /// Shape and value equality.
    pub fn pixels_equal(&self, other: &ImageStack) -> bool {
        self.shape == other.shape && self.pixels.values_equal(&other.pixels)
    }

    pub fn statistics(&self) -> Result<PixelStatistics, StackError> {
        self.pixels.statistics()
    }
}
