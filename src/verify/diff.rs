use serde::Serialize;

use crate::error::VerifyError;
use crate::stack::{ImageStack, PageShape};

/// Signed per-sample difference `original - compressed` for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifferenceMap {
    pub frame: usize,
    /// `(h, w)` or `(h, w, s)`
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
    #[serde(skip)]
    pub page: PageShape,
}

impl DifferenceMap {
    /// Compute the difference for `frame`.
    ///
    /// A frame is one page-shaped plane, counted across all leading axes.
    pub fn compute(
        original: &ImageStack,
        compressed: &ImageStack,
        frame: usize,
    ) -> Result<Self, VerifyError> {
        if original.shape != compressed.shape || original.page != compressed.page {
            return Err(VerifyError::ShapeMismatch {
                original: original.shape.clone(),
                compressed: compressed.shape.clone(),
            });
        }

        let frames = original.frame_count();
        let out_of_range = VerifyError::FrameOutOfRange { frame, frames };
        let a = original.frame_f64(frame).ok_or(out_of_range.clone())?;
        let b = compressed.frame_f64(frame).ok_or(out_of_range)?;

        Ok(Self {
            frame,
            shape: original.page.dims(),
            values: a.iter().zip(&b).map(|(x, y)| x - y).collect(),
            page: original.page,
        })
    }

    /// Whether every sample is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Largest absolute difference, ignoring NaN.
    pub fn max_abs(&self) -> f64 {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Number of samples that differ.
    pub fn changed(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0.0).count()
    }
}
