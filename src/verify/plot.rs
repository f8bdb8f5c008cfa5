//! PNG rendering of a verification frame.
//!
//! Three panels side by side: the original frame and the compressed frame
//! in grayscale (each stretched to its own min/max), then the difference
//! map in a red/white/blue diverging scale centred on zero, followed by a
//! vertical colour bar for that scale.
//!
//! Multi-sample pixels are averaged for the grayscale panels; the
//! difference panel shows the sample with the largest absolute difference.

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

use crate::error::VerifyError;
use crate::stack::PageShape;

/// Panels are scaled up by an integer factor until at least this tall,
/// as long as the longer edge stays within [`MAX_PANEL_EDGE`].
pub const MIN_PANEL_HEIGHT: usize = 256;

/// Upper bound on the scale factor.
const MAX_SCALE: usize = 32;

/// Longest edge of one panel. Larger frames are downsampled to fit.
pub const MAX_PANEL_EDGE: usize = 2048;

const MARGIN: u32 = 16;
const GAP: u32 = 16;
const COLORBAR_WIDTH: u32 = 20;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// RdBu anchor colours, from most negative (dark red) to most positive
/// (dark blue).
const RDBU: [[u8; 3]; 11] = [
    [103, 0, 31],
    [178, 24, 43],
    [214, 96, 77],
    [244, 165, 130],
    [253, 219, 199],
    [247, 247, 247],
    [209, 229, 240],
    [146, 197, 222],
    [67, 147, 195],
    [33, 102, 172],
    [5, 48, 97],
];

/// Frame data for one verification plot.
pub struct PlotInput<'a> {
    pub page: PageShape,
    pub original: &'a [f64],
    pub compressed: &'a [f64],
    pub difference: &'a [f64],
}

/// Render the three-panel plot as PNG bytes.
pub fn render_verification_png(input: &PlotInput<'_>) -> Result<Bytes, VerifyError> {
    let page = input.page;
    let plane = page.plane_len();
    if plane == 0
        || input.original.len() != plane
        || input.compressed.len() != plane
        || input.difference.len() != plane
    {
        return Err(VerifyError::Render {
            message: format!(
                "frame buffers do not match a {}x{}x{} page",
                page.height, page.width, page.samples
            ),
        });
    }

    let original = reduce(input.original, page.samples, mean);
    let compressed = reduce(input.compressed, page.samples, mean);
    let difference = reduce(input.difference, page.samples, largest_magnitude);

    let layout = PanelLayout::for_page(page.height, page.width);
    let panel_w = layout.width;
    let panel_h = layout.height;

    let width = MARGIN * 2 + panel_w * 3 + GAP * 3 + COLORBAR_WIDTH;
    let height = MARGIN * 2 + panel_h;
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    let gray_original = grayscale(&original);
    let gray_compressed = grayscale(&compressed);
    let limit = difference
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));

    let mut x0 = MARGIN;
    draw_panel(&mut canvas, x0, page, layout, |i| gray_original[i]);
    x0 += panel_w + GAP;
    draw_panel(&mut canvas, x0, page, layout, |i| gray_compressed[i]);
    x0 += panel_w + GAP;
    draw_panel(&mut canvas, x0, page, layout, |i| diverging(difference[i], limit));
    x0 += panel_w + GAP;

    for y in 0..panel_h {
        let t = 1.0 - y as f64 / (panel_h.max(2) - 1) as f64;
        let color = rdbu(t);
        for x in 0..COLORBAR_WIDTH {
            canvas.put_pixel(x0 + x, MARGIN + y, color);
        }
    }

    let mut output = Vec::new();
    PngEncoder::new(&mut output)
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| VerifyError::Render {
            message: e.to_string(),
        })?;

    Ok(Bytes::from(output))
}

fn panel_scale(height: usize) -> usize {
    if height == 0 {
        return 1;
    }
    MIN_PANEL_HEIGHT.div_ceil(height).clamp(1, MAX_SCALE)
}

/// Size of one panel and how its pixels map back onto the frame.
///
/// Small frames are repeated `scale` times per axis; frames with an edge
/// over [`MAX_PANEL_EDGE`] show every `step`-th pixel instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PanelLayout {
    width: u32,
    height: u32,
    scale: usize,
    step: usize,
}

impl PanelLayout {
    fn for_page(height: usize, width: usize) -> Self {
        let longest = height.max(width).max(1);
        if longest > MAX_PANEL_EDGE {
            let step = longest.div_ceil(MAX_PANEL_EDGE);
            return Self {
                width: width.div_ceil(step) as u32,
                height: height.div_ceil(step) as u32,
                scale: 1,
                step,
            };
        }

        let scale = panel_scale(height).min((MAX_PANEL_EDGE / longest).max(1));
        Self {
            width: (width * scale) as u32,
            height: (height * scale) as u32,
            scale,
            step: 1,
        }
    }

    /// Frame `(row, col)` shown at panel pixel `(x, y)`.
    fn source(&self, x: u32, y: u32) -> (usize, usize) {
        (
            y as usize / self.scale * self.step,
            x as usize / self.scale * self.step,
        )
    }
}

fn draw_panel(
    canvas: &mut RgbImage,
    x0: u32,
    page: PageShape,
    layout: PanelLayout,
    color_at: impl Fn(usize) -> Rgb<u8>,
) {
    for y in 0..layout.height {
        for x in 0..layout.width {
            let (row, col) = layout.source(x, y);
            canvas.put_pixel(x0 + x, MARGIN + y, color_at(row * page.width + col));
        }
    }
}

/// Collapse interleaved samples to one value per pixel.
fn reduce(values: &[f64], samples: usize, f: fn(&[f64]) -> f64) -> Vec<f64> {
    values.chunks_exact(samples.max(1)).map(f).collect()
}

fn mean(pixel: &[f64]) -> f64 {
    pixel.iter().sum::<f64>() / pixel.len() as f64
}

fn largest_magnitude(pixel: &[f64]) -> f64 {
    pixel
        .iter()
        .copied()
        .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc })
}

/// Min/max stretched grayscale. Constant or non-finite input renders black.
fn grayscale(values: &[f64]) -> Vec<Rgb<u8>> {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;

    values
        .iter()
        .map(|&v| {
            let level = if v.is_finite() && span > 0.0 {
                ((v - lo) / span * 255.0).round() as u8
            } else {
                0
            };
            Rgb([level, level, level])
        })
        .collect()
}

/// Map a difference onto the diverging scale, `limit` at either extreme.
fn diverging(value: f64, limit: f64) -> Rgb<u8> {
    if !value.is_finite() || limit == 0.0 {
        return rdbu(0.5);
    }
    rdbu(0.5 + 0.5 * (value / limit).clamp(-1.0, 1.0))
}

/// Interpolate the RdBu scale at `t` in `[0, 1]`.
fn rdbu(t: f64) -> Rgb<u8> {
    let pos = t.clamp(0.0, 1.0) * (RDBU.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(RDBU.len() - 1);
    let frac = pos - lower as f64;

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let a = RDBU[lower][c] as f64;
        let b = RDBU[upper][c] as f64;
        *slot = (a + (b - a) * frac).round() as u8;
    }
    Rgb(out)
}
