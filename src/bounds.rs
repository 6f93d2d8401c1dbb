//! Content-bounds detection over decoded pixel buffers
//!
//! Two interchangeable strategies locate the tightest rectangle containing
//! foreground artwork in a (typically background-stripped) image:
//!
//! - [`ColorDistanceStrategy`] excludes a dominant base color and keeps
//!   pixels that contrast with it — works when artwork differs in color.
//! - [`DensityStrategy`] thresholds per-row/per-column opacity density —
//!   works for subtle textures on a transparent field.
//!
//! Strategies are explicit values chained by the caller; see
//! [`detect_artwork_bounds`] for the shipped chain.

use crate::types::BoundingBox;
use image::RgbaImage;
use std::collections::HashMap;
use tracing::debug;

/// Alpha level above which a pixel counts as content for scanning purposes
const CONTENT_ALPHA_THRESHOLD: u8 = 10;

/// Alpha level above which a pixel is considered fully opaque when sampling
/// for the dominant color
const OPAQUE_ALPHA_THRESHOLD: u8 = 200;

/// A content-bounds detection algorithm
///
/// Returns `None` when no content is found; the caller decides the fallback
/// (another strategy, or the full-image bounds).
pub trait BoundsStrategy {
    /// Detect the tightest content rectangle, or `None` if the image has no
    /// detectable content
    fn detect(&self, image: &RgbaImage) -> Option<BoundingBox>;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Dominant-color exclusion strategy
///
/// Samples opaque pixels on a stride, quantizes channels, and takes the most
/// frequent quantized color as the background proxy. Pixels whose RGB
/// distance from it exceeds the cutoff are foreground. Falls back to an
/// alpha-only scan when nothing contrasts, so a non-transparent image always
/// yields bounds.
#[derive(Debug, Clone)]
pub struct ColorDistanceStrategy {
    /// Sample every Nth pixel when estimating the dominant color
    pub sample_stride: u32,
    /// Channel quantization step for frequency counting
    pub quantization: u8,
    /// Euclidean RGB distance above which a pixel counts as foreground
    pub distance_cutoff: f32,
}

impl Default for ColorDistanceStrategy {
    fn default() -> Self {
        Self {
            sample_stride: 10,
            quantization: 32,
            distance_cutoff: 30.0,
        }
    }
}

impl ColorDistanceStrategy {
    /// Most frequent quantized color among sampled fully-opaque pixels
    ///
    /// `None` when the image has no opaque pixels to sample.
    fn dominant_color(&self, image: &RgbaImage) -> Option<[u8; 3]> {
        let step = u16::from(self.quantization.max(1));
        let mut counts: HashMap<[u8; 3], u32> = HashMap::new();

        for (index, pixel) in image.pixels().enumerate() {
            if index as u32 % self.sample_stride != 0 {
                continue;
            }
            if pixel[3] <= OPAQUE_ALPHA_THRESHOLD {
                continue;
            }
            let quantized = [
                quantize_channel(pixel[0], step),
                quantize_channel(pixel[1], step),
                quantize_channel(pixel[2], step),
            ];
            *counts.entry(quantized).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(color, _)| color)
    }
}

/// Quantize one channel to the nearest multiple of `step`
fn quantize_channel(value: u8, step: u16) -> u8 {
    let rounded = (u16::from(value) + step / 2) / step * step;
    rounded.min(255) as u8
}

/// Squared Euclidean distance between two RGB triples
fn color_distance_sq(a: [u8; 3], b: [u8; 3]) -> f32 {
    let dr = f32::from(a[0]) - f32::from(b[0]);
    let dg = f32::from(a[1]) - f32::from(b[1]);
    let db = f32::from(a[2]) - f32::from(b[2]);
    dr * dr + dg * dg + db * db
}

impl BoundsStrategy for ColorDistanceStrategy {
    fn detect(&self, image: &RgbaImage) -> Option<BoundingBox> {
        let dominant = self.dominant_color(image);
        let cutoff_sq = self.distance_cutoff * self.distance_cutoff;

        if let Some(dominant) = dominant {
            let mut accumulator = BoundsAccumulator::new();
            for (x, y, pixel) in image.enumerate_pixels() {
                if pixel[3] <= CONTENT_ALPHA_THRESHOLD {
                    continue;
                }
                let rgb = [pixel[0], pixel[1], pixel[2]];
                if color_distance_sq(rgb, dominant) > cutoff_sq {
                    accumulator.include(x, y);
                }
            }
            if let Some(bounds) = accumulator.finish() {
                return Some(bounds);
            }
            debug!("No pixel contrasts with dominant color; using alpha-only scan");
        }

        // Basic fallback: any translucency-sensitive content counts. Returns
        // None only for a fully transparent image.
        let mut accumulator = BoundsAccumulator::new();
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[3] > CONTENT_ALPHA_THRESHOLD {
                accumulator.include(x, y);
            }
        }
        accumulator.finish()
    }

    fn name(&self) -> &'static str {
        "color-distance"
    }
}

/// Row/column opacity-density strategy
///
/// Computes the fraction of pixels per row and per column whose alpha clears
/// a small threshold, then scans inward from each side until the density
/// exceeds `threshold`.
#[derive(Debug, Clone)]
pub struct DensityStrategy {
    /// Fraction of opaque pixels a row/column needs to count as content
    pub threshold: f32,
}

impl Default for DensityStrategy {
    fn default() -> Self {
        Self { threshold: 0.05 }
    }
}

impl BoundsStrategy for DensityStrategy {
    fn detect(&self, image: &RgbaImage) -> Option<BoundingBox> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let mut row_counts = vec![0u32; height as usize];
        let mut col_counts = vec![0u32; width as usize];
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[3] > CONTENT_ALPHA_THRESHOLD {
                row_counts[y as usize] += 1;
                col_counts[x as usize] += 1;
            }
        }

        let row_dense =
            |y: usize| row_counts[y] as f32 / width as f32 > self.threshold;
        let col_dense =
            |x: usize| col_counts[x] as f32 / height as f32 > self.threshold;

        let top = (0..height as usize).find(|&y| row_dense(y))?;
        let bottom = (0..height as usize).rfind(|&y| row_dense(y))?;
        let left = (0..width as usize).find(|&x| col_dense(x))?;
        let right = (0..width as usize).rfind(|&x| col_dense(x))?;

        BoundingBox::new(left as u32, top as u32, right as u32 + 1, bottom as u32 + 1).ok()
    }

    fn name(&self) -> &'static str {
        "density"
    }
}

/// Min/max accumulator over included pixel coordinates
struct BoundsAccumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    any: bool,
}

impl BoundsAccumulator {
    fn new() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            any: false,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.any = true;
    }

    fn finish(&self) -> Option<BoundingBox> {
        if !self.any {
            return None;
        }
        BoundingBox::new(self.min_x, self.min_y, self.max_x + 1, self.max_y + 1).ok()
    }
}

/// Shipped detection chain: cheap density pass first, color-distance on a
/// miss, full-image bounds as the final fallback; result padded and clamped
/// to the image extents
#[must_use]
pub fn detect_artwork_bounds(
    image: &RgbaImage,
    padding: u32,
    density_threshold: f32,
) -> BoundingBox {
    let (width, height) = image.dimensions();

    let strategies: [&dyn BoundsStrategy; 2] = [
        &DensityStrategy {
            threshold: density_threshold,
        },
        &ColorDistanceStrategy::default(),
    ];

    for strategy in strategies {
        if let Some(bounds) = strategy.detect(image) {
            debug!(
                "Bounds detected by {} strategy: {}x{}+{}+{}",
                strategy.name(),
                bounds.width(),
                bounds.height(),
                bounds.left,
                bounds.top
            );
            return bounds.pad(padding, width, height);
        }
    }

    debug!("No content found by any strategy; keeping full-image bounds");
    BoundingBox::full(width, height)
}
