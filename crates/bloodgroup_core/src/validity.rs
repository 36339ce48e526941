//! Edge-density heuristic that rejects images without fingerprint-like ridge texture.

use crate::config::PipelineConfig;
use crate::preprocess::load_grayscale;
use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use std::path::Path;

/// Pixel value `canny_edges` writes for an edge.
const EDGE_PIXEL: u8 = 255;

/// tan(22.5°): splits gradient directions into horizontal, vertical and diagonal sectors.
const TAN_22_5: f32 = 0.414_213_57;

/// Decides whether the file at `path` plausibly holds a fingerprint.
///
/// Implementations never fail: anything that cannot be judged is rejected.
pub trait FingerprintCheck {
    fn is_fingerprint(&self, path: &Path) -> bool;
}

/// Canny edge detection followed by a fixed percentage cut-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeDensityFilter {
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub min_edge_percent: f32,
}

impl Default for EdgeDensityFilter {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl EdgeDensityFilter {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            low_threshold: cfg.canny_low,
            high_threshold: cfg.canny_high,
            min_edge_percent: cfg.min_edge_percent,
        }
    }

    /// Percentage (0..=100) of pixels marked as edges.
    pub fn edge_percentage(&self, img: &GrayImage) -> f32 {
        if img.width() == 0 || img.height() == 0 {
            return 0.0;
        }
        let edges = canny_edges(img, self.low_threshold, self.high_threshold);
        edge_map_percentage(&edges)
    }

    pub fn accepts_image(&self, img: &GrayImage) -> bool {
        let percentage = self.edge_percentage(img);
        let accepted = exceeds_threshold(percentage, self.min_edge_percent);
        tracing::debug!(
            "edge density {percentage:.2}% (need > {}%): {}",
            self.min_edge_percent,
            if accepted { "accepted" } else { "rejected" }
        );
        accepted
    }
}

impl FingerprintCheck for EdgeDensityFilter {
    fn is_fingerprint(&self, path: &Path) -> bool {
        match load_grayscale(path) {
            Ok(img) => self.accepts_image(&img),
            Err(e) => {
                tracing::warn!("fingerprint check could not decode {}: {e}", path.display());
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Suppressed,
    Weak,
    Strong,
}

/// Canny edge map over the raw image: 3x3 Sobel with replicated borders, L1
/// gradient magnitude `|gx| + |gy|`, no smoothing beforehand.
///
/// A pixel is a candidate when its magnitude is above `low` and it is a local
/// maximum along its gradient direction; candidates above `high` seed edges
/// that grow through 8-connected candidates. Edges are 255, the rest 0.
pub fn canny_edges(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let gx = horizontal_sobel(img);
    let gy = vertical_sobel(img);
    let magnitude: Vec<i32> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(dx, dy)| i32::from(dx.0[0]).abs() + i32::from(dy.0[0]).abs())
        .collect();
    // Outside the raster the magnitude is zero.
    let mag_at = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
            0
        } else {
            magnitude[y as usize * width as usize + x as usize]
        }
    };

    let mut candidates = vec![Candidate::Suppressed; magnitude.len()];
    for (x, y, dx) in gx.enumerate_pixels() {
        let i = y as usize * width as usize + x as usize;
        let m = magnitude[i];
        if (m as f32) <= low {
            continue;
        }
        let dx = i32::from(dx.0[0]);
        let dy = i32::from(gy.get_pixel(x, y).0[0]);
        let (x, y) = (i64::from(x), i64::from(y));
        let xs = dx.abs() as f32;
        let ys = dy.abs() as f32;
        let tan_x = xs * TAN_22_5;
        let local_max = if ys < tan_x {
            m > mag_at(x - 1, y) && m >= mag_at(x + 1, y)
        } else if ys > tan_x + 2.0 * xs {
            m > mag_at(x, y - 1) && m >= mag_at(x, y + 1)
        } else {
            let s = if (dx ^ dy) < 0 { -1 } else { 1 };
            m > mag_at(x - s, y - 1) && m > mag_at(x + s, y + 1)
        };
        if local_max {
            candidates[i] = if (m as f32) > high {
                Candidate::Strong
            } else {
                Candidate::Weak
            };
        }
    }

    let edges = link_edges(&candidates, width, height);
    GrayImage::from_fn(width, height, |x, y| {
        if edges[y as usize * width as usize + x as usize] {
            Luma([EDGE_PIXEL])
        } else {
            Luma([0])
        }
    })
}

/// Hysteresis: strong candidates are edges, and so is every weak candidate
/// 8-connected to one through other candidates.
fn link_edges(candidates: &[Candidate], width: u32, height: u32) -> Vec<bool> {
    let (w, h) = (width as usize, height as usize);
    let mut edges = vec![false; candidates.len()];
    let mut stack: Vec<usize> = Vec::new();
    for (i, c) in candidates.iter().enumerate() {
        if *c == Candidate::Strong {
            edges[i] = true;
            stack.push(i);
        }
    }
    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if !edges[n] && candidates[n] == Candidate::Weak {
                    edges[n] = true;
                    stack.push(n);
                }
            }
        }
    }
    edges
}

/// Share of pixels in an edge map that are set to the edge value.
pub fn edge_map_percentage(edges: &GrayImage) -> f32 {
    let total = edges.width() as usize * edges.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let edge_pixels = edges.pixels().filter(|p| p.0[0] == EDGE_PIXEL).count();
    edge_pixels as f32 / total as f32 * 100.0
}

/// Strict comparison: an image sitting exactly on the cut-off is rejected.
pub fn exceeds_threshold(edge_percent: f32, min_edge_percent: f32) -> bool {
    edge_percent > min_edge_percent
}
