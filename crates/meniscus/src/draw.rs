//! Overlays of detected levels and reference/tolerance rows.
//!
//! Every line spans the full image width and is one pixel thick. Heights are
//! relative (`0.0` = top row) and are mapped onto the image being drawn on.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::core::absolute_row;
use crate::level::LevelCandidate;
use crate::track::ToleranceTracker;

/// Line colours of an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayColors {
    pub level: Rgb<u8>,
    pub reference: Rgb<u8>,
    pub tolerance: Rgb<u8>,
}

impl Default for OverlayColors {
    fn default() -> Self {
        Self {
            level: Rgb([0, 255, 0]),
            reference: Rgb([255, 0, 0]),
            tolerance: Rgb([0, 0, 255]),
        }
    }
}

/// Draw a horizontal line at `relative` height. Heights at or past the
/// bottom land on the last row.
pub fn draw_height(img: &mut RgbImage, relative: f64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let row = absolute_row(relative, h as usize).min(h as usize - 1) as u32;
    for x in 0..w {
        img.put_pixel(x, row, color);
    }
}

/// One line per candidate.
pub fn draw_levels(img: &mut RgbImage, candidates: &[LevelCandidate], color: Rgb<u8>) {
    for c in candidates {
        draw_height(img, c.relative_height, color);
    }
}

/// Reference lines, then tolerance lines, of `tracker`.
pub fn draw_tracker(img: &mut RgbImage, tracker: &ToleranceTracker, colors: &OverlayColors) {
    for h in tracker.reference_heights() {
        draw_height(img, h, colors.reference);
    }
    if let Some(bounds) = tracker.tolerance() {
        for h in bounds.levels() {
            draw_height(img, h, colors.tolerance);
        }
    }
}

/// Copy of `img` with levels, then the tracker's lines, drawn on top.
pub fn overlay(
    img: &RgbImage,
    candidates: &[LevelCandidate],
    tracker: Option<&ToleranceTracker>,
    colors: &OverlayColors,
) -> RgbImage {
    let mut out = img.clone();
    draw_levels(&mut out, candidates, colors.level);
    if let Some(tracker) = tracker {
        draw_tracker(&mut out, tracker, colors);
    }
    out
}

/// Write an overlay as PNG to `path`.
pub fn save_overlay(
    path: impl AsRef<Path>,
    img: &RgbImage,
    candidates: &[LevelCandidate],
    tracker: Option<&ToleranceTracker>,
) -> Result<PathBuf, image::ImageError> {
    let path = path.as_ref().to_path_buf();
    overlay(img, candidates, tracker, &OverlayColors::default()).save(&path)?;
    log::debug!("overlay written to {}", path.display());
    Ok(path)
}
