//! Row profiles: one scalar of liquid-level evidence per row (or band).
//!
//! Extraction is restricted to the region's search window and never mutates
//! the input image. A region whose window does not overlap the image yields an
//! empty profile; it is up to the finder to report that as "no level".

use meniscus_core::{
    hsv_from_rgb, relative_height, GrayImage, GrayImageView, RegionBounds, RegionMask,
    RgbImageView,
};
use serde::{Deserialize, Serialize};

use crate::edges::horizontal_edge_map;
use crate::params::{EdgeDensityParams, ProfileStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// First image row of the band.
    pub row: usize,
    pub value: f64,
}

/// Ordered `(row, value)` pairs, top to bottom.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowProfile {
    pub entries: Vec<ProfileEntry>,
    /// Height of the image the rows refer to.
    pub image_height: usize,
    /// Rows per entry.
    pub band_rows: usize,
}

impl RowProfile {
    pub fn new(image_height: usize, band_rows: usize) -> Self {
        Self {
            entries: Vec::new(),
            image_height,
            band_rows,
        }
    }

    /// Profile with one entry per row starting at `first_row`.
    pub fn from_values(first_row: usize, image_height: usize, values: &[f64]) -> Self {
        let entries = values
            .iter()
            .enumerate()
            .map(|(i, &value)| ProfileEntry {
                row: first_row + i,
                value,
            })
            .collect();
        Self {
            entries,
            image_height,
            band_rows: 1,
        }
    }

    pub fn push(&mut self, row: usize, value: f64) {
        self.entries.push(ProfileEntry { row, value });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    pub fn relative_height(&self, row: usize) -> f64 {
        relative_height(row, self.image_height)
    }

    /// Mean value over entries in `range` (entry indices), `None` if empty.
    pub fn mean_over(&self, range: std::ops::Range<usize>) -> Option<f64> {
        let slice = self.entries.get(range)?;
        if slice.is_empty() {
            return None;
        }
        Some(slice.iter().map(|e| e.value).sum::<f64>() / slice.len() as f64)
    }
}

/// Edge-density profile together with the edge image it was counted on.
#[derive(Clone, Debug)]
pub struct EdgeDensityProfile {
    pub profile: RowProfile,
    pub edges: GrayImage,
}

/// Hue, saturation and brightness row means over the region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorProfiles {
    pub hue: RowProfile,
    pub saturation: RowProfile,
    pub brightness: RowProfile,
}

impl ColorProfiles {
    pub fn is_empty(&self) -> bool {
        self.brightness.is_empty()
    }
}

/// Output of [`extract_profile`].
#[derive(Clone, Debug)]
pub enum ExtractedProfile {
    EdgeDensity(EdgeDensityProfile),
    ColorSignal(ColorProfiles),
}

fn search_window(region: &RegionMask, width: usize, height: usize) -> Option<RegionBounds> {
    region
        .bounds()?
        .clip_to(meniscus_core::ImageSize::new(width, height))
}

/// Fraction of region pixels that are horizontal edge pixels, per band of
/// `rows_to_count` rows starting at the top of the window.
pub fn edge_density_profile(
    gray: &GrayImageView<'_>,
    region: &RegionMask,
    params: &EdgeDensityParams,
) -> EdgeDensityProfile {
    let band = params.rows_to_count.max(1);
    let mut profile = RowProfile::new(gray.height, band);

    let Some(window) = search_window(region, gray.width, gray.height) else {
        log::debug!("search window is empty, returning empty edge profile");
        return EdgeDensityProfile {
            profile,
            edges: GrayImage::new(gray.width, gray.height),
        };
    };

    let edges = horizontal_edge_map(gray, &window, &params.edges);
    let edge_view = edges.view();

    for start in (window.top..window.bottom).step_by(band) {
        let end = (start + band).min(window.bottom);
        let mut members = 0usize;
        let mut hits = 0usize;
        for y in start..end {
            let row = edge_view.row(y);
            for x in window.left..window.right {
                if region.contains(x, y) {
                    members += 1;
                    if row[x] != 0 {
                        hits += 1;
                    }
                }
            }
        }
        let value = if members == 0 {
            0.0
        } else {
            hits as f64 / members as f64
        };
        profile.push(start, value);
    }

    EdgeDensityProfile { profile, edges }
}

/// Per-row HSV means over region members.
///
/// A row of the window without members averages over the full window span.
pub fn color_profiles(image: &RgbImageView<'_>, region: &RegionMask) -> ColorProfiles {
    let mut out = ColorProfiles {
        hue: RowProfile::new(image.height, 1),
        saturation: RowProfile::new(image.height, 1),
        brightness: RowProfile::new(image.height, 1),
    };
    let Some(window) = search_window(region, image.width, image.height) else {
        log::debug!("search window is empty, returning empty colour profiles");
        return out;
    };

    for y in window.top..window.bottom {
        let mut sums = [0.0f64; 3];
        let mut count = 0usize;
        let mut accumulate = |x: usize, sums: &mut [f64; 3]| {
            let hsv = hsv_from_rgb(image.pixel(x, y));
            sums[0] += hsv.h as f64;
            sums[1] += hsv.s as f64;
            sums[2] += hsv.v as f64;
        };
        for x in (window.left..window.right).filter(|&x| region.contains(x, y)) {
            accumulate(x, &mut sums);
            count += 1;
        }
        if count == 0 {
            for x in window.left..window.right {
                accumulate(x, &mut sums);
            }
            count = window.width();
        }
        let n = count as f64;
        out.hue.push(y, sums[0] / n);
        out.saturation.push(y, sums[1] / n);
        out.brightness.push(y, sums[2] / n);
    }
    out
}

/// Run the extractor selected by `strategy`.
pub fn extract_profile(
    image: &RgbImageView<'_>,
    region: &RegionMask,
    strategy: &ProfileStrategy,
) -> ExtractedProfile {
    match strategy {
        ProfileStrategy::EdgeDensity(params) => {
            let gray = image.to_gray();
            ExtractedProfile::EdgeDensity(edge_density_profile(&gray.view(), region, params))
        }
        ProfileStrategy::ColorSignal(_) => {
            ExtractedProfile::ColorSignal(color_profiles(image, region))
        }
    }
}
