//! Edge map tuned for horizontal liquid boundaries.
//!
//! Pipeline: contrast stretch over the search window, Canny with thresholds
//! derived from the window median, then a morphological opening with a
//! horizontal line element so that only horizontal edge runs survive.

use meniscus_core::{GrayImage, GrayImageView, RegionBounds};

use crate::params::EdgeParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Linear min/max stretch to [0, 255], statistics taken inside `window`.
///
/// A flat window leaves the image unchanged.
pub fn normalize_contrast(gray: &GrayImageView<'_>, window: &RegionBounds) -> GrayImage {
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for y in window.top..window.bottom {
        for &v in &gray.row(y)[window.left..window.right] {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if hi <= lo {
        return gray.to_owned_image();
    }

    let scale = 255.0 / (hi - lo) as f32;
    let data = gray
        .data
        .iter()
        .map(|&v| ((v.saturating_sub(lo)) as f32 * scale).round().min(255.0) as u8)
        .collect();
    GrayImage {
        width: gray.width,
        height: gray.height,
        data,
    }
}

/// Median intensity inside `window`.
pub fn median_in_window(gray: &GrayImageView<'_>, window: &RegionBounds) -> u8 {
    let mut hist = [0u32; 256];
    let mut total = 0u32;
    for y in window.top..window.bottom {
        for &v in &gray.row(y)[window.left..window.right] {
            hist[v as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0;
    }
    let half = total.div_ceil(2);
    let mut acc = 0u32;
    for (v, &count) in hist.iter().enumerate() {
        acc += count;
        if acc >= half {
            return v as u8;
        }
    }
    u8::MAX
}

/// `(lower, upper)` hysteresis thresholds around the median.
pub fn auto_canny_thresholds(median: u8, sigma: f32) -> (f32, f32) {
    let m = median as f32;
    let lower = ((1.0 - sigma) * m).max(0.0).floor();
    let upper = ((1.0 + sigma) * m).min(255.0).floor();
    (lower, upper)
}

/// 3x3 Sobel derivatives with replicated borders.
fn sobel(gray: &GrayImageView<'_>) -> (Vec<i32>, Vec<i32>) {
    let (w, h) = (gray.width, gray.height);
    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    for y in 0..h {
        for x in 0..w {
            let p = |dx: isize, dy: isize| {
                gray.get_clamped(x as isize + dx, y as isize + dy) as i32
            };
            let idx = y * w + x;
            gx[idx] = (p(1, -1) + 2 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2 * p(-1, 0) + p(-1, 1));
            gy[idx] = (p(-1, 1) + 2 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2 * p(0, -1) + p(1, -1));
        }
    }
    (gx, gy)
}

/// Canny edge detector; output pixels are `0` or `255`.
///
/// Magnitude is the L1 norm of the Sobel gradient. A pixel is a strong seed
/// when its suppressed magnitude exceeds `high`, and joins an edge through
/// 8-connected pixels exceeding `low`.
pub fn canny(gray: &GrayImageView<'_>, low: f32, high: f32) -> GrayImage {
    let (w, h) = (gray.width, gray.height);
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let (gx, gy) = sobel(gray);
    let mag: Vec<i32> = gx.iter().zip(&gy).map(|(a, b)| a.abs() + b.abs()).collect();
    let mag_at = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong seed
    let mut class = vec![0u8; w * h];
    let mut seeds = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let m = mag[idx];
            if m as f32 <= low {
                continue;
            }
            let ax = gx[idx].abs() as f32;
            let ay = gy[idx].abs() as f32;
            let (xi, yi) = (x as isize, y as isize);
            let (prev, next) = if ay <= ax * TAN_22_5 {
                (mag_at(xi - 1, yi), mag_at(xi + 1, yi))
            } else if ay >= ax * TAN_67_5 {
                (mag_at(xi, yi - 1), mag_at(xi, yi + 1))
            } else if (gx[idx] > 0) == (gy[idx] > 0) {
                (mag_at(xi - 1, yi - 1), mag_at(xi + 1, yi + 1))
            } else {
                (mag_at(xi + 1, yi - 1), mag_at(xi - 1, yi + 1))
            };
            if m > prev && m >= next {
                if m as f32 > high {
                    class[idx] = 2;
                    seeds.push(idx);
                } else {
                    class[idx] = 1;
                }
            }
        }
    }

    while let Some(idx) = seeds.pop() {
        if out.data[idx] != 0 {
            continue;
        }
        out.data[idx] = 255;
        let (x, y) = ((idx % w) as isize, (idx / w) as isize);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let n = ny as usize * w + nx as usize;
                if class[n] != 0 && out.data[n] == 0 {
                    seeds.push(n);
                }
            }
        }
    }
    out
}

/// Binary opening with a `1 x width` line element.
///
/// Keeps horizontal runs at least `width` pixels long and removes thinner,
/// mostly vertical structures.
pub fn open_horizontal(binary: &GrayImageView<'_>, width: usize) -> GrayImage {
    if width <= 1 {
        return binary.to_owned_image();
    }
    let before = width / 2;
    let after = width - 1 - before;
    let eroded = erode_horizontal(binary, before, after);
    dilate_horizontal(&eroded.view(), after, before)
}

fn erode_horizontal(src: &GrayImageView<'_>, before: usize, after: usize) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        let row = src.row(y);
        for x in 0..src.width {
            if x < before || x + after >= src.width {
                continue;
            }
            if row[x - before..=x + after].iter().all(|&v| v != 0) {
                out.set(x, y, 255);
            }
        }
    }
    out
}

fn dilate_horizontal(src: &GrayImageView<'_>, before: usize, after: usize) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        let row = src.row(y);
        for x in 0..src.width {
            let lo = x.saturating_sub(before);
            let hi = (x + after).min(src.width - 1);
            if row[lo..=hi].iter().any(|&v| v != 0) {
                out.set(x, y, 255);
            }
        }
    }
    out
}

/// Full edge pipeline used by the edge-density profile.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(gray, params)))]
pub fn horizontal_edge_map(
    gray: &GrayImageView<'_>,
    window: &RegionBounds,
    params: &EdgeParams,
) -> GrayImage {
    let normalized = normalize_contrast(gray, window);
    let median = median_in_window(&normalized.view(), window);
    let (low, high) = auto_canny_thresholds(median, params.canny_sigma);
    log::debug!("canny thresholds ({low}, {high}) from window median {median}");

    let edges = canny(&normalized.view(), low, high);
    open_horizontal(&edges.view(), params.horizontal_open_width)
}
