//! Colour conversions on 8-bit RGB samples.

/// HSV sample on the 8-bit scale: `h` in [0, 180), `s` and `v` in [0, 255].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

/// BT.601 luma, rounded to nearest.
#[inline]
pub fn luma_from_rgb(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

/// RGB to HSV with hue halved so it fits the 8-bit range.
pub fn hsv_from_rgb(rgb: [u8; 3]) -> Hsv {
    let [r, g, b] = rgb.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    Hsv {
        h: h * 0.5,
        s,
        v: max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gray_pixels_have_no_saturation() {
        let hsv = hsv_from_rgb([200, 200, 200]);
        assert_eq!(hsv.s, 0.0);
        assert_eq!(hsv.h, 0.0);
        assert_eq!(hsv.v, 200.0);
    }

    #[test]
    fn primaries_map_to_half_degree_hues() {
        assert_abs_diff_eq!(hsv_from_rgb([255, 0, 0]).h, 0.0);
        assert_abs_diff_eq!(hsv_from_rgb([0, 255, 0]).h, 60.0);
        assert_abs_diff_eq!(hsv_from_rgb([0, 0, 255]).h, 120.0);
        assert_abs_diff_eq!(hsv_from_rgb([255, 0, 255]).h, 150.0);
    }

    #[test]
    fn saturation_scales_with_chroma() {
        let hsv = hsv_from_rgb([200, 40, 40]);
        assert_abs_diff_eq!(hsv.s, 204.0, epsilon = 1e-3);
        assert_abs_diff_eq!(hsv.v, 200.0);
    }

    #[test]
    fn luma_of_gray_is_identity() {
        for v in [0u8, 1, 77, 128, 254, 255] {
            assert_eq!(luma_from_rgb([v, v, v]), v);
        }
    }
}
