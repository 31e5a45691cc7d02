//! Row <-> relative-height conversion.
//!
//! Relative height is `row / image_height`: `0.0` is the top row, values grow
//! downwards. A smaller relative height is therefore physically *higher* in
//! the container.

/// `row / image_height`; `0.0` for an empty image.
#[inline]
pub fn relative_height(row: usize, image_height: usize) -> f64 {
    if image_height == 0 {
        return 0.0;
    }
    row as f64 / image_height as f64
}

const ROW_EPSILON: f64 = 1e-9;

/// Absolute row for a relative height, truncated like an integer cast.
///
/// Inverts [`relative_height`] exactly for every row of the same image.
#[inline]
pub fn absolute_row(relative: f64, image_height: usize) -> usize {
    (relative * image_height as f64 + ROW_EPSILON).max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_are_consistent() {
        assert_eq!(relative_height(80, 200), 0.4);
        assert_eq!(absolute_row(0.4, 200), 80);
        assert_eq!(relative_height(5, 0), 0.0);
        assert_eq!(absolute_row(-0.1, 100), 0);
    }

    #[test]
    fn absolute_row_inverts_relative_height() {
        for h in [7, 100, 480, 1080] {
            for row in 0..h {
                assert_eq!(absolute_row(relative_height(row, h), h), row);
            }
        }
        // 0.29 * 100 is just below 29 in binary floating point
        assert_eq!(absolute_row(0.29, 100), 29);
    }
}
