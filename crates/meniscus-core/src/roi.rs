//! Region of interest inside which a liquid level is searched.
//!
//! A region is built from user-clicked pixel points:
//! - exactly 2 points are opposite corners of an axis-aligned rectangle;
//! - 3 or more points are the vertices of a polygon, in drawing order.
//!
//! Membership is boundary inclusive. The bounding box spans the input points;
//! the *search window* used by profile extraction is `rows top..bottom`,
//! `cols left..right` (bottom/right exclusive).

use serde::{Deserialize, Serialize};

use crate::image::ImageSize;

/// Pixel coordinate: `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: usize,
    pub y: usize,
}

impl PixelPoint {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<[usize; 2]> for PixelPoint {
    fn from([x, y]: [usize; 2]) -> Self {
        Self { x, y }
    }
}

/// Bounding box of the selected points, in absolute pixel indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl RegionBounds {
    pub fn width(&self) -> usize {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> usize {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clip the search window to an image; `None` if nothing is left.
    pub fn clip_to(&self, size: ImageSize) -> Option<RegionBounds> {
        let clipped = RegionBounds {
            left: self.left.min(size.width),
            right: self.right.min(size.width),
            top: self.top.min(size.height),
            bottom: self.bottom.min(size.height),
        };
        (!clipped.is_empty()).then_some(clipped)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRegionError {
    #[error("a region needs at least 2 points (got {got})")]
    TooFewPoints { got: usize },
    #[error("point ({x}, {y}) lies outside the {width}x{height} image")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("region bounding box is degenerate (width={width}, height={height})")]
    Degenerate { width: usize, height: usize },
    #[error("cannot select a region on an empty image")]
    EmptyImage,
}

#[derive(Clone, Debug)]
struct Selection {
    size: ImageSize,
    points: Vec<PixelPoint>,
    bounds: RegionBounds,
    members: Vec<bool>,
}

/// Binary mask plus bounding box of the selected region.
///
/// An unselected mask has no bounds; every query then reports "outside".
#[derive(Clone, Debug, Default)]
pub struct RegionMask {
    selection: Option<Selection>,
}

impl RegionMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region covering the whole image.
    pub fn full(size: ImageSize) -> Result<Self, InvalidRegionError> {
        let mut mask = Self::new();
        mask.select(
            size,
            &[
                PixelPoint::new(0, 0),
                PixelPoint::new(size.width.saturating_sub(1), size.height.saturating_sub(1)),
            ],
        )?;
        Ok(mask)
    }

    /// Build the mask from a rectangle (2 points) or polygon (3+ points).
    ///
    /// On error the previous selection is kept.
    pub fn select(
        &mut self,
        size: ImageSize,
        points: &[PixelPoint],
    ) -> Result<RegionBounds, InvalidRegionError> {
        if size.is_empty() {
            return Err(InvalidRegionError::EmptyImage);
        }
        if points.len() < 2 {
            return Err(InvalidRegionError::TooFewPoints { got: points.len() });
        }
        if let Some(p) = points.iter().find(|p| !size.contains(p.x, p.y)) {
            return Err(InvalidRegionError::OutOfBounds {
                x: p.x,
                y: p.y,
                width: size.width,
                height: size.height,
            });
        }

        let bounds = bounding_box(points);
        if bounds.is_empty() {
            return Err(InvalidRegionError::Degenerate {
                width: bounds.width(),
                height: bounds.height(),
            });
        }

        let members = if points.len() == 2 {
            fill_rectangle(size, &bounds)
        } else {
            fill_polygon(size, &bounds, points)
        };

        log::debug!(
            "selected region {:?} from {} points ({} member pixels)",
            bounds,
            points.len(),
            members.iter().filter(|&&m| m).count()
        );

        self.selection = Some(Selection {
            size,
            points: points.to_vec(),
            bounds,
            members,
        });
        Ok(bounds)
    }

    /// Forget the selection. Idempotent.
    pub fn reset(&mut self) {
        if self.selection.take().is_some() {
            log::debug!("region of interest reset");
        }
    }

    pub fn is_selected(&self) -> bool {
        self.selection.is_some()
    }

    pub fn bounds(&self) -> Option<RegionBounds> {
        self.selection.as_ref().map(|s| s.bounds)
    }

    pub fn points(&self) -> &[PixelPoint] {
        self.selection
            .as_ref()
            .map(|s| s.points.as_slice())
            .unwrap_or(&[])
    }

    /// Size of the image the region was drawn on.
    pub fn image_size(&self) -> Option<ImageSize> {
        self.selection.as_ref().map(|s| s.size)
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        match &self.selection {
            Some(s) if s.size.contains(x, y) => s.members[y * s.size.width + x],
            _ => false,
        }
    }

    /// Number of member pixels of `row` within columns `cols`.
    pub fn member_count_in_row(&self, row: usize, cols: std::ops::Range<usize>) -> usize {
        cols.filter(|&x| self.contains(x, row)).count()
    }
}

fn bounding_box(points: &[PixelPoint]) -> RegionBounds {
    let mut bounds = RegionBounds {
        left: usize::MAX,
        right: 0,
        top: usize::MAX,
        bottom: 0,
    };
    for p in points {
        bounds.left = bounds.left.min(p.x);
        bounds.right = bounds.right.max(p.x);
        bounds.top = bounds.top.min(p.y);
        bounds.bottom = bounds.bottom.max(p.y);
    }
    bounds
}

fn fill_rectangle(size: ImageSize, bounds: &RegionBounds) -> Vec<bool> {
    let mut members = vec![false; size.area()];
    for y in bounds.top..=bounds.bottom {
        let row = &mut members[y * size.width..(y + 1) * size.width];
        row[bounds.left..=bounds.right].fill(true);
    }
    members
}

fn fill_polygon(size: ImageSize, bounds: &RegionBounds, points: &[PixelPoint]) -> Vec<bool> {
    let verts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let mut members = vec![false; size.area()];
    for y in bounds.top..=bounds.bottom {
        for x in bounds.left..=bounds.right {
            if point_in_polygon(&verts, x as f64, y as f64) {
                members[y * size.width + x] = true;
            }
        }
    }
    members
}

/// Even-odd test; points on an edge count as inside.
fn point_in_polygon(verts: &[(f64, f64)], px: f64, py: f64) -> bool {
    let n = verts.len();
    let mut inside = false;
    for i in 0..n {
        let (ax, ay) = verts[i];
        let (bx, by) = verts[(i + 1) % n];

        if on_segment((ax, ay), (bx, by), (px, py)) {
            return true;
        }
        if (ay > py) != (by > py) {
            let x_cross = ax + (py - ay) * (bx - ax) / (by - ay);
            if px < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > 1e-9 {
        return false;
    }
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[[usize; 2]]) -> Vec<PixelPoint> {
        raw.iter().copied().map(PixelPoint::from).collect()
    }

    #[test]
    fn single_point_is_rejected() {
        let mut mask = RegionMask::new();
        let err = mask
            .select(ImageSize::new(10, 10), &pts(&[[3, 3]]))
            .unwrap_err();
        assert_eq!(err, InvalidRegionError::TooFewPoints { got: 1 });
        assert!(!mask.is_selected());
    }

    #[test]
    fn identical_rectangle_corners_are_degenerate() {
        let mut mask = RegionMask::new();
        let err = mask
            .select(ImageSize::new(10, 10), &pts(&[[4, 4], [4, 4]]))
            .unwrap_err();
        assert!(matches!(err, InvalidRegionError::Degenerate { .. }));
    }

    #[test]
    fn zero_height_rectangle_is_degenerate() {
        let mut mask = RegionMask::new();
        let err = mask
            .select(ImageSize::new(10, 10), &pts(&[[1, 4], [8, 4]]))
            .unwrap_err();
        assert_eq!(
            err,
            InvalidRegionError::Degenerate {
                width: 7,
                height: 0
            }
        );
    }

    #[test]
    fn out_of_bounds_point_is_rejected() {
        let mut mask = RegionMask::new();
        let err = mask
            .select(ImageSize::new(10, 10), &pts(&[[0, 0], [10, 5]]))
            .unwrap_err();
        assert!(matches!(err, InvalidRegionError::OutOfBounds { x: 10, .. }));
    }

    #[test]
    fn failed_select_keeps_previous_region() {
        let size = ImageSize::new(10, 10);
        let mut mask = RegionMask::new();
        mask.select(size, &pts(&[[1, 1], [5, 6]])).expect("valid");
        let before = mask.bounds();
        assert!(mask.select(size, &pts(&[[2, 2]])).is_err());
        assert_eq!(mask.bounds(), before);
    }

    #[test]
    fn rectangle_bounds_and_membership() {
        let mut mask = RegionMask::new();
        let bounds = mask
            .select(ImageSize::new(10, 8), &pts(&[[7, 6], [2, 1]]))
            .expect("valid");
        assert_eq!(
            bounds,
            RegionBounds {
                left: 2,
                right: 7,
                top: 1,
                bottom: 6
            }
        );
        assert!(mask.contains(2, 1));
        assert!(mask.contains(7, 6));
        assert!(!mask.contains(1, 1));
        assert!(!mask.contains(8, 6));
        assert_eq!(mask.member_count_in_row(3, 0..10), 6);
    }

    #[test]
    fn triangle_polygon_fills_interior_only() {
        let mut mask = RegionMask::new();
        mask.select(ImageSize::new(12, 12), &pts(&[[0, 0], [10, 0], [0, 10]]))
            .expect("valid");
        assert!(mask.contains(0, 0));
        assert!(mask.contains(2, 2));
        assert!(mask.contains(5, 5)); // on the hypotenuse
        assert!(!mask.contains(6, 6));
        assert!(!mask.contains(10, 10));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut mask = RegionMask::full(ImageSize::new(4, 4)).expect("valid");
        assert!(mask.is_selected());
        mask.reset();
        mask.reset();
        assert!(!mask.is_selected());
        assert!(mask.bounds().is_none());
        assert!(!mask.contains(0, 0));
        assert!(mask.points().is_empty());
    }

    #[test]
    fn clip_to_smaller_image() {
        let bounds = RegionBounds {
            left: 2,
            right: 20,
            top: 5,
            bottom: 30,
        };
        let clipped = bounds.clip_to(ImageSize::new(10, 10)).expect("overlap");
        assert_eq!(clipped.right, 10);
        assert_eq!(clipped.bottom, 10);
        assert!(bounds.clip_to(ImageSize::new(2, 4)).is_none());
    }
}
