//! Reference and tolerance levels of a monitored container.
//!
//! All heights are relative (`row / image_height`, `0.0` = top). The image size
//! that the first reference or tolerance was captured on is recorded, and later
//! captures on a differently sized image are rejected so that stored heights
//! never mix scales.

use meniscus_core::{absolute_row, ImageSize};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("no reference level set")]
    NoReference,
    #[error("no tolerance level set")]
    NoTolerance,
    #[error("image is {got} but levels were captured on {expected}")]
    ImageSizeMismatch { expected: ImageSize, got: ImageSize },
    #[error("relative height {0} lies outside [0, 1]")]
    OutOfRange(f64),
    #[error("two-sided tolerance needs two different levels (both {0})")]
    EmptyBand(f64),
}

/// Where the liquid may be for the level to count as in tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToleranceBounds {
    /// Single bound. With `above_is_in_tolerance`, heights above `level`
    /// (smaller relative values) are in tolerance; otherwise heights below.
    OneSided {
        level: f64,
        above_is_in_tolerance: bool,
    },
    /// Open band between two levels given in any order.
    TwoSided { first: f64, second: f64 },
}

impl ToleranceBounds {
    pub fn contains(&self, height: f64) -> bool {
        match *self {
            ToleranceBounds::OneSided {
                level,
                above_is_in_tolerance,
            } => (height < level) == above_is_in_tolerance,
            ToleranceBounds::TwoSided { first, second } => {
                let (lo, hi) = (first.min(second), first.max(second));
                lo < height && height < hi
            }
        }
    }

    /// The bound levels, in the order they were given.
    pub fn levels(&self) -> Vec<f64> {
        match *self {
            ToleranceBounds::OneSided { level, .. } => vec![level],
            ToleranceBounds::TwoSided { first, second } => vec![first, second],
        }
    }

    fn validate(&self) -> Result<(), TrackerError> {
        for level in self.levels() {
            check_range(level)?;
        }
        if let ToleranceBounds::TwoSided { first, second } = *self {
            if first == second {
                return Err(TrackerError::EmptyBand(first));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLevel {
    pub height: f64,
    /// Free-form tag, e.g. the volume the level corresponds to.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    NoReference,
    ReferenceSet,
    ToleranceSet,
}

#[derive(Clone, Debug, Default)]
pub struct ToleranceTracker {
    references: Vec<ReferenceLevel>,
    tolerance: Option<ToleranceBounds>,
    image_size: Option<ImageSize>,
}

fn check_range(height: f64) -> Result<(), TrackerError> {
    if (0.0..=1.0).contains(&height) {
        Ok(())
    } else {
        Err(TrackerError::OutOfRange(height))
    }
}

impl ToleranceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrackerState {
        if self.tolerance.is_some() {
            TrackerState::ToleranceSet
        } else if self.references.is_empty() {
            TrackerState::NoReference
        } else {
            TrackerState::ReferenceSet
        }
    }

    /// Append reference heights captured on an image of `size`.
    pub fn set_reference(&mut self, heights: &[f64], size: ImageSize) -> Result<(), TrackerError> {
        for &h in heights {
            check_range(h)?;
        }
        self.check_size(size)?;
        self.references.extend(heights.iter().map(|&height| ReferenceLevel {
            height,
            label: None,
        }));
        log::info!("reference levels now {:?}", self.reference_heights());
        Ok(())
    }

    /// Append one labelled reference height.
    pub fn set_labelled_reference(
        &mut self,
        height: f64,
        label: impl Into<String>,
        size: ImageSize,
    ) -> Result<(), TrackerError> {
        check_range(height)?;
        self.check_size(size)?;
        self.references.push(ReferenceLevel {
            height,
            label: Some(label.into()),
        });
        Ok(())
    }

    /// Replace the tolerance bounds.
    pub fn set_tolerance(
        &mut self,
        bounds: ToleranceBounds,
        size: ImageSize,
    ) -> Result<(), TrackerError> {
        bounds.validate()?;
        self.check_size(size)?;
        log::info!("tolerance set to {bounds:?}");
        self.tolerance = Some(bounds);
        Ok(())
    }

    pub fn in_tolerance(&self, height: f64) -> Result<bool, TrackerError> {
        self.tolerance
            .as_ref()
            .map(|b| b.contains(height))
            .ok_or(TrackerError::NoTolerance)
    }

    /// `reference - height` for every stored reference, in insertion order.
    ///
    /// Positive means the liquid sits above the reference.
    pub fn distance_from_reference(&self, height: f64) -> Result<Vec<f64>, TrackerError> {
        if self.references.is_empty() {
            return Err(TrackerError::NoReference);
        }
        Ok(self.references.iter().map(|r| r.height - height).collect())
    }

    /// `reference - height` against the reference at `index`.
    pub fn distance_from(&self, index: usize, height: f64) -> Result<f64, TrackerError> {
        Ok(self.reference(index)?.height - height)
    }

    pub fn reference(&self, index: usize) -> Result<&ReferenceLevel, TrackerError> {
        self.references.get(index).ok_or(TrackerError::NoReference)
    }

    pub fn references(&self) -> &[ReferenceLevel] {
        &self.references
    }

    pub fn reference_heights(&self) -> Vec<f64> {
        self.references.iter().map(|r| r.height).collect()
    }

    pub fn tolerance(&self) -> Option<&ToleranceBounds> {
        self.tolerance.as_ref()
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    /// Reference rows on the recorded image.
    pub fn absolute_reference_rows(&self) -> Option<Vec<usize>> {
        let size = self.image_size?;
        Some(
            self.references
                .iter()
                .map(|r| absolute_row(r.height, size.height))
                .collect(),
        )
    }

    /// Tolerance rows on the recorded image.
    pub fn absolute_tolerance_rows(&self) -> Option<Vec<usize>> {
        let size = self.image_size?;
        let bounds = self.tolerance.as_ref()?;
        Some(
            bounds
                .levels()
                .into_iter()
                .map(|h| absolute_row(h, size.height))
                .collect(),
        )
    }

    /// Forget references, tolerance and the recorded image size.
    pub fn reset(&mut self) {
        self.references.clear();
        self.tolerance = None;
        self.image_size = None;
    }

    /// Fails when levels were captured on an image of another size.
    pub fn ensure_size(&self, size: ImageSize) -> Result<(), TrackerError> {
        match self.image_size {
            Some(expected) if expected != size => Err(TrackerError::ImageSizeMismatch {
                expected,
                got: size,
            }),
            _ => Ok(()),
        }
    }

    fn check_size(&mut self, size: ImageSize) -> Result<(), TrackerError> {
        self.ensure_size(size)?;
        self.image_size.get_or_insert(size);
        Ok(())
    }
}
