use meniscus_core::{GrayImage, InvalidRegionError, RgbImage};

use crate::filter::FilterError;

/// Why a profile produced no candidate.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NoLevelReason {
    #[error("search window does not overlap the image")]
    EmptyWindow,
    #[error("no band reached the minimum evidence {minimum}")]
    BelowMinimum { minimum: f64 },
    #[error("no channel showed two second-derivative peaks")]
    NoDerivativePeaks,
}

/// No level could be found. Carries the inputs for offline inspection.
#[derive(thiserror::Error, Debug, Clone)]
#[error("no liquid level found: {reason}")]
pub struct NoLevelFoundError {
    /// Owned copy of the analysed image.
    pub image: RgbImage,
    /// Edge map (edge-density) or grayscale (colour signal) the search ran on.
    pub evidence: GrayImage,
    pub reason: NoLevelReason,
}

/// Errors returned by [`crate::LevelFinder`].
#[derive(thiserror::Error, Debug)]
pub enum LevelError {
    #[error(transparent)]
    InvalidRegion(#[from] InvalidRegionError),
    #[error("no region of interest selected")]
    RegionNotSelected,
    #[error(transparent)]
    NoLevelFound(#[from] Box<NoLevelFoundError>),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl LevelError {
    pub fn no_level_found(&self) -> Option<&NoLevelFoundError> {
        match self {
            LevelError::NoLevelFound(err) => Some(err),
            _ => None,
        }
    }
}
