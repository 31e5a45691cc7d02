use meniscus_core::relative_height;
use serde::{Deserialize, Serialize};

/// Whether a candidate was measured or synthesised by the fallback policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Measured,
    Fallback,
}

/// One ranked liquid-level candidate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelCandidate {
    /// Absolute image row.
    pub row: usize,
    /// `row / image_height`, `0.0` = top of the image.
    pub relative_height: f64,
    /// Evidence the candidate was ranked by. Higher is stronger.
    pub score: f64,
    pub origin: CandidateOrigin,
}

impl LevelCandidate {
    pub fn measured(row: usize, image_height: usize, score: f64) -> Self {
        Self {
            row,
            relative_height: relative_height(row, image_height),
            score,
            origin: CandidateOrigin::Measured,
        }
    }

    /// Placeholder level at the top of the image.
    pub fn fallback() -> Self {
        Self {
            row: 0,
            relative_height: 0.0,
            score: 0.0,
            origin: CandidateOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == CandidateOrigin::Fallback
    }
}
