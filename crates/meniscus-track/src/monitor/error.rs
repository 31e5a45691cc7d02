use meniscus_core::InvalidRegionError;
use meniscus_level::{LevelError, NoLevelFoundError};

use crate::aggregate::AggregateError;
use crate::level_log::LevelLogError;
use crate::ring::RingBufferError;
use crate::tolerance::TrackerError;

/// Error type of injected collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("invalid monitor config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Region(#[from] InvalidRegionError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Log(#[from] LevelLogError),
    #[error(transparent)]
    History(#[from] RingBufferError),
    #[error("frame source failed: {0}")]
    Source(BoxError),
    #[error("monitor action failed: {0}")]
    Action(BoxError),
    #[error("no liquid level found in {attempts} consecutive attempts")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: Box<NoLevelFoundError>,
    },
    #[error("reference frame only produced a fallback level")]
    FallbackReference,
}
