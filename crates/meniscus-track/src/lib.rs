//! Tracking a liquid level over time.
//!
//! Current focus:
//! - reference and tolerance levels with a pinned image size,
//! - robust aggregation of replicate measurements (modified z-score),
//! - the monitoring loop with injected frame source and actions,
//! - a JSON level log with batched writes.
//!
//! Level detection itself lives in `meniscus-level`.

mod aggregate;
mod level_log;
mod monitor;
mod ring;
mod tolerance;
mod tries;

pub use aggregate::{
    aggregate, median, reject_outliers_modified_z, summarize, AggregateError,
    AggregatedMeasurement, MAD_EPSILON,
};
pub use level_log::{
    LevelLogDocument, LevelLogError, LevelLogFile, LevelLogOptions, DEFAULT_TIMESTAMP_FORMAT,
};
pub use monitor::{
    BoxError, CycleAction, CycleReport, FrameSource, MeasuredFrame, Monitor, MonitorActions,
    MonitorConfig, MonitorError,
};
pub use ring::{RingBuffer, RingBufferError};
pub use tolerance::{
    ReferenceLevel, ToleranceBounds, ToleranceTracker, TrackerError, TrackerState,
};
pub use tries::{TryDecision, TryTracker};
