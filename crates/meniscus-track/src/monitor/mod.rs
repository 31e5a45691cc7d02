//! Replicate, aggregate and act: the monitoring loop.
//!
//! The engine owns the session state (region, reference/tolerance tracker,
//! retry counter, frame history, level log) and talks to the outside world
//! only through a [`FrameSource`] and [`MonitorActions`].

mod config;
mod engine;
mod error;

pub use config::MonitorConfig;
pub use engine::{CycleAction, CycleReport, MeasuredFrame, Monitor};
pub use error::{BoxError, MonitorError};

use meniscus_core::RgbImage;

/// Produces frames, typically from a camera.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, BoxError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<RgbImage, BoxError>,
{
    fn next_frame(&mut self) -> Result<RgbImage, BoxError> {
        self()
    }
}

/// Side effects of a monitoring run, e.g. driving pumps.
pub trait MonitorActions {
    /// Called once before the first cycle.
    fn pre_run(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Level in tolerance: continue the experiment.
    fn advance(&mut self) -> Result<(), BoxError>;

    /// Level out of tolerance by `average_distance` (`reference - level`;
    /// positive when the liquid is above the reference).
    fn self_correct(&mut self, average_distance: f64) -> Result<(), BoxError>;
}
