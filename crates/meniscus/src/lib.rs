//! High-level facade crate for the `meniscus-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates,
//! - (feature-gated) helpers that run level detection on `image` buffers and
//!   write diagnostic images when no level is found.
//!
//! ## Quickstart
//!
//! ```no_run
//! use meniscus::detect;
//! use meniscus::level::{LevelFinderParams, RegionMask};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = detect::load_rgb("vial.png")?;
//! let region = RegionMask::full(detect::rgb_view(&img).size())?;
//!
//! let levels = detect::detect_level(&img, &region, LevelFinderParams::default())?;
//! println!("level at {:.3}", levels[0].relative_height);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `meniscus::core`: images, region masks, relative-height convention.
//! - `meniscus::level`: row profiles and the level finder.
//! - `meniscus::track`: tolerance tracking, aggregation, monitoring loop.
//! - `meniscus::detect` (feature `image`): helpers on `image::RgbImage`.
//! - `meniscus::draw` (feature `image`): level, reference and tolerance overlays.

pub use meniscus_core as core;
pub use meniscus_level as level;
pub use meniscus_track as track;

pub use meniscus_level::{LevelCandidate, LevelFinder, LevelFinderParams};
pub use meniscus_track::{Monitor, MonitorConfig, ToleranceBounds};

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod draw;

/// Install a `tracing` subscriber and route `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    meniscus_core::init_tracing(json);
    // no-op when the subscriber already installed the bridge
    let _ = tracing_log::LogTracer::init();
}
