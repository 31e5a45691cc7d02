use chrono::Local;
use meniscus_core::{ImageSize, PixelPoint, RegionBounds, RegionMask, RgbImage};
use meniscus_level::{LevelCandidate, LevelError, LevelFinder, NoLevelFoundError};
use serde::{Deserialize, Serialize};

use crate::aggregate::{summarize, AggregatedMeasurement};
use crate::level_log::LevelLogFile;
use crate::ring::RingBuffer;
use crate::tolerance::{ToleranceBounds, ToleranceTracker, TrackerError};
use crate::tries::{TryDecision, TryTracker};

use super::{FrameSource, MonitorActions, MonitorConfig, MonitorError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A frame together with the levels found in it.
#[derive(Clone, Debug)]
pub struct MeasuredFrame {
    pub frame: RgbImage,
    pub candidates: Vec<LevelCandidate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleAction {
    Advanced,
    SelfCorrected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Per-replicate `reference - level` distances.
    pub replicates: Vec<f64>,
    pub measurement: AggregatedMeasurement,
    pub action: CycleAction,
}

/// Monitoring engine for one container.
#[derive(Debug)]
pub struct Monitor {
    config: MonitorConfig,
    finder: LevelFinder,
    region: RegionMask,
    tracker: ToleranceTracker,
    tries: TryTracker,
    history: RingBuffer<MeasuredFrame>,
    level_log: Option<LevelLogFile>,
    last_failure: Option<Box<NoLevelFoundError>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, finder: LevelFinder) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            tries: TryTracker::new(config.max_tries),
            history: RingBuffer::new(config.history_capacity)?,
            config,
            finder,
            region: RegionMask::new(),
            tracker: ToleranceTracker::new(),
            level_log: None,
            last_failure: None,
        })
    }

    /// Persist aggregated measurements to `log`.
    pub fn with_level_log(mut self, log: LevelLogFile) -> Self {
        self.level_log = Some(log);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn finder(&self) -> &LevelFinder {
        &self.finder
    }

    pub fn region(&self) -> &RegionMask {
        &self.region
    }

    pub fn tracker(&self) -> &ToleranceTracker {
        &self.tracker
    }

    pub fn tries(&self) -> &TryTracker {
        &self.tries
    }

    pub fn history(&self) -> &RingBuffer<MeasuredFrame> {
        &self.history
    }

    pub fn level_log(&self) -> Option<&LevelLogFile> {
        self.level_log.as_ref()
    }

    /// Most recent "no level" failure, kept for inspection after retries.
    pub fn last_failure(&self) -> Option<&NoLevelFoundError> {
        self.last_failure.as_deref()
    }

    /// Select the region of interest. Clears reference and tolerance levels,
    /// which were captured against the previous region.
    pub fn select_region(
        &mut self,
        size: ImageSize,
        points: &[PixelPoint],
    ) -> Result<RegionBounds, MonitorError> {
        let bounds = self.region.select(size, points)?;
        self.tracker.reset();
        self.finder.reset();
        log::info!("region selected: {bounds:?}");
        Ok(bounds)
    }

    pub fn set_reference(&mut self, heights: &[f64], size: ImageSize) -> Result<(), MonitorError> {
        self.tracker.set_reference(heights, size)?;
        if let Some(log) = self.level_log.as_mut() {
            log.set_reference_levels(&self.tracker.reference_heights())?;
        }
        Ok(())
    }

    /// Measure `frame` and store its level as a reference.
    pub fn set_reference_from_frame(&mut self, frame: RgbImage) -> Result<f64, MonitorError> {
        let size = frame.size();
        let best = self.measure(frame)?;
        if best.is_fallback() {
            return Err(MonitorError::FallbackReference);
        }
        self.set_reference(&[best.relative_height], size)?;
        Ok(best.relative_height)
    }

    pub fn set_tolerance(
        &mut self,
        bounds: ToleranceBounds,
        size: ImageSize,
    ) -> Result<(), MonitorError> {
        self.tracker.set_tolerance(bounds, size)?;
        if let Some(log) = self.level_log.as_mut() {
            log.set_tolerance_levels(&bounds.levels())?;
        }
        Ok(())
    }

    /// Back to an unconfigured session. The level log is kept.
    pub fn reset(&mut self) {
        self.region.reset();
        self.tracker.reset();
        self.finder.reset();
        self.tries.reset();
        self.history.clear();
        self.last_failure = None;
    }

    /// Best level in `frame`; the frame is kept in the history.
    ///
    /// Frames must match the size the region and the levels were captured on.
    pub fn measure(&mut self, frame: RgbImage) -> Result<LevelCandidate, MonitorError> {
        self.check_frame_size(frame.size())?;
        let candidates = self.finder.find(&frame.view(), &self.region)?;
        let best = candidates
            .first()
            .copied()
            .unwrap_or_else(LevelCandidate::fallback);
        if best.is_fallback() {
            log::warn!("measurement fell back to the top of the image");
        }
        self.history.push(MeasuredFrame { frame, candidates });
        Ok(best)
    }

    fn check_frame_size(&self, size: ImageSize) -> Result<(), MonitorError> {
        self.tracker.ensure_size(size)?;
        match self.region.image_size() {
            Some(expected) if expected != size => Err(TrackerError::ImageSizeMismatch {
                expected,
                got: size,
            }
            .into()),
            _ => Ok(()),
        }
    }

    /// Distances of `number_of_replicate_measurements` successful measurements.
    ///
    /// "No level" failures are retried until the try tracker gives up.
    pub fn collect_replicates(
        &mut self,
        source: &mut dyn FrameSource,
    ) -> Result<Vec<f64>, MonitorError> {
        let wanted = self.config.number_of_replicate_measurements;
        let mut distances = Vec::with_capacity(wanted);
        while distances.len() < wanted {
            let frame = source.next_frame().map_err(MonitorError::Source)?;
            match self.measure(frame) {
                Ok(best) => {
                    self.tries.reset();
                    distances.push(
                        self.tracker
                            .distance_from(self.config.reference_index, best.relative_height)?,
                    );
                }
                Err(MonitorError::Level(LevelError::NoLevelFound(err))) => {
                    match self.tries.record_failure() {
                        TryDecision::Retry { attempt, max } => {
                            log::warn!("{err}; retrying (try {attempt} of {max})");
                            self.last_failure = Some(err);
                        }
                        TryDecision::GiveUp { attempts } => {
                            log::warn!("{err}; giving up after {attempts} tries");
                            self.tries.reset();
                            self.last_failure = Some(err.clone());
                            return Err(MonitorError::RetriesExhausted {
                                attempts,
                                last: err,
                            });
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Ok(distances)
    }

    /// One replicate/aggregate/act cycle.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn run_cycle(
        &mut self,
        source: &mut dyn FrameSource,
        actions: &mut dyn MonitorActions,
    ) -> Result<CycleReport, MonitorError> {
        let replicates = self.collect_replicates(source)?;
        let measurement = summarize(
            &replicates,
            self.config.z_threshold,
            &self.tracker,
            self.config.reference_index,
            Local::now(),
        )?;
        if let Some(log) = self.level_log.as_mut() {
            log.record_measurement(&measurement)?;
        }

        let action = if measurement.in_tolerance {
            log::info!(
                "level {:.4} in tolerance, advancing",
                measurement.relative_height
            );
            actions.advance().map_err(MonitorError::Action)?;
            CycleAction::Advanced
        } else {
            log::info!(
                "level {:.4} out of tolerance (distance {:.4}), self-correcting",
                measurement.relative_height,
                measurement.average_distance
            );
            actions
                .self_correct(measurement.average_distance)
                .map_err(MonitorError::Action)?;
            CycleAction::SelfCorrected
        };

        Ok(CycleReport {
            replicates,
            measurement,
            action,
        })
    }

    /// `pre_run`, then up to `cycles` cycles. The level log is flushed before
    /// returning, also when a cycle fails.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        actions: &mut dyn MonitorActions,
        cycles: usize,
    ) -> Result<Vec<CycleReport>, MonitorError> {
        let outcome = self.run_cycles(source, actions, cycles);
        let flushed = match self.level_log.as_mut() {
            Some(log) => log.flush(),
            None => Ok(()),
        };
        match (outcome, flushed) {
            (Ok(reports), Ok(())) => Ok(reports),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(flush_err)) => {
                log::error!("level log flush failed: {flush_err}");
                Err(err)
            }
        }
    }

    fn run_cycles(
        &mut self,
        source: &mut dyn FrameSource,
        actions: &mut dyn MonitorActions,
        cycles: usize,
    ) -> Result<Vec<CycleReport>, MonitorError> {
        actions.pre_run().map_err(MonitorError::Action)?;
        let mut reports = Vec::with_capacity(cycles);
        for cycle in 0..cycles {
            log::debug!("cycle {} of {cycles}", cycle + 1);
            reports.push(self.run_cycle(source, actions)?);
        }
        Ok(reports)
    }
}
