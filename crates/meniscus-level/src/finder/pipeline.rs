use meniscus_core::{GrayImage, RegionMask, RgbImageView};

use crate::filter::IirFilter;
use crate::params::{ColorSignalParams, FallbackPolicy, LevelFinderParams, ProfileStrategy};
use crate::profile::{color_profiles, edge_density_profile, ColorProfiles, RowProfile};

use super::derivative::find_by_derivatives;
use super::rank::rank_by_threshold;
use super::select::{Channel, ChannelRows, ChannelSelector, ColoredLiquidRule};
use super::{LevelCandidate, LevelError, NoLevelFoundError, NoLevelReason};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Finds ranked liquid-level candidates inside a region of an image.
///
/// The finder keeps the ranked list of its last successful call and nothing
/// else; every successful `find` replaces it entirely.
#[derive(Debug)]
pub struct LevelFinder {
    params: LevelFinderParams,
    filter: Option<IirFilter>,
    selector: Box<dyn ChannelSelector>,
    last: Vec<LevelCandidate>,
}

impl LevelFinder {
    /// Build a finder; designs the low-pass filter for the colour strategy.
    pub fn new(params: LevelFinderParams) -> Result<Self, LevelError> {
        let (filter, selector) = match &params.strategy {
            ProfileStrategy::ColorSignal(p) => (
                Some(IirFilter::butterworth_lowpass(p.filter_order, p.cutoff)?),
                ColoredLiquidRule::from_params(p),
            ),
            ProfileStrategy::EdgeDensity(_) => (None, ColoredLiquidRule::default()),
        };
        Ok(Self {
            params,
            filter,
            selector: Box::new(selector),
            last: Vec::new(),
        })
    }

    /// Replace the colour-channel selection rule.
    pub fn with_selector(mut self, selector: impl ChannelSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn params(&self) -> &LevelFinderParams {
        &self.params
    }

    /// Ranked candidates, strongest first.
    ///
    /// When nothing qualifies, the outcome follows the configured
    /// [`FallbackPolicy`]: either `NoLevelFound` or a single fallback
    /// candidate at relative height `0.0`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image, region), fields(width = image.width, height = image.height))
    )]
    pub fn find(
        &mut self,
        image: &RgbImageView<'_>,
        region: &RegionMask,
    ) -> Result<Vec<LevelCandidate>, LevelError> {
        if !region.is_selected() {
            return Err(LevelError::RegionNotSelected);
        }

        let (ranked, evidence, reason) = match &self.params.strategy {
            ProfileStrategy::EdgeDensity(p) => {
                let gray = image.to_gray();
                let extracted = edge_density_profile(&gray.view(), region, p);
                let ranked = rank_by_threshold(
                    &extracted.profile,
                    self.params.number_of_liquid_levels_to_find,
                    self.params.find_meniscus_minimum,
                );
                let reason = if extracted.profile.is_empty() {
                    NoLevelReason::EmptyWindow
                } else {
                    NoLevelReason::BelowMinimum {
                        minimum: self.params.find_meniscus_minimum,
                    }
                };
                (ranked, extracted.edges, reason)
            }
            ProfileStrategy::ColorSignal(p) => {
                let profiles = color_profiles(image, region);
                let reason = if profiles.is_empty() {
                    NoLevelReason::EmptyWindow
                } else {
                    NoLevelReason::NoDerivativePeaks
                };
                let ranked = self.rank_color_signal(&profiles, p)?;
                (ranked, image.to_gray(), reason)
            }
        };

        if !ranked.is_empty() {
            log::debug!(
                "found {} level(s), best at row {}",
                ranked.len(),
                ranked[0].row
            );
            self.last = ranked.clone();
            return Ok(ranked);
        }

        match self.params.fallback_policy() {
            FallbackPolicy::TopOfImage => {
                log::warn!("no liquid level found ({reason}); reporting top of image");
                let ranked = vec![LevelCandidate::fallback()];
                self.last = ranked.clone();
                Ok(ranked)
            }
            FallbackPolicy::Fail => {
                log::warn!("no liquid level found ({reason})");
                Err(Box::new(no_level(image, evidence, reason)).into())
            }
        }
    }

    fn rank_color_signal(
        &self,
        profiles: &ColorProfiles,
        params: &ColorSignalParams,
    ) -> Result<Vec<LevelCandidate>, LevelError> {
        let filter = match &self.filter {
            Some(f) => f.clone(),
            None => IirFilter::butterworth_lowpass(params.filter_order, params.cutoff)?,
        };
        let minimum = self.params.find_meniscus_minimum;

        let channel_row = |profile: &RowProfile| -> Result<Option<(usize, f64)>, LevelError> {
            let Some(first) = profile.entries.first() else {
                return Ok(None);
            };
            let level = find_by_derivatives(&profile.values(), &filter, minimum)?;
            Ok(level.map(|l| (first.row + l.offset, l.strength)))
        };

        let hue = channel_row(&profiles.hue)?;
        let saturation = channel_row(&profiles.saturation)?;
        let brightness = channel_row(&profiles.brightness)?;
        let rows = ChannelRows {
            hue: hue.map(|(r, _)| r),
            saturation: saturation.map(|(r, _)| r),
            brightness: brightness.map(|(r, _)| r),
        };
        log::debug!("channel rows {rows:?}");

        let Some(chosen) = self.selector.select(profiles, &rows) else {
            return Ok(Vec::new());
        };
        let found = |c: Channel| match c {
            Channel::Hue => hue,
            Channel::Saturation => saturation,
            Channel::Brightness => brightness,
        };

        let height = profiles.brightness.image_height;
        let mut ranked: Vec<LevelCandidate> = Vec::with_capacity(3);
        let order = [chosen, Channel::Hue, Channel::Saturation, Channel::Brightness];
        for channel in order {
            let Some((row, strength)) = found(channel) else {
                continue;
            };
            if ranked.iter().any(|c| c.row == row) {
                continue;
            }
            ranked.push(LevelCandidate::measured(row, height, strength));
        }
        let cap = self.params.number_of_liquid_levels_to_find;
        if cap > 0 {
            ranked.truncate(cap);
        }
        Ok(ranked)
    }

    /// Relative height of the best candidate of the last successful call.
    pub fn current_level(&self) -> Option<f64> {
        self.last.first().map(|c| c.relative_height)
    }

    pub fn last_levels(&self) -> &[LevelCandidate] {
        &self.last
    }

    pub fn number_of_levels_last_found(&self) -> usize {
        self.last.len()
    }

    /// Forget the last ranked list.
    pub fn reset(&mut self) {
        self.last.clear();
    }
}

fn no_level(image: &RgbImageView<'_>, evidence: GrayImage, reason: NoLevelReason) -> NoLevelFoundError {
    NoLevelFoundError {
        image: image.to_owned_image(),
        evidence,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EdgeDensityParams;
    use meniscus_core::{PixelPoint, RgbImage};

    fn two_tone(w: usize, h: usize, boundary: usize) -> RgbImage {
        let mut img = RgbImage::new_fill(w, h, [40, 40, 40]);
        for y in boundary..h {
            for x in 0..w {
                img.put_pixel(x, y, [210, 210, 210]);
            }
        }
        img
    }

    fn full_region(img: &RgbImage) -> RegionMask {
        RegionMask::full(img.size()).expect("region")
    }

    fn strict(no_error: bool) -> LevelFinderParams {
        LevelFinderParams {
            find_meniscus_minimum: 0.5,
            no_error,
            ..LevelFinderParams::default()
        }
    }

    #[test]
    fn unselected_region_is_an_error() {
        let img = two_tone(20, 20, 10);
        let mut finder = LevelFinder::new(LevelFinderParams::default()).expect("finder");
        let err = finder.find(&img.view(), &RegionMask::new()).unwrap_err();
        assert!(matches!(err, LevelError::RegionNotSelected));
    }

    #[test]
    fn remembers_last_successful_list_only() {
        let img = two_tone(40, 40, 20);
        let mut finder = LevelFinder::new(strict(false)).expect("finder");
        let levels = finder.find(&img.view(), &full_region(&img)).expect("level");
        assert_eq!(levels.len(), 1);
        assert_eq!(finder.number_of_levels_last_found(), 1);
        assert_eq!(finder.current_level(), Some(levels[0].relative_height));

        let flat = RgbImage::new_fill(40, 40, [90, 90, 90]);
        assert!(finder.find(&flat.view(), &full_region(&flat)).is_err());
        assert_eq!(finder.last_levels(), levels.as_slice());

        finder.reset();
        assert_eq!(finder.current_level(), None);
        assert_eq!(finder.number_of_levels_last_found(), 0);
    }

    #[test]
    fn failure_carries_image_and_evidence() {
        let flat = RgbImage::new_fill(16, 12, [90, 90, 90]);
        let mut finder = LevelFinder::new(strict(false)).expect("finder");
        let err = finder.find(&flat.view(), &full_region(&flat)).unwrap_err();
        let no_level = err.no_level_found().expect("no level");
        assert_eq!(no_level.image, flat);
        assert_eq!(no_level.evidence.size(), flat.size());
        assert_eq!(no_level.reason, NoLevelReason::BelowMinimum { minimum: 0.5 });
    }

    #[test]
    fn zero_minimum_reports_the_top_band_of_a_flat_image() {
        let flat = RgbImage::new_fill(16, 12, [90, 90, 90]);
        let mut finder = LevelFinder::new(LevelFinderParams::default()).expect("finder");
        let levels = finder.find(&flat.view(), &full_region(&flat)).expect("level");
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].row, 0);
        assert_eq!(levels[0].score, 0.0);
        assert!(!levels[0].is_fallback());
    }

    #[test]
    fn fallback_is_marked() {
        let flat = RgbImage::new_fill(16, 12, [90, 90, 90]);
        let mut finder = LevelFinder::new(strict(true)).expect("finder");
        let levels = finder.find(&flat.view(), &full_region(&flat)).expect("fallback");
        assert_eq!(levels, vec![LevelCandidate::fallback()]);
        assert!(levels[0].is_fallback());
        assert_eq!(finder.current_level(), Some(0.0));
    }

    #[test]
    fn region_outside_image_reports_empty_window() {
        let img = two_tone(20, 20, 10);
        let mut region = RegionMask::new();
        region
            .select(
                meniscus_core::ImageSize::new(100, 100),
                &[PixelPoint::new(50, 50), PixelPoint::new(80, 80)],
            )
            .expect("region");
        let mut finder = LevelFinder::new(LevelFinderParams::default()).expect("finder");
        let err = finder.find(&img.view(), &region).unwrap_err();
        assert_eq!(
            err.no_level_found().map(|e| e.reason.clone()),
            Some(NoLevelReason::EmptyWindow)
        );
    }

    #[test]
    fn find_all_returns_every_qualifying_band() {
        let mut img = two_tone(40, 60, 20);
        for y in 40..60 {
            for x in 0..40 {
                img.put_pixel(x, y, [40, 40, 40]);
            }
        }
        let params = LevelFinderParams {
            number_of_liquid_levels_to_find: 0,
            strategy: ProfileStrategy::EdgeDensity(EdgeDensityParams {
                rows_to_count: 1,
                ..EdgeDensityParams::default()
            }),
            ..LevelFinderParams::default()
        };
        let mut finder = LevelFinder::new(params).expect("finder");
        let levels = finder.find(&img.view(), &full_region(&img)).expect("levels");
        let mut rows: Vec<usize> = levels.iter().map(|c| c.row).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![19, 39]);
    }

    #[test]
    fn invalid_filter_is_rejected_at_construction() {
        let params = LevelFinderParams {
            strategy: ProfileStrategy::ColorSignal(ColorSignalParams {
                cutoff: 1.5,
                ..ColorSignalParams::default()
            }),
            ..LevelFinderParams::default()
        };
        assert!(matches!(
            LevelFinder::new(params),
            Err(LevelError::Filter(_))
        ));
    }
}
