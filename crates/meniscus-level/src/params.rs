use serde::{Deserialize, Serialize};

/// Edge-map settings for the edge-density extractor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeParams {
    /// Canny thresholds are `(1 -/+ sigma) * median` of the normalised ROI.
    pub canny_sigma: f32,
    /// Width of the horizontal line element used to open the edge map.
    /// Vertical structures narrower than this are removed. `<= 1` disables it.
    pub horizontal_open_width: usize,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            canny_sigma: 0.33,
            horizontal_open_width: 5,
        }
    }
}

/// Parameters of the binary edge-density profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDensityParams {
    /// Number of rows summed into one band of the profile.
    pub rows_to_count: usize,
    pub edges: EdgeParams,
}

impl Default for EdgeDensityParams {
    fn default() -> Self {
        Self {
            rows_to_count: 2,
            edges: EdgeParams::default(),
        }
    }
}

/// Parameters of the continuous HSV-signal profile and derivative finder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSignalParams {
    /// Butterworth low-pass order.
    pub filter_order: usize,
    /// Normalised cutoff in (0, 1), 1 = Nyquist.
    pub cutoff: f64,
    /// Mean brightness the region below a saturation edge must exceed to be
    /// treated as a coloured liquid.
    pub brightness_threshold: f64,
    /// Margin by which saturation below the edge must exceed saturation above.
    pub saturation_margin: f64,
}

impl Default for ColorSignalParams {
    fn default() -> Self {
        Self {
            filter_order: 9,
            cutoff: 0.09,
            brightness_threshold: 50.0,
            saturation_margin: 50.0,
        }
    }
}

/// Which profile is extracted and how it is ranked.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileStrategy {
    /// Edge-density profile ranked by threshold.
    EdgeDensity(EdgeDensityParams),
    /// HSV row means ranked by the derivative-peak finder.
    ColorSignal(ColorSignalParams),
}

impl Default for ProfileStrategy {
    fn default() -> Self {
        Self::EdgeDensity(EdgeDensityParams::default())
    }
}

/// What to do when no row qualifies as a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Return `NoLevelFoundError`.
    Fail,
    /// Report a single `Fallback` candidate at relative height `0.0`.
    TopOfImage,
}

/// Configuration for [`crate::LevelFinder`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelFinderParams {
    /// Maximum number of ranked candidates; `0` finds all of them.
    pub number_of_liquid_levels_to_find: usize,
    /// Minimum evidence for a row to become a candidate. For the edge-density
    /// profile this is the edge-pixel fraction of a band, in [0, 1].
    pub find_meniscus_minimum: f64,
    /// `true` selects [`FallbackPolicy::TopOfImage`] instead of failing.
    pub no_error: bool,
    pub strategy: ProfileStrategy,
}

impl Default for LevelFinderParams {
    fn default() -> Self {
        Self {
            number_of_liquid_levels_to_find: 1,
            find_meniscus_minimum: 0.0,
            no_error: false,
            strategy: ProfileStrategy::default(),
        }
    }
}

impl LevelFinderParams {
    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.no_error {
            FallbackPolicy::TopOfImage
        } else {
            FallbackPolicy::Fail
        }
    }

    /// Band height of the profile (1 for the per-row colour signal).
    pub fn rows_to_count(&self) -> usize {
        match &self.strategy {
            ProfileStrategy::EdgeDensity(p) => p.rows_to_count,
            ProfileStrategy::ColorSignal(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_is_tagged_in_json() {
        let json = r#"{
            "number_of_liquid_levels_to_find": 0,
            "strategy": { "kind": "color_signal", "cutoff": 0.2 }
        }"#;
        let params: LevelFinderParams = serde_json::from_str(json).expect("parse");
        assert_eq!(params.number_of_liquid_levels_to_find, 0);
        assert_eq!(params.rows_to_count(), 1);
        match params.strategy {
            ProfileStrategy::ColorSignal(p) => {
                assert_eq!(p.cutoff, 0.2);
                assert_eq!(p.filter_order, 9);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn no_error_flag_selects_fallback() {
        let mut params = LevelFinderParams::default();
        assert_eq!(params.fallback_policy(), FallbackPolicy::Fail);
        params.no_error = true;
        assert_eq!(params.fallback_policy(), FallbackPolicy::TopOfImage);
        assert_eq!(params.rows_to_count(), 2);
    }
}
