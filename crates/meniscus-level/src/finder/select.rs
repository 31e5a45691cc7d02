use serde::{Deserialize, Serialize};

use crate::params::ColorSignalParams;
use crate::profile::ColorProfiles;

/// Colour channel a derivative row was found on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Hue,
    Saturation,
    Brightness,
}

/// Absolute level row found on each channel, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRows {
    pub hue: Option<usize>,
    pub saturation: Option<usize>,
    pub brightness: Option<usize>,
}

impl ChannelRows {
    pub fn get(&self, channel: Channel) -> Option<usize> {
        match channel {
            Channel::Hue => self.hue,
            Channel::Saturation => self.saturation,
            Channel::Brightness => self.brightness,
        }
    }
}

/// Picks which channel's row is reported as the level.
pub trait ChannelSelector: std::fmt::Debug + Send + Sync {
    fn select(&self, profiles: &ColorProfiles, rows: &ChannelRows) -> Option<Channel>;
}

/// Saturation for a brightly coloured liquid, brightness otherwise.
///
/// The saturation row wins when, below it, mean brightness exceeds
/// `brightness_threshold` and mean saturation is at least
/// `saturation_margin` above the mean saturation above it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColoredLiquidRule {
    pub brightness_threshold: f64,
    pub saturation_margin: f64,
}

impl Default for ColoredLiquidRule {
    fn default() -> Self {
        Self::from_params(&ColorSignalParams::default())
    }
}

impl ColoredLiquidRule {
    pub fn from_params(params: &ColorSignalParams) -> Self {
        Self {
            brightness_threshold: params.brightness_threshold,
            saturation_margin: params.saturation_margin,
        }
    }

    fn is_colored_liquid(&self, profiles: &ColorProfiles, saturation_row: usize) -> bool {
        let split = profiles
            .saturation
            .entries
            .iter()
            .position(|e| e.row >= saturation_row)
            .unwrap_or(profiles.saturation.len());
        let len = profiles.saturation.len();
        let saturation_above = profiles.saturation.mean_over(0..split).unwrap_or(0.0);
        let saturation_below = profiles.saturation.mean_over(split..len).unwrap_or(0.0);
        let brightness_below = profiles.brightness.mean_over(split..len).unwrap_or(0.0);
        log::debug!(
            "saturation above {saturation_above:.1}, below {saturation_below:.1}; brightness below {brightness_below:.1}"
        );
        brightness_below > self.brightness_threshold
            && saturation_below >= saturation_above + self.saturation_margin
    }
}

impl ChannelSelector for ColoredLiquidRule {
    fn select(&self, profiles: &ColorProfiles, rows: &ChannelRows) -> Option<Channel> {
        let preferred = match rows.saturation {
            Some(row) if self.is_colored_liquid(profiles, row) => Channel::Saturation,
            _ => Channel::Brightness,
        };
        let other = match preferred {
            Channel::Saturation => Channel::Brightness,
            _ => Channel::Saturation,
        };
        [preferred, other]
            .into_iter()
            .find(|&c| rows.get(c).is_some())
    }
}
