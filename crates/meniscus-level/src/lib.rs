//! Liquid-level detection in a region of an image.
//!
//! Current focus:
//! - edge-density row profiles (contrast stretch, auto-Canny, horizontal
//!   opening) ranked by a minimum-evidence threshold,
//! - HSV row-mean profiles ranked by a second/third-derivative finder,
//! - an explicit fallback policy when no level qualifies.
//!
//! Region masks, images and the relative-height convention live in
//! `meniscus-core`.

mod edges;
mod filter;
mod finder;
mod io;
mod params;
mod profile;

pub use edges::{
    auto_canny_thresholds, canny, horizontal_edge_map, median_in_window, normalize_contrast,
    open_horizontal,
};
pub use filter::{diff, FilterError, IirFilter};
pub use finder::{
    find_by_derivatives, find_peaks, rank_by_threshold, CandidateOrigin, Channel, ChannelRows,
    ChannelSelector, ColoredLiquidRule, DerivativeLevel, LevelCandidate, LevelError, LevelFinder,
    NoLevelFoundError, NoLevelReason,
};
pub use io::{LevelDetectConfig, LevelDetectReport, LevelIoError};
pub use params::{
    ColorSignalParams, EdgeDensityParams, EdgeParams, FallbackPolicy, LevelFinderParams,
    ProfileStrategy,
};
pub use profile::{
    color_profiles, edge_density_profile, extract_profile, ColorProfiles, EdgeDensityProfile,
    ExtractedProfile, ProfileEntry, RowProfile,
};

pub use meniscus_core::{PixelPoint, RegionMask};
