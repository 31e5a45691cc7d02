//! Ranking of row profiles into liquid-level candidates.
//!
//! Two algorithms share the same contract: the threshold ranker for the
//! edge-density profile and the derivative finder for colour signals.

mod derivative;
mod error;
mod pipeline;
mod rank;
mod result;
mod select;

pub use derivative::{find_by_derivatives, find_peaks, DerivativeLevel};
pub use error::{LevelError, NoLevelFoundError, NoLevelReason};
pub use pipeline::LevelFinder;
pub use rank::rank_by_threshold;
pub use result::{CandidateOrigin, LevelCandidate};
pub use select::{Channel, ChannelRows, ChannelSelector, ColoredLiquidRule};
