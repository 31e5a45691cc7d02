//! Core types shared by the liquid-level crates.
//!
//! This crate is intentionally small. It knows about pixel buffers, the
//! region of interest a level is searched in, and the relative-height
//! convention (`0.0` = top row, `1.0` = bottom of the image). It does *not*
//! know how a level is found or what is done with it.

mod color;
mod height;
mod image;
mod logger;
mod roi;

pub use color::{hsv_from_rgb, luma_from_rgb, Hsv};
pub use height::{absolute_row, relative_height};
pub use image::{GrayImage, GrayImageView, ImageSize, RgbImage, RgbImageView};
pub use roi::{InvalidRegionError, PixelPoint, RegionBounds, RegionMask};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, DEFAULT_FILTER};
