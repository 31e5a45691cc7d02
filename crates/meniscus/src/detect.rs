//! Level detection on `image` crate buffers.

use std::path::{Path, PathBuf};

use crate::{core, draw, level, track};
use image::ImageReader;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("image buffer of {len} bytes does not match {width}x{height}")]
    InvalidBuffer {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Region(#[from] core::InvalidRegionError),

    #[error(transparent)]
    Level(#[from] level::LevelError),

    #[error(transparent)]
    LevelIo(#[from] level::LevelIoError),
}

/// Convert an `image::RgbImage` into the lightweight `meniscus-core` view.
pub fn rgb_view(img: &::image::RgbImage) -> core::RgbImageView<'_> {
    core::RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert an `image::GrayImage` into the lightweight `meniscus-core` view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn to_image_rgb(img: &core::RgbImage) -> Result<::image::RgbImage, DetectError> {
    ::image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone()).ok_or(
        DetectError::InvalidBuffer {
            width: img.width,
            height: img.height,
            len: img.data.len(),
        },
    )
}

pub fn to_image_gray(img: &core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone()).ok_or(
        DetectError::InvalidBuffer {
            width: img.width,
            height: img.height,
            len: img.data.len(),
        },
    )
}

/// Decode an image file as 8-bit RGB.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(path)))]
pub fn load_rgb(path: impl AsRef<Path>) -> Result<::image::RgbImage, DetectError> {
    Ok(ImageReader::open(path)?.decode()?.to_rgb8())
}

/// Run a fresh [`level::LevelFinder`] on `img`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, region, params), fields(width = img.width(), height = img.height()))
)]
pub fn detect_level(
    img: &::image::RgbImage,
    region: &core::RegionMask,
    params: level::LevelFinderParams,
) -> Result<Vec<level::LevelCandidate>, DetectError> {
    let mut finder = level::LevelFinder::new(params)?;
    Ok(finder.find(&rgb_view(img), region)?)
}

/// Write the analysed image and its evidence map as
/// `<stem>_no_level_found.png` and `<stem>_no_level_found_evidence.png`.
pub fn save_failure_images(
    err: &level::NoLevelFoundError,
    dir: impl AsRef<Path>,
    stem: &str,
) -> Result<(PathBuf, PathBuf), DetectError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let image_path = dir.join(format!("{stem}_no_level_found.png"));
    let evidence_path = dir.join(format!("{stem}_no_level_found_evidence.png"));
    to_image_rgb(&err.image)?.save(&image_path)?;
    to_image_gray(&err.evidence)?.save(&evidence_path)?;
    log::info!("failure images written to {}", dir.display());
    Ok((image_path, evidence_path))
}

/// Write the failed image with the tracker's reference and tolerance rows as
/// `<stem>_no_level_found_overlay.png`.
pub fn save_failure_overlay(
    err: &level::NoLevelFoundError,
    tracker: &track::ToleranceTracker,
    dir: impl AsRef<Path>,
    stem: &str,
) -> Result<PathBuf, DetectError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}_no_level_found_overlay.png"));
    Ok(draw::save_overlay(&path, &to_image_rgb(&err.image)?, &[], Some(tracker))?)
}

/// Load the image named by `cfg`, detect, and build a report.
///
/// Detection failures are recorded in the report; only configuration and I/O
/// problems are returned as errors. When `failure_dir` is set, a "no level"
/// failure also writes its diagnostic images there.
pub fn run_detect_config(
    cfg: &level::LevelDetectConfig,
    config_path: &Path,
    failure_dir: Option<&Path>,
) -> Result<level::LevelDetectReport, DetectError> {
    let img = load_rgb(&cfg.image_path)?;
    let view = rgb_view(&img);
    let region = cfg.build_region(view.size())?;
    let mut finder = cfg.build_finder()?;

    let mut report = level::LevelDetectReport::new(cfg, config_path, view.size());
    match finder.find(&view, &region) {
        Ok(candidates) => report.set_detection(candidates),
        Err(err) => {
            log::warn!("detection failed: {err}");
            if let (Some(dir), Some(no_level)) = (failure_dir, err.no_level_found()) {
                let stem = Path::new(&cfg.image_path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "frame".to_string());
                save_failure_images(no_level, dir, &stem)?;
            }
            report.set_error(&err);
        }
    }
    Ok(report)
}
