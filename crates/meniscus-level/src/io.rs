//! JSON configuration and report helpers for single-image level detection.

use crate::{LevelCandidate, LevelError, LevelFinder, LevelFinderParams};
use meniscus_core::{ImageSize, InvalidRegionError, PixelPoint, RegionMask};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum LevelIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Configuration for detecting the level in one image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelDetectConfig {
    pub image_path: String,
    /// Region points as `[x, y]`; empty selects the whole image.
    #[serde(default)]
    pub region: Vec<[usize; 2]>,
    #[serde(default)]
    pub finder: LevelFinderParams,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl LevelDetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LevelIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LevelIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("level_detect_report.json"))
    }

    pub fn region_points(&self) -> Vec<PixelPoint> {
        self.region.iter().copied().map(PixelPoint::from).collect()
    }

    /// Build the region mask for an image of `size`.
    pub fn build_region(&self, size: ImageSize) -> Result<RegionMask, InvalidRegionError> {
        if self.region.is_empty() {
            return RegionMask::full(size);
        }
        let mut mask = RegionMask::new();
        mask.select(size, &self.region_points())?;
        Ok(mask)
    }

    pub fn build_finder(&self) -> Result<LevelFinder, LevelError> {
        LevelFinder::new(self.finder.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDetectReport {
    pub image_path: String,
    pub config_path: String,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub region: Vec<[usize; 2]>,
    #[serde(default)]
    pub candidates: Vec<LevelCandidate>,
    #[serde(default)]
    pub error: Option<String>,
}

impl LevelDetectReport {
    /// Build an empty report for `cfg`.
    pub fn new(cfg: &LevelDetectConfig, config_path: &Path, image_size: ImageSize) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            width: image_size.width,
            height: image_size.height,
            region: cfg.region.clone(),
            candidates: Vec::new(),
            error: None,
        }
    }

    /// Populate the report from a successful detection.
    pub fn set_detection(&mut self, candidates: Vec<LevelCandidate>) {
        self.candidates = candidates;
        self.error = None;
    }

    /// Record a detection error.
    pub fn set_error(&mut self, err: &LevelError) {
        self.candidates.clear();
        self.error = Some(err.to_string());
    }

    /// Best level, if any.
    pub fn best(&self) -> Option<&LevelCandidate> {
        self.candidates.first()
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LevelIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LevelIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateOrigin;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: LevelDetectConfig =
            serde_json::from_str(r#"{ "image_path": "vial.png" }"#).expect("parse");
        assert!(cfg.region.is_empty());
        assert_eq!(cfg.finder.number_of_liquid_levels_to_find, 1);
        assert_eq!(cfg.output_path(), PathBuf::from("level_detect_report.json"));

        let region = cfg.build_region(ImageSize::new(10, 8)).expect("region");
        assert!(region.contains(0, 0));
        assert!(region.contains(9, 7));
    }

    #[test]
    fn bad_region_is_reported() {
        let cfg = LevelDetectConfig {
            image_path: "vial.png".into(),
            region: vec![[3, 3]],
            ..LevelDetectConfig::default()
        };
        assert_eq!(
            cfg.build_region(ImageSize::new(10, 10)).unwrap_err(),
            InvalidRegionError::TooFewPoints { got: 1 }
        );
    }

    #[test]
    fn report_survives_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = LevelDetectConfig {
            image_path: "vial.png".into(),
            region: vec![[1, 1], [8, 8]],
            ..LevelDetectConfig::default()
        };
        let cfg_path = dir.path().join("cfg.json");
        cfg.write_json(&cfg_path).expect("write cfg");
        let loaded = LevelDetectConfig::load_json(&cfg_path).expect("load cfg");
        assert_eq!(loaded.region, cfg.region);

        let mut report = LevelDetectReport::new(&cfg, &cfg_path, ImageSize::new(10, 10));
        report.set_detection(vec![LevelCandidate::measured(4, 10, 0.5)]);
        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).expect("write report");

        let back = LevelDetectReport::load_json(&report_path).expect("load report");
        let best = back.best().expect("level");
        assert_eq!(best.row, 4);
        assert_eq!(best.relative_height, 0.4);
        assert_eq!(best.origin, CandidateOrigin::Measured);
        assert!(back.error.is_none());
    }

    #[test]
    fn error_clears_levels() {
        let cfg = LevelDetectConfig::default();
        let mut report = LevelDetectReport::new(&cfg, Path::new("cfg.json"), ImageSize::new(4, 4));
        report.set_detection(vec![LevelCandidate::fallback()]);
        report.set_error(&LevelError::RegionNotSelected);
        assert!(report.candidates.is_empty());
        assert_eq!(report.error.as_deref(), Some("no region of interest selected"));
    }
}
