//! JSON level log: run parameters plus a `timestamp -> relative height` map.
//!
//! Measurements are buffered and merged into the file with a
//! read-modify-write, either explicitly through [`LevelLogFile::flush`] or
//! automatically every `flush_every` records.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use meniscus_level::LevelFinderParams;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatedMeasurement;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

#[derive(thiserror::Error, Debug)]
pub enum LevelLogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid timestamp format {0:?}")]
    InvalidTimestampFormat(String),
}

/// On-disk layout of the level log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelLogDocument {
    pub number_of_liquid_levels_to_find: usize,
    pub rows_to_count: usize,
    pub find_meniscus_minimum: f64,
    #[serde(default)]
    pub reference_level_relative: Vec<f64>,
    #[serde(default)]
    pub tolerance_level_relative: Vec<f64>,
    #[serde(default)]
    pub liquid_level_data: BTreeMap<String, f64>,
}

impl LevelLogDocument {
    /// Empty log carrying the finder parameters of the run.
    pub fn for_params(params: &LevelFinderParams) -> Self {
        Self {
            number_of_liquid_levels_to_find: params.number_of_liquid_levels_to_find,
            rows_to_count: params.rows_to_count(),
            find_meniscus_minimum: params.find_meniscus_minimum,
            ..Self::default()
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LevelLogError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LevelLogError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelLogOptions {
    /// Pending records that trigger an automatic flush.
    pub flush_every: usize,
    /// `chrono` format of the timestamp keys.
    pub timestamp_format: String,
}

impl Default for LevelLogOptions {
    fn default() -> Self {
        Self {
            flush_every: 5,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl LevelLogOptions {
    /// Rejects timestamp formats `chrono` cannot render.
    pub fn validate(&self) -> Result<(), LevelLogError> {
        let fmt = &self.timestamp_format;
        if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
            return Err(LevelLogError::InvalidTimestampFormat(fmt.clone()));
        }
        Ok(())
    }
}

/// Handle on a level log file with a pending batch of records.
#[derive(Debug)]
pub struct LevelLogFile {
    path: PathBuf,
    options: LevelLogOptions,
    pending: BTreeMap<String, f64>,
}

impl LevelLogFile {
    /// Create (or truncate) the log at `path` and write `header`.
    pub fn create(
        path: impl Into<PathBuf>,
        header: &LevelLogDocument,
        options: LevelLogOptions,
    ) -> Result<Self, LevelLogError> {
        options.validate()?;
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        header.write_json(&path)?;
        log::info!("level log created at {}", path.display());
        Ok(Self {
            path,
            options,
            pending: BTreeMap::new(),
        })
    }

    /// Attach to an existing log, keeping its contents.
    pub fn open(path: impl Into<PathBuf>, options: LevelLogOptions) -> Result<Self, LevelLogError> {
        options.validate()?;
        let path = path.into();
        LevelLogDocument::load_json(&path)?;
        Ok(Self {
            path,
            options,
            pending: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn format_timestamp(&self, timestamp: &DateTime<Local>) -> Result<String, LevelLogError> {
        let fmt = &self.options.timestamp_format;
        let mut key = String::new();
        write!(key, "{}", timestamp.format(fmt))
            .map_err(|_| LevelLogError::InvalidTimestampFormat(fmt.clone()))?;
        Ok(key)
    }

    /// Buffer one height; flushes once `flush_every` records are pending.
    pub fn record(
        &mut self,
        timestamp: &DateTime<Local>,
        relative_height: f64,
    ) -> Result<(), LevelLogError> {
        let key = self.format_timestamp(timestamp)?;
        self.pending.insert(key, relative_height);
        if self.pending.len() >= self.options.flush_every.max(1) {
            self.flush()?;
        }
        Ok(())
    }

    pub fn record_measurement(
        &mut self,
        measurement: &AggregatedMeasurement,
    ) -> Result<(), LevelLogError> {
        self.record(&measurement.timestamp, measurement.relative_height)
    }

    /// Merge pending records into the file.
    pub fn flush(&mut self) -> Result<(), LevelLogError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut doc = self.read()?;
        doc.liquid_level_data.extend(
            self.pending
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        doc.write_json(&self.path)?;
        log::debug!("flushed {} level record(s)", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    pub fn set_reference_levels(&mut self, levels: &[f64]) -> Result<(), LevelLogError> {
        let mut doc = self.read()?;
        doc.reference_level_relative = levels.to_vec();
        doc.write_json(&self.path)
    }

    pub fn set_tolerance_levels(&mut self, levels: &[f64]) -> Result<(), LevelLogError> {
        let mut doc = self.read()?;
        doc.tolerance_level_relative = levels.to_vec();
        doc.write_json(&self.path)
    }

    /// Current on-disk document, without pending records.
    pub fn read(&self) -> Result<LevelLogDocument, LevelLogError> {
        LevelLogDocument::load_json(&self.path)
    }
}
