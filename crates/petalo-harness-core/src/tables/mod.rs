//! Typed access to a simulator output file.
//!
//! The on-disk storage format belongs to the simulator. Everything the
//! validators need goes through [`TableReader`], and the crate ships a reader
//! for the JSON export of the three Monte Carlo tables.

use crate::domain::{HarnessError, HitRecord, ParticleRecord, SensorRecord};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const PARTICLES_TABLE: &str = "MC/particles";
pub const SENSOR_POSITIONS_TABLE: &str = "MC/sns_positions";
pub const SENSOR_RESPONSE_TABLE: &str = "MC/sns_response";

/// Extension [`JsonTableReader`] reads by default.
pub const DEFAULT_TABLE_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum TableReadError {
    #[error("failed to read output table '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse output table '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("output table '{}' has no '{table}' table", path.display())]
    MissingTable { path: PathBuf, table: &'static str },
}

impl From<TableReadError> for HarnessError {
    fn from(error: TableReadError) -> Self {
        let message = error.to_string();
        match error {
            TableReadError::Read { .. } => HarnessError::io_system("IO.OUTPUT_TABLE", message),
            TableReadError::Parse { .. } | TableReadError::MissingTable { .. } => {
                HarnessError::input_validation("INPUT.OUTPUT_TABLE", message)
            }
        }
    }
}

/// Immutable snapshot of one scenario's output tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTables {
    pub particles: Vec<ParticleRecord>,
    pub sensor_positions: Vec<SensorRecord>,
    pub sensor_response: Vec<HitRecord>,
}

impl OutputTables {
    /// Distinct sensor ids that recorded charge.
    pub fn responding_sensor_ids(&self) -> BTreeSet<i64> {
        self.sensor_response
            .iter()
            .map(|hit| hit.sensor_id)
            .collect()
    }

    pub fn position_sensor_ids(&self) -> BTreeSet<i64> {
        self.sensor_positions
            .iter()
            .map(|sensor| sensor.sensor_id)
            .collect()
    }

    pub fn sensor_names(&self) -> BTreeSet<&str> {
        self.sensor_positions
            .iter()
            .map(|sensor| sensor.sensor_name.as_str())
            .collect()
    }

    pub fn charge_per_event(&self) -> BTreeMap<i64, f64> {
        let mut sums = BTreeMap::new();
        for hit in &self.sensor_response {
            *sums.entry(hit.event_id).or_insert(0.0) += hit.charge;
        }
        sums
    }

    pub fn hit_event_ids(&self) -> BTreeSet<i64> {
        self.sensor_response.iter().map(|hit| hit.event_id).collect()
    }

    pub fn particle_event_ids(&self) -> BTreeSet<i64> {
        self.particles
            .iter()
            .map(|particle| particle.event_id)
            .collect()
    }
}

pub trait TableReader {
    /// Extension of the file the simulator writes next to the output stem.
    fn extension(&self) -> &str;

    fn read_tables(&self, path: &Path) -> Result<OutputTables, TableReadError>;
}

/// Reads `{"MC/particles": [...], "MC/sns_positions": [...], "MC/sns_response": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonTableReader {
    extension: String,
}

impl JsonTableReader {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl Default for JsonTableReader {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_EXTENSION)
    }
}

impl TableReader for JsonTableReader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn read_tables(&self, path: &Path) -> Result<OutputTables, TableReadError> {
        let content = fs::read_to_string(path).map_err(|source| TableReadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| TableReadError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut document: BTreeMap<String, Value> =
            serde_json::from_str(&content).map_err(parse_error)?;

        let mut take = |table: &'static str| {
            document
                .remove(table)
                .ok_or_else(|| TableReadError::MissingTable {
                    path: path.to_path_buf(),
                    table,
                })
        };
        let particles = take(PARTICLES_TABLE)?;
        let sensor_positions = take(SENSOR_POSITIONS_TABLE)?;
        let sensor_response = take(SENSOR_RESPONSE_TABLE)?;

        Ok(OutputTables {
            particles: rows(particles).map_err(parse_error)?,
            sensor_positions: rows(sensor_positions).map_err(parse_error)?,
            sensor_response: rows(sensor_response).map_err(parse_error)?,
        })
    }
}

fn rows<T>(value: Value) -> Result<Vec<T>, serde_json::Error>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(value)
}
