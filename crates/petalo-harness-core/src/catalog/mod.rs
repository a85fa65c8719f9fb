mod builtin;

pub use builtin::builtin_scenarios;

use crate::codec::SensorIdCodec;
use crate::domain::{EncodingMode, HarnessError, Scenario};
use crate::synth::is_reserved_directive;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },
    #[error("unknown scenario '{name}'")]
    UnknownScenario { name: String },
    #[error("failed to read scenario catalog '{}': {source}", path.display())]
    ReadManifest {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse scenario catalog '{}': {source}", path.display())]
    ParseManifest {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<CatalogError> for HarnessError {
    fn from(error: CatalogError) -> Self {
        let message = error.to_string();
        match error {
            CatalogError::InvalidScenario { scenario, .. } => {
                HarnessError::input_validation("INPUT.INVALID_SCENARIO", message)
                    .with_scenario(scenario)
            }
            CatalogError::UnknownScenario { name } => {
                HarnessError::input_validation("INPUT.UNKNOWN_SCENARIO", message)
                    .with_scenario(name)
            }
            CatalogError::ReadManifest { .. } => {
                HarnessError::io_system("IO.CATALOG_MANIFEST", message)
            }
            CatalogError::ParseManifest { .. } => {
                HarnessError::input_validation("INPUT.CATALOG_MANIFEST", message)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogManifest {
    scenarios: Vec<Scenario>,
}

/// Validated, ordered table of scenarios.
///
/// Declaration order is execution order: scenarios may read the output of
/// scenarios declared before them.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
    codecs: Vec<SensorIdCodec>,
    index: BTreeMap<String, usize>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self, CatalogError> {
        let mut codecs = Vec::with_capacity(scenarios.len());
        let mut index = BTreeMap::new();

        for (position, scenario) in scenarios.iter().enumerate() {
            let codec = validate_scenario(scenario, &index)?;
            if index.insert(scenario.name.clone(), position).is_some() {
                return Err(invalid(scenario, "scenario name is declared twice"));
            }
            codecs.push(codec);
        }

        Ok(Self {
            scenarios,
            codecs,
            index,
        })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_scenarios())
    }

    pub fn from_manifest_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogError::ReadManifest {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: CatalogManifest =
            serde_json::from_str(&content).map_err(|source| CatalogError::ParseManifest {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(manifest.scenarios)
    }

    pub fn get(&self, name: &str) -> Result<&Scenario, CatalogError> {
        self.position(name).map(|position| &self.scenarios[position])
    }

    pub fn codec(&self, name: &str) -> Result<SensorIdCodec, CatalogError> {
        self.position(name).map(|position| self.codecs[position])
    }

    pub fn all(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Scenarios named in `names` plus every scenario whose output they read,
    /// in catalog order. An empty selection means the whole catalog.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Scenario>, CatalogError> {
        if names.is_empty() {
            return Ok(self.scenarios.iter().collect());
        }

        let mut selected = BTreeSet::new();
        let mut pending = names
            .iter()
            .map(|name| self.position(name))
            .collect::<Result<Vec<_>, _>>()?;

        while let Some(position) = pending.pop() {
            if !selected.insert(position) {
                continue;
            }
            if let Some(source) = &self.scenarios[position].reads_output_of {
                pending.push(self.position(source)?);
            }
        }

        Ok(selected
            .into_iter()
            .map(|position| &self.scenarios[position])
            .collect())
    }

    fn position(&self, name: &str) -> Result<usize, CatalogError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::UnknownScenario {
                name: name.to_string(),
            })
    }
}

fn validate_scenario(
    scenario: &Scenario,
    earlier: &BTreeMap<String, usize>,
) -> Result<SensorIdCodec, CatalogError> {
    if scenario.name.trim().is_empty() {
        return Err(invalid(scenario, "scenario name is empty"));
    }
    // Names become staged file names and output stems.
    if scenario
        .name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\')
    {
        return Err(invalid(
            scenario,
            "scenario name must not contain whitespace or path separators",
        ));
    }
    if scenario.sensor_count == 0 {
        return Err(invalid(scenario, "sensor_count must be greater than zero"));
    }
    if scenario.event_count == 0 {
        return Err(invalid(scenario, "event_count must be greater than zero"));
    }

    let codec = SensorIdCodec::for_scenario(scenario)
        .map_err(|source| invalid(scenario, source.to_string()))?;

    if scenario.sensor_names.is_dual() && scenario.encoding_mode != EncodingMode::TilePacked {
        return Err(invalid(
            scenario,
            format!(
                "two sensor names require {}, found {}",
                EncodingMode::TilePacked,
                scenario.encoding_mode
            ),
        ));
    }
    if let Some(option) = scenario
        .physics_options
        .iter()
        .find(|option| is_reserved_directive(&option.command))
    {
        return Err(invalid(
            scenario,
            format!(
                "config option '{}' is written by the synthesizer",
                option.command.trim()
            ),
        ));
    }

    let checks = &scenario.checks;
    if (checks.plane_geometry || checks.plane_population) && codec.plane_layout().is_none() {
        return Err(invalid(
            scenario,
            format!(
                "plane checks require a planar encoding, found {}",
                scenario.encoding_mode
            ),
        ));
    }
    if checks.min_id_floor && scenario.init_sns_id.is_none() {
        return Err(invalid(scenario, "minimum-id check requires 'init_sns_id'"));
    }
    if let Some(provenance) = &checks.provenance {
        if provenance.particle_names.is_empty() || provenance.creator_proc.is_empty() {
            return Err(invalid(
                scenario,
                "provenance check needs particle names and a creator process",
            ));
        }
    }
    if checks
        .vertex_volumes
        .as_ref()
        .is_some_and(|volumes| volumes.is_empty())
    {
        return Err(invalid(scenario, "vertex containment needs allowed volumes"));
    }

    if let Some(source) = &scenario.reads_output_of {
        if !earlier.contains_key(source) {
            return Err(invalid(
                scenario,
                format!(
                    "reads output of '{}', which is not declared before it",
                    source
                ),
            ));
        }
    }

    Ok(codec)
}

fn invalid(scenario: &Scenario, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidScenario {
        scenario: scenario.name.clone(),
        reason: reason.into(),
    }
}
