pub mod errors;

pub use errors::{ErrorCategory, HarnessError, HarnessResult};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// How a geometry family packs its sensor identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncodingMode {
    Flat,
    BoardPacked,
    DualPlane,
    TilePacked,
}

impl EncodingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::BoardPacked => "BOARD_PACKED",
            Self::DualPlane => "DUAL_PLANE",
            Self::TilePacked => "TILE_PACKED",
        }
    }

    pub const fn required_params(self) -> &'static [EncodingParam] {
        match self {
            Self::Flat => &[],
            Self::BoardPacked => &[
                EncodingParam::BoardOrderingDivisor,
                EncodingParam::NBoards,
                EncodingParam::SipmsPerBoard,
            ],
            Self::DualPlane | Self::TilePacked => &[
                EncodingParam::SipmsPerTile,
                EncodingParam::FirstIdSecondPlane,
            ],
        }
    }

    /// Modes whose ids are split into two sensor planes.
    pub const fn is_planar(self) -> bool {
        matches!(self, Self::DualPlane | Self::TilePacked)
    }
}

impl Display for EncodingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingParam {
    BoardOrderingDivisor,
    NBoards,
    SipmsPerBoard,
    SipmsPerTile,
    FirstIdSecondPlane,
}

impl EncodingParam {
    pub const fn key(self) -> &'static str {
        match self {
            Self::BoardOrderingDivisor => "board_ordering_divisor",
            Self::NBoards => "n_boards",
            Self::SipmsPerBoard => "sipms_per_board",
            Self::SipmsPerTile => "sipms_per_tile",
            Self::FirstIdSecondPlane => "first_id_second_plane",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct EncodingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_ordering_divisor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_boards: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sipms_per_board: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sipms_per_tile: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id_second_plane: Option<i64>,
}

impl EncodingParams {
    pub const fn get(&self, param: EncodingParam) -> Option<i64> {
        match param {
            EncodingParam::BoardOrderingDivisor => self.board_ordering_divisor,
            EncodingParam::NBoards => self.n_boards,
            EncodingParam::SipmsPerBoard => self.sipms_per_board,
            EncodingParam::SipmsPerTile => self.sipms_per_tile,
            EncodingParam::FirstIdSecondPlane => self.first_id_second_plane,
        }
    }

    pub fn first_missing(&self, mode: EncodingMode) -> Option<EncodingParam> {
        mode.required_params()
            .iter()
            .copied()
            .find(|param| self.get(*param).is_none())
    }
}

/// The sensor-name population a geometry is built from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum SensorPopulation {
    Single(String),
    Dual(String, String),
}

impl SensorPopulation {
    pub fn single(name: impl Into<String>) -> Self {
        Self::Single(name.into())
    }

    pub fn dual(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::Dual(first.into(), second.into())
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Dual(first, second) => vec![first.as_str(), second.as_str()],
        }
    }

    pub const fn is_dual(&self) -> bool {
        matches!(self, Self::Dual(_, _))
    }
}

impl TryFrom<Vec<String>> for SensorPopulation {
    type Error = String;

    fn try_from(mut names: Vec<String>) -> Result<Self, Self::Error> {
        match names.len() {
            1 => Ok(Self::Single(names.remove(0))),
            2 => {
                let second = names.remove(1);
                let first = names.remove(0);
                if first == second {
                    return Err(format!("sensor name '{}' is listed twice", first));
                }
                Ok(Self::Dual(first, second))
            }
            count => Err(format!(
                "expected one or two sensor names, found {}",
                count
            )),
        }
    }
}

impl From<SensorPopulation> for Vec<String> {
    fn from(population: SensorPopulation) -> Self {
        match population {
            SensorPopulation::Single(name) => vec![name],
            SensorPopulation::Dual(first, second) => vec![first, second],
        }
    }
}

/// One `<command> <value>` line of a control script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptDirective {
    pub command: String,
    pub value: String,
}

impl ScriptDirective {
    pub fn new(command: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            value: value.into(),
        }
    }

    pub fn line(&self) -> String {
        format!("{} {}", self.command, self.value)
    }
}

/// Simulator modules registered by the init script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitModules {
    pub physics_lists: Vec<String>,
    pub generator: String,
    pub run_action: String,
    pub event_action: String,
    pub tracking_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacking_action: Option<String>,
    pub persistency_manager: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceExpectation {
    pub particle_names: Vec<String>,
    pub creator_proc: String,
}

/// Which output checks apply to a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioChecks {
    pub sensor_ids: bool,
    pub min_id_floor: bool,
    pub sensor_names: bool,
    pub plane_geometry: bool,
    pub plane_population: bool,
    pub event_charge: bool,
    pub event_coverage: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ProvenanceExpectation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex_volumes: Option<Vec<String>>,
}

impl Default for ScenarioChecks {
    fn default() -> Self {
        Self {
            sensor_ids: true,
            min_id_floor: false,
            sensor_names: false,
            plane_geometry: false,
            plane_population: false,
            event_charge: false,
            event_coverage: false,
            provenance: None,
            vertex_volumes: None,
        }
    }
}

impl ScenarioChecks {
    pub fn none() -> Self {
        Self {
            sensor_ids: false,
            ..Self::default()
        }
    }

    /// Sensor numbering, plane layout, charge floor and event coverage.
    pub fn tile_response() -> Self {
        Self {
            sensor_ids: true,
            min_id_floor: true,
            sensor_names: true,
            plane_geometry: true,
            plane_population: false,
            event_charge: true,
            event_coverage: true,
            provenance: None,
            vertex_volumes: None,
        }
    }
}

/// A named detector-geometry configuration the harness simulates and checks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    pub geometry: String,
    pub sensor_count: u32,
    pub encoding_mode: EncodingMode,
    #[serde(default)]
    pub encoding_params: EncodingParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_sns_id: Option<i64>,
    pub sensor_names: SensorPopulation,
    #[serde(default)]
    pub min_event_charge: f64,
    pub event_count: u64,
    pub init: InitModules,
    #[serde(default)]
    pub physics_options: Vec<ScriptDirective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
    #[serde(default)]
    pub checks: ScenarioChecks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reads_output_of: Option<String>,
}

impl Scenario {
    /// Name of the scenario whose output table this scenario's checks read.
    pub fn output_source(&self) -> &str {
        self.reads_output_of.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptKind {
    Init,
    Config,
}

impl ScriptKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Config => "config",
        }
    }

    pub fn file_name(self, stem: &str) -> String {
        format!("{}.{}.mac", stem, self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub directive: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedScript {
    pub kind: ScriptKind,
    pub scenario_name: String,
    pub source_template_path: Option<PathBuf>,
    pub rendered_path: PathBuf,
    pub substitutions: Vec<Substitution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptPair {
    pub init: GeneratedScript,
    pub config: GeneratedScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationRun {
    pub scenario_name: String,
    pub init_script_path: PathBuf,
    pub event_count: u64,
    pub exit_status: Option<i32>,
    pub status: RunStatus,
    pub output_table_path: PathBuf,
}

impl SimulationRun {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorRecord {
    pub sensor_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub sensor_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HitRecord {
    pub event_id: i64,
    pub sensor_id: i64,
    pub charge: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParticleRecord {
    pub event_id: i64,
    pub particle_name: String,
    pub creator_proc: String,
    #[serde(deserialize_with = "flag_from_bool_or_int")]
    pub primary: bool,
    pub initial_volume: String,
}

// Persisted tables store the primary flag either as a boolean or as 0/1.
fn flag_from_bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
    }
}
