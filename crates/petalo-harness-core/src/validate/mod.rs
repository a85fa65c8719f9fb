//! Structural and physical checks over one scenario's output tables.

use crate::codec::{Plane, PlaneLayout, SensorIdCodec};
use crate::domain::{Scenario, SensorPopulation, SimulationRun};
use crate::tables::{OutputTables, TableReader};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    OutputTable,
    SensorIdCardinality,
    PositionUniqueness,
    SensorIdDecoding,
    MinimumIdFloor,
    SensorNameCardinality,
    PlaneGeometry,
    PlanePopulation,
    EventChargeFloor,
    EventCoverage,
    Provenance,
    VertexContainment,
}

impl CheckKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutputTable => "output_table",
            Self::SensorIdCardinality => "sensor_id_cardinality",
            Self::PositionUniqueness => "position_uniqueness",
            Self::SensorIdDecoding => "sensor_id_decoding",
            Self::MinimumIdFloor => "minimum_id_floor",
            Self::SensorNameCardinality => "sensor_name_cardinality",
            Self::PlaneGeometry => "plane_geometry",
            Self::PlanePopulation => "plane_population",
            Self::EventChargeFloor => "event_charge_floor",
            Self::EventCoverage => "event_coverage",
            Self::Provenance => "provenance",
            Self::VertexContainment => "vertex_containment",
        }
    }
}

impl Display for CheckKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn pass(check: CheckKind, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(check: CheckKind, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: false,
            detail: detail.into(),
        }
    }

    fn from_result(check: CheckKind, result: Result<String, String>) -> Self {
        match result {
            Ok(detail) => Self::pass(check, detail),
            Err(detail) => Self::fail(check, detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub scenario: String,
    pub passed: bool,
    pub checks: Vec<CheckOutcome>,
}

impl ValidationReport {
    fn new(scenario: &str, checks: Vec<CheckOutcome>) -> Self {
        let report = Self {
            scenario: scenario.to_string(),
            passed: checks.iter().all(|check| check.passed),
            checks,
        };
        for failed in report.failed_checks() {
            tracing::warn!(
                scenario = %report.scenario,
                check = %failed.check,
                detail = %failed.detail,
                "validation check failed"
            );
        }
        tracing::info!(
            scenario = %report.scenario,
            passed = report.passed,
            checks = report.checks.len(),
            "validation finished"
        );
        report
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|check| !check.passed)
    }

    pub fn check(&self, kind: CheckKind) -> Option<&CheckOutcome> {
        self.checks.iter().find(|check| check.check == kind)
    }
}

/// Reads a run's output tables and applies the checks the scenario selects.
///
/// A failed check never aborts its siblings. Only an unreadable output file
/// short-circuits, as a single failed [`CheckKind::OutputTable`] check.
#[derive(Debug, Clone)]
pub struct OutputValidator<R> {
    reader: R,
}

impl<R: TableReader> OutputValidator<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// `run` is the run whose output the scenario reads, which is not always
    /// the scenario's own run.
    pub fn validate(
        &self,
        scenario: &Scenario,
        codec: &SensorIdCodec,
        run: &SimulationRun,
    ) -> ValidationReport {
        match self.reader.read_tables(&run.output_table_path) {
            Ok(tables) => validate_tables(scenario, codec, &tables),
            Err(error) => ValidationReport::new(
                &scenario.name,
                vec![CheckOutcome::fail(CheckKind::OutputTable, error.to_string())],
            ),
        }
    }
}

pub fn validate_tables(
    scenario: &Scenario,
    codec: &SensorIdCodec,
    tables: &OutputTables,
) -> ValidationReport {
    let checks = &scenario.checks;
    let mut outcomes = Vec::new();
    let responding = tables.responding_sensor_ids();

    if checks.sensor_ids {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::SensorIdCardinality,
            id_cardinality(&responding, scenario.sensor_count),
        ));
        outcomes.push(CheckOutcome::from_result(
            CheckKind::PositionUniqueness,
            position_uniqueness(tables),
        ));
        outcomes.push(CheckOutcome::from_result(
            CheckKind::SensorIdDecoding,
            decoding(codec, &responding),
        ));
    }
    if checks.min_id_floor {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::MinimumIdFloor,
            minimum_id_floor(&responding, scenario.init_sns_id),
        ));
    }
    if checks.sensor_names {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::SensorNameCardinality,
            sensor_names(tables, &scenario.sensor_names),
        ));
    }
    if let Some(layout) = codec.plane_layout() {
        if checks.plane_geometry {
            outcomes.push(CheckOutcome::from_result(
                CheckKind::PlaneGeometry,
                plane_geometry(tables, layout),
            ));
        }
        if checks.plane_population {
            outcomes.push(CheckOutcome::from_result(
                CheckKind::PlanePopulation,
                plane_population(&responding, layout, scenario.sensor_count),
            ));
        }
    }
    if checks.event_charge {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::EventChargeFloor,
            event_charge_floor(tables, scenario.min_event_charge),
        ));
    }
    if checks.event_coverage {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::EventCoverage,
            event_coverage(tables),
        ));
    }
    if let Some(expected) = &checks.provenance {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::Provenance,
            provenance(tables, &expected.particle_names, &expected.creator_proc),
        ));
    }
    if let Some(volumes) = &checks.vertex_volumes {
        outcomes.push(CheckOutcome::from_result(
            CheckKind::VertexContainment,
            vertex_containment(tables, volumes),
        ));
    }

    ValidationReport::new(&scenario.name, outcomes)
}

fn id_cardinality(ids: &BTreeSet<i64>, sensor_count: u32) -> Result<String, String> {
    let distinct = ids.len();
    if distinct > 1 && distinct <= sensor_count as usize {
        Ok(format!("{} distinct responding sensors", distinct))
    } else {
        Err(format!(
            "{} distinct responding sensors, expected more than 1 and at most {}",
            distinct, sensor_count
        ))
    }
}

fn position_uniqueness(tables: &OutputTables) -> Result<String, String> {
    let rows = tables.sensor_positions.len();
    let distinct = tables.position_sensor_ids().len();
    if rows == distinct {
        Ok(format!("{} sensor positions, none repeated", rows))
    } else {
        Err(format!(
            "{} sensor position rows for {} distinct sensor ids",
            rows, distinct
        ))
    }
}

fn decoding(codec: &SensorIdCodec, ids: &BTreeSet<i64>) -> Result<String, String> {
    let malformed = ids
        .iter()
        .filter_map(|&id| codec.decode(id).err())
        .collect::<Vec<_>>();
    match malformed.first() {
        None => Ok(format!("{} ids decode as {}", ids.len(), codec.mode())),
        Some(first) => Err(format!("{} malformed ids, first: {}", malformed.len(), first)),
    }
}

fn minimum_id_floor(ids: &BTreeSet<i64>, init_sns_id: Option<i64>) -> Result<String, String> {
    let Some(floor) = init_sns_id else {
        return Err("scenario declares no first sensor id".to_string());
    };
    match ids.first() {
        Some(&min) if min >= floor => Ok(format!("lowest id {} >= {}", min, floor)),
        Some(&min) => Err(format!("lowest id {} is below {}", min, floor)),
        None => Err("no responding sensors".to_string()),
    }
}

fn sensor_names(tables: &OutputTables, declared: &SensorPopulation) -> Result<String, String> {
    let observed = tables.sensor_names();
    let matches = match declared {
        SensorPopulation::Dual(_, _) => observed.len() == 2,
        SensorPopulation::Single(name) => {
            observed.len() == 1 && observed.contains(name.as_str())
        }
    };
    let observed = observed.into_iter().collect::<Vec<_>>().join(", ");
    if matches {
        Ok(format!("sensor names [{}]", observed))
    } else {
        Err(format!(
            "sensor names [{}], expected [{}]",
            observed,
            declared.names().join(", ")
        ))
    }
}

fn plane_geometry(tables: &OutputTables, layout: &PlaneLayout) -> Result<String, String> {
    let mut planes: BTreeMap<Plane, Vec<f64>> = BTreeMap::new();
    for sensor in &tables.sensor_positions {
        planes
            .entry(layout.plane_of(sensor.sensor_id))
            .or_default()
            .push(sensor.z);
    }

    let max_sensors = layout.max_sensors_per_plane();
    let mut problems = Vec::new();
    for (plane, z_values) in &planes {
        if let Some(z) = z_values.iter().find(|z| !z.is_finite()) {
            problems.push(format!("{} plane has a non-finite z = {}", plane, z));
        } else {
            // Adding 0.0 folds -0.0 into 0.0 before comparing bit patterns.
            let distinct_z = z_values
                .iter()
                .map(|z| (z + 0.0).to_bits())
                .collect::<BTreeSet<_>>();
            if distinct_z.len() != 1 {
                problems.push(format!("{} plane spans {} z values", plane, distinct_z.len()));
            } else if z_values[0] >= 0.0 {
                problems.push(format!("{} plane sits at z = {}", plane, z_values[0]));
            }
        }
        if z_values.len() as i64 > max_sensors {
            problems.push(format!(
                "{} plane holds {} sensors, at most {}",
                plane,
                z_values.len(),
                max_sensors
            ));
        }
    }

    if problems.is_empty() {
        Ok(format!("{} populated planes", planes.len()))
    } else {
        Err(problems.join("; "))
    }
}

fn plane_population(
    ids: &BTreeSet<i64>,
    layout: &PlaneLayout,
    sensor_count: u32,
) -> Result<String, String> {
    let (near, far): (Vec<i64>, Vec<i64>) = ids
        .iter()
        .copied()
        .partition(|&id| layout.plane_of(id) == Plane::Near);

    let mut problems = Vec::new();
    for (plane, count) in [(Plane::Near, near.len()), (Plane::Far, far.len())] {
        if count <= 1 || count > sensor_count as usize {
            problems.push(format!(
                "{} plane has {} responding sensors, expected more than 1 and at most {}",
                plane, count, sensor_count
            ));
        }
    }

    if problems.is_empty() {
        Ok(format!(
            "near plane {} sensors, far plane {} sensors",
            near.len(),
            far.len()
        ))
    } else {
        Err(problems.join("; "))
    }
}

fn event_charge_floor(tables: &OutputTables, floor: f64) -> Result<String, String> {
    let sums = tables.charge_per_event();
    let below = sums
        .iter()
        .filter(|&(_, &charge)| charge < floor)
        .collect::<Vec<_>>();
    match below.first() {
        None => Ok(format!("{} events at or above charge {}", sums.len(), floor)),
        Some((event, charge)) => Err(format!(
            "{} events below charge {}, first: event {} with {}",
            below.len(),
            floor,
            event,
            charge
        )),
    }
}

fn event_coverage(tables: &OutputTables) -> Result<String, String> {
    let particle_events = tables.particle_event_ids();
    let hit_events = tables.hit_event_ids();
    if particle_events == hit_events {
        return Ok(format!("{} events in both tables", hit_events.len()));
    }

    let without_charge = particle_events.difference(&hit_events).count();
    let without_particles = hit_events.difference(&particle_events).count();
    Err(format!(
        "{} events have particles but no charge, {} have charge but no particles",
        without_charge, without_particles
    ))
}

fn provenance(
    tables: &OutputTables,
    particle_names: &[String],
    expected: &str,
) -> Result<String, String> {
    let selected = tables
        .particles
        .iter()
        .filter(|particle| particle_names.contains(&particle.particle_name))
        .collect::<Vec<_>>();
    if selected.is_empty() {
        return Err(format!("no {} particles recorded", particle_names.join("/")));
    }

    let creators = selected
        .iter()
        .map(|particle| particle.creator_proc.as_str())
        .collect::<BTreeSet<_>>();
    if creators.len() == 1 && creators.contains(expected) {
        Ok(format!("{} particles created by {}", selected.len(), expected))
    } else {
        Err(format!(
            "creator processes [{}], expected only {}",
            creators.into_iter().collect::<Vec<_>>().join(", "),
            expected
        ))
    }
}

fn vertex_containment(tables: &OutputTables, allowed: &[String]) -> Result<String, String> {
    let primaries = tables
        .particles
        .iter()
        .filter(|particle| particle.primary)
        .collect::<Vec<_>>();
    if primaries.is_empty() {
        return Err("no primary particles recorded".to_string());
    }

    let outside = primaries
        .iter()
        .map(|particle| particle.initial_volume.as_str())
        .filter(|volume| !allowed.iter().any(|name| name == *volume))
        .collect::<BTreeSet<_>>();
    if outside.is_empty() {
        Ok(format!("{} primaries inside allowed volumes", primaries.len()))
    } else {
        Err(format!(
            "primaries generated in [{}]",
            outside.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}
