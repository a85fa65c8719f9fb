//! End-to-end runs: synthesize, simulate, validate, report.

use crate::catalog::ScenarioCatalog;
use crate::domain::{HarnessError, HarnessResult, Scenario, ScriptKind, SimulationRun};
use crate::harness::{ExecutionHarness, ProcessLauncher, ScheduledRun, SimulatorLauncher};
use crate::synth::{ExampleMacro, ScriptSynthesizer, discover_example_macros};
use crate::tables::{DEFAULT_TABLE_EXTENSION, JsonTableReader, TableReader};
use crate::validate::{OutputValidator, ValidationReport};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub executable: PathBuf,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub report_path: PathBuf,
    pub timeout: Option<Duration>,
    pub table_extension: String,
    /// Empty runs the whole catalog.
    pub scenarios: Vec<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("bin/petalo"),
            staging_dir: PathBuf::from("artifacts/staging"),
            output_dir: PathBuf::from("artifacts/output"),
            report_path: PathBuf::from("artifacts/report.json"),
            timeout: None,
            table_extension: DEFAULT_TABLE_EXTENSION.to_string(),
            scenarios: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub generated_at_unix_seconds: u64,
    pub passed: bool,
    pub executable: String,
    pub staging_dir: String,
    pub output_dir: String,
    pub scenario_count: usize,
    pub passed_scenario_count: usize,
    pub failed_scenario_count: usize,
    pub check_count: usize,
    pub passed_check_count: usize,
    pub failed_check_count: usize,
    pub runs: Vec<SimulationRun>,
    pub scenarios: Vec<ValidationReport>,
}

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("scenario reads the output of '{source_scenario}', which did not run")]
    MissingSourceRun {
        scenario: String,
        source_scenario: String,
    },
    #[error("failed to create report directory '{}': {source}", path.display())]
    ReportDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize suite report '{}': {source}", path.display())]
    SerializeReport {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write suite report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<SuiteError> for HarnessError {
    fn from(error: SuiteError) -> Self {
        let message = error.to_string();
        match error {
            SuiteError::MissingSourceRun { scenario, .. } => {
                HarnessError::internal("SYS.SUITE_SOURCE_RUN", message).with_scenario(scenario)
            }
            SuiteError::SerializeReport { .. } => {
                HarnessError::internal("SYS.SUITE_REPORT", message)
            }
            SuiteError::ReportDirectory { .. } | SuiteError::WriteReport { .. } => {
                HarnessError::io_system("IO.SUITE_REPORT", message)
            }
        }
    }
}

/// Runs the selected catalog scenarios with the real simulator.
pub fn run_suite(catalog: &ScenarioCatalog, config: &SuiteConfig) -> HarnessResult<SuiteReport> {
    let launcher = ProcessLauncher::new(&config.executable).with_timeout(config.timeout);
    let reader = JsonTableReader::new(&config.table_extension);
    run_suite_with(catalog, config, launcher, reader)
}

/// Every script is rendered before the first simulation starts, so a
/// synthesis error never leaves a half-executed suite behind.
pub fn run_suite_with<L, R>(
    catalog: &ScenarioCatalog,
    config: &SuiteConfig,
    launcher: L,
    reader: R,
) -> HarnessResult<SuiteReport>
where
    L: SimulatorLauncher,
    R: TableReader,
{
    let selected = catalog.select(&config.scenarios)?;
    tracing::info!(scenarios = selected.len(), "starting suite");

    let mut synthesizer = ScriptSynthesizer::new(&config.staging_dir, &config.output_dir);
    let mut scheduled = Vec::with_capacity(selected.len());
    for scenario in &selected {
        let scripts = synthesizer.render(scenario)?;
        scheduled.push(ScheduledRun {
            scenario_name: scenario.name.clone(),
            init_script_path: scripts.init.rendered_path,
            event_count: scenario.event_count,
            output_table_path: output_table_path(
                &config.output_dir,
                &scenario.name,
                reader.extension(),
            ),
        });
    }

    let runs = match ExecutionHarness::new(launcher).run_all(&scheduled) {
        Ok(runs) => runs,
        Err(aborted) => {
            // The partial report records every run up to the failed one.
            let report = build_report(config, aborted.runs, Vec::new());
            if let Err(write_error) = write_report_file(&config.report_path, &report) {
                tracing::warn!(error = %write_error, "could not write partial suite report");
            }
            return Err(aborted.error.into());
        }
    };

    let validator = OutputValidator::new(reader);
    let mut reports = Vec::with_capacity(selected.len());
    for scenario in &selected {
        let source_run = source_run(scenario, &runs)?;
        let codec = catalog.codec(&scenario.name)?;
        reports.push(validator.validate(scenario, &codec, source_run));
    }

    let report = build_report(config, runs, reports);
    write_report_file(&config.report_path, &report)?;
    tracing::info!(
        passed = report.passed,
        failed_scenarios = report.failed_scenario_count,
        report = %normalize_path(&config.report_path),
        "suite finished"
    );
    Ok(report)
}

/// Stages and runs every shipped example init template. No output checks.
pub fn run_example_macros<L>(
    macros_root: &Path,
    config: &SuiteConfig,
    launcher: L,
) -> HarnessResult<Vec<SimulationRun>>
where
    L: SimulatorLauncher,
{
    let examples = discover_example_macros(macros_root)?;
    tracing::info!(
        examples = examples.len(),
        root = %macros_root.display(),
        "running example macros"
    );

    let mut synthesizer = ScriptSynthesizer::new(&config.staging_dir, &config.output_dir);
    let mut scheduled = Vec::with_capacity(examples.len());
    for ExampleMacro {
        name,
        init_template,
        event_count,
    } in examples
    {
        let scripts = synthesizer.render_template(&name, &init_template)?;
        scheduled.push(ScheduledRun {
            scenario_name: name,
            init_script_path: scripts.init.rendered_path,
            event_count,
            output_table_path: config.output_dir.clone(),
        });
    }

    Ok(ExecutionHarness::new(launcher).run_all(&scheduled)?)
}

pub fn render_human_summary(report: &SuiteReport) -> String {
    let mut lines = Vec::new();
    let status = if report.passed { "PASS" } else { "FAIL" };
    lines.push(format!("Suite status: {}", status));
    lines.push(format!(
        "Scenarios: {} total ({} passed, {} failed)",
        report.scenario_count, report.passed_scenario_count, report.failed_scenario_count
    ));
    lines.push(format!(
        "Checks: {} total ({} passed, {} failed)",
        report.check_count, report.passed_check_count, report.failed_check_count
    ));

    for (scenario, run) in report.scenarios.iter().zip(&report.runs) {
        let scenario_status = if scenario.passed { "PASS" } else { "FAIL" };
        let passed_checks = scenario.checks.iter().filter(|check| check.passed).count();
        lines.push(format!(
            "Scenario {}: {} ({}/{} checks, {} events)",
            scenario.scenario,
            scenario_status,
            passed_checks,
            scenario.checks.len(),
            run.event_count
        ));

        if let Some(first_failure) = scenario.failed_checks().next() {
            lines.push(format!(
                "  first failure: {} ({})",
                first_failure.check, first_failure.detail
            ));
        }
    }

    lines.join("\n")
}

/// Staged init script path for a scenario, as `run_suite` renders it.
pub fn staged_init_path(config: &SuiteConfig, scenario_name: &str) -> PathBuf {
    config
        .staging_dir
        .join(ScriptKind::Init.file_name(scenario_name))
}

fn output_table_path(output_dir: &Path, scenario_name: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}.{}", scenario_name, extension))
}

fn source_run<'a>(
    scenario: &Scenario,
    runs: &'a [SimulationRun],
) -> Result<&'a SimulationRun, SuiteError> {
    let source = scenario.output_source();
    runs.iter()
        .find(|run| run.scenario_name == source)
        .ok_or_else(|| SuiteError::MissingSourceRun {
            scenario: scenario.name.clone(),
            source_scenario: source.to_string(),
        })
}

fn build_report(
    config: &SuiteConfig,
    runs: Vec<SimulationRun>,
    scenarios: Vec<ValidationReport>,
) -> SuiteReport {
    let scenario_count = scenarios.len();
    let passed_scenario_count = scenarios.iter().filter(|report| report.passed).count();
    let check_count = scenarios
        .iter()
        .map(|report| report.checks.len())
        .sum::<usize>();
    let passed_check_count = scenarios
        .iter()
        .flat_map(|report| &report.checks)
        .filter(|check| check.passed)
        .count();
    let failed_scenario_count = scenario_count.saturating_sub(passed_scenario_count);

    SuiteReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        passed: failed_scenario_count == 0 && runs.iter().all(SimulationRun::succeeded),
        executable: normalize_path(&config.executable),
        staging_dir: normalize_path(&config.staging_dir),
        output_dir: normalize_path(&config.output_dir),
        scenario_count,
        passed_scenario_count,
        failed_scenario_count,
        check_count,
        passed_check_count,
        failed_check_count: check_count.saturating_sub(passed_check_count),
        runs,
        scenarios,
    }
}

fn write_report_file(report_path: &Path, report: &SuiteReport) -> Result<(), SuiteError> {
    if let Some(parent_dir) = report_path.parent() {
        fs::create_dir_all(parent_dir).map_err(|source| SuiteError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| SuiteError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| SuiteError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
