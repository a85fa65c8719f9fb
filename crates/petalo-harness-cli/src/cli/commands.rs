use super::CliError;
use super::helpers::*;
use petalo_harness_core::domain::HarnessError;
use petalo_harness_core::harness::ProcessLauncher;
use petalo_harness_core::suite::{
    SuiteConfig, render_human_summary, run_example_macros, run_suite,
};
use petalo_harness_core::tables::DEFAULT_TABLE_EXTENSION;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct CatalogArgs {
    /// JSON scenario catalog; the built-in catalog when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct StagingArgs {
    /// Directory rendered control scripts are written to
    #[arg(long, default_value = "artifacts/staging")]
    staging_dir: PathBuf,

    /// Directory the simulator writes its output files to
    #[arg(long, default_value = "artifacts/output")]
    output_dir: PathBuf,

    /// Simulator executable; $PETALODIR/bin/petalo when omitted
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Kill a simulation that runs longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    #[command(flatten)]
    staging: StagingArgs,

    /// Scenario to run (repeatable); every catalog scenario when omitted
    #[arg(long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,

    /// JSON report output path
    #[arg(long, default_value = "artifacts/report.json")]
    report: PathBuf,

    /// Extension of the table file read after each run. The JSON reader
    /// expects the simulator's tables exported next to the output stem.
    #[arg(long, default_value = DEFAULT_TABLE_EXTENSION)]
    table_extension: String,
}

impl RunArgs {
    fn into_config(self) -> Result<SuiteConfig, CliError> {
        Ok(SuiteConfig {
            executable: resolve_executable(self.staging.executable)?,
            staging_dir: self.staging.staging_dir,
            output_dir: self.staging.output_dir,
            report_path: self.report,
            timeout: timeout_from_secs(self.staging.timeout_secs),
            table_extension: self.table_extension,
            scenarios: self.scenarios,
        })
    }
}

#[derive(clap::Args)]
pub(super) struct MacrosArgs {
    #[command(flatten)]
    staging: StagingArgs,

    /// Directory searched for *.init.mac files; $PETALODIR/macros when omitted
    #[arg(long)]
    macros_dir: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct DecodeArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Scenario whose numbering scheme applies
    scenario: String,

    /// Sensor ids to decode
    #[arg(required = true, allow_negative_numbers = true)]
    sensor_ids: Vec<i64>,
}

pub(super) fn run_suite_command(args: RunArgs) -> Result<i32, CliError> {
    let catalog = load_catalog(args.catalog.catalog.as_deref())?;
    let config = args.into_config()?;

    let report = run_suite(&catalog, &config)?;
    println!("{}", render_human_summary(&report));
    println!("JSON report: {}", config.report_path.display());

    if report.passed { Ok(0) } else { Ok(1) }
}

pub(super) fn run_macros_command(args: MacrosArgs) -> Result<i32, CliError> {
    let macros_dir = resolve_macros_dir(args.macros_dir)?;
    let config = SuiteConfig {
        executable: resolve_executable(args.staging.executable)?,
        staging_dir: args.staging.staging_dir,
        output_dir: args.staging.output_dir,
        timeout: timeout_from_secs(args.staging.timeout_secs),
        ..SuiteConfig::default()
    };
    let launcher = ProcessLauncher::new(&config.executable).with_timeout(config.timeout);

    let runs = run_example_macros(&macros_dir, &config, launcher)?;
    for run in &runs {
        println!("Ran {} ({} events)", run.scenario_name, run.event_count);
    }
    println!("Example macros: {} run", runs.len());
    Ok(0)
}

pub(super) fn run_list_command(args: CatalogArgs) -> Result<i32, CliError> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    for scenario in catalog.all() {
        let dependency = scenario
            .reads_output_of
            .as_deref()
            .map(|source| format!(" (reads {})", source))
            .unwrap_or_default();
        println!(
            "{:<24} {:<13} {:>6} events{}",
            scenario.name,
            scenario.encoding_mode.as_str(),
            scenario.event_count,
            dependency
        );
    }
    Ok(0)
}

pub(super) fn run_decode_command(args: DecodeArgs) -> Result<i32, CliError> {
    let catalog = load_catalog(args.catalog.catalog.as_deref())?;
    let codec = catalog
        .codec(&args.scenario)
        .map_err(HarnessError::from)?;

    for sensor_id in args.sensor_ids {
        let decoded = codec
            .decode(sensor_id)
            .map_err(|error| HarnessError::from(error).with_scenario(args.scenario.clone()))?;
        println!("{}: {}", sensor_id, decoded);
    }
    Ok(0)
}
