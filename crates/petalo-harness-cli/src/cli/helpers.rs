use super::CliError;
use anyhow::anyhow;
use petalo_harness_core::catalog::ScenarioCatalog;
use petalo_harness_core::domain::HarnessError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const ROOT_VARIABLE: &str = "PETALODIR";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default
/// `warn` filter.
pub(super) fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}

pub(super) fn petalo_root() -> Result<PathBuf, CliError> {
    match std::env::var_os(ROOT_VARIABLE) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(HarnessError::input_validation(
            "INPUT.ENVIRONMENT",
            format!(
                "environment variable {} must name the simulator installation root",
                ROOT_VARIABLE
            ),
        )
        .into()),
    }
}

/// Explicit executable, or `$PETALODIR/bin/petalo`.
pub(super) fn resolve_executable(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let executable = petalo_root()?.join("bin").join("petalo");
            tracing::debug!(executable = %executable.display(), "using simulator from PETALODIR");
            Ok(executable)
        }
    }
}

/// Explicit macros directory, or `$PETALODIR/macros`.
pub(super) fn resolve_macros_dir(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let macros_dir = petalo_root()?.join("macros");
            tracing::debug!(macros_dir = %macros_dir.display(), "using macros from PETALODIR");
            Ok(macros_dir)
        }
    }
}

pub(super) fn load_catalog(manifest: Option<&Path>) -> Result<ScenarioCatalog, CliError> {
    let catalog = match manifest {
        Some(path) => ScenarioCatalog::from_manifest_path(path),
        None => ScenarioCatalog::builtin(),
    };
    catalog.map_err(|error| CliError::Harness(error.into()))
}

pub(super) fn timeout_from_secs(seconds: Option<u64>) -> Option<Duration> {
    seconds.map(Duration::from_secs)
}
