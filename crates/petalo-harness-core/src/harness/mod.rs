mod process;

pub use process::ProcessLauncher;

use crate::domain::{HarnessError, RunStatus, SimulationRun};
use std::path::PathBuf;
use std::time::Duration;

/// One simulator invocation, ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    pub scenario_name: String,
    pub init_script_path: PathBuf,
    pub event_count: u64,
    pub output_table_path: PathBuf,
}

/// How a launched simulator process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl LaunchOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            success: code == 0,
            exit_code: Some(code),
        }
    }

    fn status_text(&self) -> String {
        self.exit_code.map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit code {}", code),
        )
    }
}

pub trait SimulatorLauncher {
    fn launch(&self, run: &ScheduledRun) -> Result<LaunchOutcome, ExecutionError>;
}

impl<T> SimulatorLauncher for &T
where
    T: SimulatorLauncher + ?Sized,
{
    fn launch(&self, run: &ScheduledRun) -> Result<LaunchOutcome, ExecutionError> {
        (**self).launch(run)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("simulation failed with {status}")]
    SimulationRunFailed {
        scenario: String,
        exit_status: Option<i32>,
        status: String,
    },
    #[error("simulation exceeded the {}s timeout and was killed", timeout.as_secs_f64())]
    SimulationTimeout { scenario: String, timeout: Duration },
    #[error("failed to launch simulator '{}': {source}", executable.display())]
    Launch {
        scenario: String,
        executable: PathBuf,
        source: std::io::Error,
    },
}

impl ExecutionError {
    pub fn scenario(&self) -> &str {
        match self {
            Self::SimulationRunFailed { scenario, .. }
            | Self::SimulationTimeout { scenario, .. }
            | Self::Launch { scenario, .. } => scenario,
        }
    }

    /// Exit code of the failed process, when it exited on its own.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::SimulationRunFailed { exit_status, .. } => *exit_status,
            Self::SimulationTimeout { .. } | Self::Launch { .. } => None,
        }
    }
}

impl From<ExecutionError> for HarnessError {
    fn from(error: ExecutionError) -> Self {
        let scenario = error.scenario().to_string();
        let message = error.to_string();
        let converted = match error {
            ExecutionError::SimulationRunFailed { .. } => {
                HarnessError::computation("RUN.SIMULATION_FAILED", message)
            }
            ExecutionError::SimulationTimeout { .. } => {
                HarnessError::computation("RUN.SIMULATION_TIMEOUT", message)
            }
            ExecutionError::Launch { .. } => {
                HarnessError::io_system("IO.SIMULATOR_LAUNCH", message)
            }
        };
        converted.with_scenario(scenario)
    }
}

/// An ordered run stopped early. `runs` holds every run up to and including
/// the failed one, which is recorded with [`RunStatus::Failed`].
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionAborted {
    pub runs: Vec<SimulationRun>,
    #[source]
    pub error: ExecutionError,
}

impl ExecutionAborted {
    pub fn failed_run(&self) -> Option<&SimulationRun> {
        self.runs.last().filter(|run| !run.succeeded())
    }
}

impl From<ExecutionAborted> for HarnessError {
    fn from(aborted: ExecutionAborted) -> Self {
        aborted.error.into()
    }
}

/// Runs the simulator once per scheduled scenario, strictly in order.
#[derive(Debug)]
pub struct ExecutionHarness<L> {
    launcher: L,
}

impl<L: SimulatorLauncher> ExecutionHarness<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn run(&self, scheduled: &ScheduledRun) -> Result<SimulationRun, ExecutionError> {
        tracing::info!(
            scenario = %scheduled.scenario_name,
            events = scheduled.event_count,
            init = %scheduled.init_script_path.display(),
            "starting simulation"
        );
        let outcome = self.launcher.launch(scheduled)?;
        tracing::info!(
            scenario = %scheduled.scenario_name,
            status = %outcome.status_text(),
            "simulation finished"
        );

        if !outcome.success {
            return Err(ExecutionError::SimulationRunFailed {
                scenario: scheduled.scenario_name.clone(),
                exit_status: outcome.exit_code,
                status: outcome.status_text(),
            });
        }

        Ok(record(scheduled, RunStatus::Succeeded, outcome.exit_code))
    }

    /// Stops at the first failed run; later scenarios may read its output.
    pub fn run_all(
        &self,
        scheduled: &[ScheduledRun],
    ) -> Result<Vec<SimulationRun>, ExecutionAborted> {
        let mut runs = Vec::with_capacity(scheduled.len());
        for next in scheduled {
            match self.run(next) {
                Ok(run) => runs.push(run),
                Err(error) => {
                    runs.push(record(next, RunStatus::Failed, error.exit_status()));
                    return Err(ExecutionAborted { runs, error });
                }
            }
        }
        Ok(runs)
    }
}

fn record(scheduled: &ScheduledRun, status: RunStatus, exit_status: Option<i32>) -> SimulationRun {
    SimulationRun {
        scenario_name: scheduled.scenario_name.clone(),
        init_script_path: scheduled.init_script_path.clone(),
        event_count: scheduled.event_count,
        exit_status,
        status,
        output_table_path: scheduled.output_table_path.clone(),
    }
}
