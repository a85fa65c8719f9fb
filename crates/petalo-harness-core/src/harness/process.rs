use super::{ExecutionError, LaunchOutcome, ScheduledRun, SimulatorLauncher};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Launches the simulator as `<executable> -b -n <events> <init script>`.
///
/// The child inherits the caller's environment and standard streams.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn command(&self, run: &ScheduledRun) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("-b")
            .arg("-n")
            .arg(run.event_count.to_string())
            .arg(&run.init_script_path);
        command
    }

    fn launch_error(&self, run: &ScheduledRun, source: std::io::Error) -> ExecutionError {
        ExecutionError::Launch {
            scenario: run.scenario_name.clone(),
            executable: self.executable.clone(),
            source,
        }
    }

    fn wait_with_timeout(
        &self,
        run: &ScheduledRun,
        child: &mut Child,
        timeout: Duration,
    ) -> Result<ExitStatus, ExecutionError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|source| self.launch_error(run, source))?
            {
                return Ok(status);
            }

            if started.elapsed() >= timeout {
                // The child may exit between the check and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutionError::SimulationTimeout {
                    scenario: run.scenario_name.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SimulatorLauncher for ProcessLauncher {
    fn launch(&self, run: &ScheduledRun) -> Result<LaunchOutcome, ExecutionError> {
        let mut child = self
            .command(run)
            .spawn()
            .map_err(|source| self.launch_error(run, source))?;

        let status = match self.timeout {
            Some(timeout) => self.wait_with_timeout(run, &mut child, timeout)?,
            None => child.wait().map_err(|source| self.launch_error(run, source))?,
        };

        Ok(LaunchOutcome {
            success: status.success(),
            exit_code: status.code(),
        })
    }
}
