mod commands;
mod helpers;

use clap::Parser;
use petalo_harness_core::domain::HarnessError;

const PROGRAM_NAME: &str = "petalo-harness";

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let result = helpers::init_logging()
        .map_err(CliError::from)
        .and_then(|()| run(args));
    match result {
        Ok(code) => code,
        Err(error) => {
            let harness_error = error.as_harness_error();
            eprintln!("{}", harness_error.diagnostic_line());
            if let Some(summary_line) = harness_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            harness_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();

    match Cli::try_parse_from(&full_args) {
        Ok(cli) => dispatch(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "petalo-harness",
    about = "Regression harness for the PETALO detector simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Synthesize, simulate and validate catalog scenarios
    Run(commands::RunArgs),
    /// Run every example init macro shipped under $PETALODIR/macros
    Macros(commands::MacrosArgs),
    /// List catalog scenarios in execution order
    List(commands::CatalogArgs),
    /// Decode sensor ids with a scenario's numbering scheme
    Decode(commands::DecodeArgs),
}

fn dispatch(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_suite_command(args),
        CliCommand::Macros(args) => commands::run_macros_command(args),
        CliCommand::List(args) => commands::run_list_command(args),
        CliCommand::Decode(args) => commands::run_decode_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Harness(#[from] HarnessError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_harness_error(&self) -> HarnessError {
        match self {
            Self::Usage(message) => {
                HarnessError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Harness(error) => error.clone(),
            Self::Internal(error) => HarnessError::internal("SYS.CLI", format!("{error:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};

    #[test]
    fn help_is_not_an_error() {
        assert_eq!(run(["--help"]).expect("help should print"), 0);
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["simulate"]).expect_err("unknown subcommand");
        assert!(matches!(error, CliError::Usage(_)));
        let harness_error = error.as_harness_error();
        assert_eq!(harness_error.placeholder(), "INPUT.CLI_USAGE");
        assert_eq!(harness_error.exit_code(), 2);
    }

    #[test]
    fn decode_rejects_unknown_scenarios() {
        let error = run(["decode", "no_such_scenario", "1"]).expect_err("unknown scenario");
        let harness_error = error.as_harness_error();
        assert_eq!(harness_error.placeholder(), "INPUT.UNKNOWN_SCENARIO");
        assert_eq!(harness_error.scenario(), Some("no_such_scenario"));
    }
}
