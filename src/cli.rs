// CLI interface for venv-wrapper using clap
use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::bootstrap::Bootstrapper;
use crate::config::{BootstrapConfig, Config, Overrides};
use crate::error::{CliError, Result};
use crate::logging::{LogConfig, LogFormat};

#[derive(Parser)]
#[command(
    name = "venv-wrapper",
    about = "Run a Python script inside a managed virtual environment",
    version = crate::VERSION,
    long_about = "Creates (or reuses) a virtual environment, installs the script's dependencies from requirements.txt or from its import statements, then runs the script with the environment's interpreter and passes its exit code through."
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Control color output (auto, always, never)
    #[arg(long, value_name = "WHEN")]
    pub color: Option<String>,

    /// Log output format
    #[arg(long, value_enum, value_name = "FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Configuration file path (defaults to .venv-wrapper.yaml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Virtual environment directory
    #[arg(long, value_name = "DIR")]
    pub venv_dir: Option<PathBuf>,

    /// Interpreter used to create the environment
    #[arg(long, value_name = "PYTHON")]
    pub python: Option<String>,

    /// Dependency manifest installed instead of scanning the script
    #[arg(long, value_name = "FILE")]
    pub requirements: Option<PathBuf>,

    /// Do not upgrade pip and setuptools
    #[arg(long)]
    pub no_upgrade: bool,

    /// Script to run followed by the arguments passed to it
    #[arg(
        value_name = "SCRIPT [ARGS]",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Target script path
    pub fn script(&self) -> &Path {
        // clap rejects a missing script before we get here
        self.command.first().map_or(Path::new(""), Path::new)
    }

    /// Arguments forwarded to the script, unchanged
    pub fn script_args(&self) -> &[OsString] {
        self.command.get(1..).unwrap_or(&[])
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_cli(self.verbose, self.quiet, self.color.clone())
            .with_format(self.log_format)
    }

    pub fn run(&self) -> Result<i32> {
        self.init_logging();

        if self.verbose && self.quiet {
            return Err(CliError::ConflictingArguments {
                first: "--verbose".to_string(),
                second: "--quiet".to_string(),
                suggestion: "Use either --verbose for more output or --quiet for less output, but not both".to_string(),
            }
            .into());
        }

        let working_dir = std::env::current_dir()?;
        let config = self.bootstrap_config(working_dir)?;

        Bootstrapper::new(config).run(self.script(), self.script_args())
    }

    /// Merge the config file with command-line overrides
    pub fn bootstrap_config(&self, working_dir: PathBuf) -> Result<BootstrapConfig> {
        let file = Config::discover(self.config.as_deref(), &working_dir)?;
        let overrides = Overrides {
            venv_dir: self.venv_dir.clone(),
            requirements_file: self.requirements.clone(),
            python: self.python.clone(),
            no_upgrade: self.no_upgrade,
        };
        Ok(BootstrapConfig::resolve(working_dir, file, overrides))
    }

    fn init_logging(&self) {
        use crate::logging::init_logging;

        if let Err(e) = init_logging(self.log_config()) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
}
