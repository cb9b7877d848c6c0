// venv-wrapper - library module
// Bootstraps a Python virtual environment for a script, installs its
// dependencies and runs it inside the environment.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod environment;
pub mod error;
pub mod installer;
pub mod logging;
pub mod process;

// Re-export main types for easier access
pub use bootstrap::{Bootstrapper, TOOLING_PACKAGES};
pub use config::{BootstrapConfig, Config, Overrides};
pub use dependency::{InstallReport, PackageAliases, Resolution, StdlibModules};
pub use environment::{PythonVersion, VirtualEnv};
pub use error::{
    exit_codes, CliError, ConfigError, EnvironmentError, InstallerError, ProcessError, Result,
    WrapperError,
};
pub use installer::PipInstaller;
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use process::{CommandRunner, ProcessConfig, ProcessEnvironment, ProcessManager, ProcessResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get formatted version string
pub fn version_info() -> String {
    format!("{NAME} {VERSION}")
}
