// Error handling framework for venv-wrapper
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WrapperError>;

/// Main error type with one boxed variant per failure domain
#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Environment error: {0}")]
    Environment(#[from] Box<EnvironmentError>),

    #[error("Installer error: {0}")]
    Installer(#[from] Box<InstallerError>),

    #[error("Process execution failed: {0}")]
    Process(#[from] Box<ProcessError>),

    #[error("CLI argument error: {0}")]
    Cli(#[from] Box<CliError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        file_path: Option<PathBuf>,
    },
}

/// Errors raised while creating or probing the isolated environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Python interpreter not found: {name}")]
    InterpreterNotFound {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Virtual environment creation failed at {path}")]
    CreationFailed {
        path: PathBuf,
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Could not determine the environment's Python version: {message}")]
    VersionQueryFailed { message: String, stderr: String },

    #[error("{library} is not importable inside the environment")]
    ProbeFailed {
        library: String,
        stdout: String,
        stderr: String,
    },

    #[error("Standard library enumeration failed for Python {version}")]
    StdlibEnumerationFailed {
        version: String,
        stdout: String,
        stderr: String,
    },

    #[error("Cannot read target script {path}: {error}")]
    ScriptUnreadable { path: PathBuf, error: String },
}

/// Package installer (pip) failures
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("Failed to upgrade {package}")]
    UpgradeFailed {
        package: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to install {package}")]
    InstallFailed {
        package: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to install requirements from {file}")]
    RequirementsFailed {
        file: PathBuf,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Process execution errors with detailed context
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Process spawn failed: {command}")]
    SpawnFailed { command: String, error: String },

    #[error("Process wait failed: {command}")]
    WaitFailed { command: String, error: String },

    #[error("Async runtime unavailable: {error}")]
    RuntimeUnavailable { error: String },
}

/// Command-line interface errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Conflicting arguments: {first} and {second}")]
    ConflictingArguments {
        first: String,
        second: String,
        suggestion: String,
    },
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &WrapperError) -> String {
        use tracing::error;

        let error_type = match error {
            WrapperError::Config(_) => "config",
            WrapperError::Environment(_) => "environment",
            WrapperError::Installer(_) => "installer",
            WrapperError::Process(_) => "process",
            WrapperError::Cli(_) => "cli",
            WrapperError::Io(_) => "io",
        };
        error!(error_type = error_type, error = %error, "Bootstrap aborted");

        let mut output = String::new();

        if self.use_colors {
            output.push_str("\x1b[31m");
        }
        output.push_str("Error: ");
        if self.use_colors {
            output.push_str("\x1b[0m");
        }

        output.push_str(&error.to_string());

        match error {
            WrapperError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            WrapperError::Environment(env_err) => {
                self.add_environment_context(&mut output, env_err.as_ref());
            }
            WrapperError::Installer(installer_err) => {
                self.add_installer_context(&mut output, installer_err.as_ref());
            }
            WrapperError::Process(process_err) => {
                self.add_process_context(&mut output, process_err.as_ref());
            }
            WrapperError::Cli(cli_err) => {
                self.add_cli_context(&mut output, cli_err.as_ref());
            }
            WrapperError::Io(_) => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ConfigError::InvalidValue {
                file_path: Some(path),
                ..
            } => {
                output.push_str(&format!("\n  --> {}", path.display()));
            }
            _ => {}
        }
    }

    fn add_environment_context(&self, output: &mut String, error: &EnvironmentError) {
        match error {
            EnvironmentError::InterpreterNotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            EnvironmentError::CreationFailed {
                command,
                stdout,
                stderr,
                ..
            } => {
                output.push_str(&format!("\n  Command: {command}"));
                push_captured(output, stdout, stderr);
            }
            EnvironmentError::VersionQueryFailed { stderr, .. } => {
                push_captured(output, "", stderr);
            }
            EnvironmentError::ProbeFailed { stdout, stderr, .. }
            | EnvironmentError::StdlibEnumerationFailed { stdout, stderr, .. } => {
                push_captured(output, stdout, stderr);
            }
            _ => {}
        }
    }

    fn add_installer_context(&self, output: &mut String, error: &InstallerError) {
        let (exit_code, stdout, stderr) = match error {
            InstallerError::UpgradeFailed {
                exit_code,
                stdout,
                stderr,
                ..
            }
            | InstallerError::InstallFailed {
                exit_code,
                stdout,
                stderr,
                ..
            }
            | InstallerError::RequirementsFailed {
                exit_code,
                stdout,
                stderr,
                ..
            } => (exit_code, stdout, stderr),
        };
        if let Some(code) = exit_code {
            output.push_str(&format!("\n  Exit code: {code}"));
        }
        push_captured(output, stdout, stderr);
    }

    fn add_process_context(&self, output: &mut String, error: &ProcessError) {
        match error {
            ProcessError::SpawnFailed { error, .. } | ProcessError::WaitFailed { error, .. } => {
                output.push_str(&format!("\n  Cause: {error}"));
            }
            ProcessError::RuntimeUnavailable { .. } => {}
        }
    }

    fn add_cli_context(&self, output: &mut String, error: &CliError) {
        match error {
            CliError::ConflictingArguments { suggestion, .. } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
        }
    }
}

fn push_captured(output: &mut String, stdout: &str, stderr: &str) {
    let stdout = stdout.trim();
    let stderr = stderr.trim();
    if !stdout.is_empty() {
        output.push_str(&format!("\n  stdout:\n{}", indent(stdout)));
    }
    if !stderr.is_empty() {
        output.push_str(&format!("\n  stderr:\n{}", indent(stderr)));
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Exit codes for each failure class. The target script's own exit code is
/// passed through untouched and never goes through this table.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const ENVIRONMENT_ERROR: i32 = 3;
    pub const INSTALLER_ERROR: i32 = 4;
    pub const PROBE_ERROR: i32 = 5;
    pub const STDLIB_ERROR: i32 = 6;
    pub const CLI_ERROR: i32 = 7;
    pub const PROCESS_ERROR: i32 = 8;
}

impl WrapperError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            WrapperError::Config(_) => exit_codes::CONFIG_ERROR,
            WrapperError::Environment(env_err) => match env_err.as_ref() {
                EnvironmentError::ProbeFailed { .. } => exit_codes::PROBE_ERROR,
                EnvironmentError::StdlibEnumerationFailed { .. }
                | EnvironmentError::VersionQueryFailed { .. } => exit_codes::STDLIB_ERROR,
                _ => exit_codes::ENVIRONMENT_ERROR,
            },
            WrapperError::Installer(_) => exit_codes::INSTALLER_ERROR,
            WrapperError::Process(_) => exit_codes::PROCESS_ERROR,
            WrapperError::Cli(_) => exit_codes::CLI_ERROR,
            WrapperError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        let formatter = ErrorFormatter::new(use_colors);
        formatter.format_error(self)
    }
}

impl From<ConfigError> for WrapperError {
    fn from(error: ConfigError) -> Self {
        WrapperError::Config(Box::new(error))
    }
}

impl From<EnvironmentError> for WrapperError {
    fn from(error: EnvironmentError) -> Self {
        WrapperError::Environment(Box::new(error))
    }
}

impl From<InstallerError> for WrapperError {
    fn from(error: InstallerError) -> Self {
        WrapperError::Installer(Box::new(error))
    }
}

impl From<ProcessError> for WrapperError {
    fn from(error: ProcessError) -> Self {
        WrapperError::Process(Box::new(error))
    }
}

impl From<CliError> for WrapperError {
    fn from(error: CliError) -> Self {
        WrapperError::Cli(Box::new(error))
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}
