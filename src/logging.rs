// Logging setup for venv-wrapper
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Color output configuration
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
}

/// Log output format options. JSON lines carry timestamps; the
/// human-readable formats do not.
#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Color output configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    Auto,
    Always,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            color: ColorConfig::Auto,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        let color_config = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            format: LogFormat::Pretty,
            color: color_config,
            show_targets: verbose,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG wins when set; otherwise only this crate logs, at the chosen level
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("venv_wrapper={}", self.level)))
    }
}

/// Initialize the logging system. Logs go to stderr so the target script
/// keeps stdout to itself.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = config.env_filter();
    let ansi = config.should_use_colors();

    let builder = fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .with_target(config.show_targets);

    // try_init fails only when a global subscriber is already installed
    let installed = match config.format {
        LogFormat::Pretty => builder.without_time().try_init(),
        LogFormat::Compact => builder.compact().without_time().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        tracing::debug!("Logging already initialized: {e}");
    }

    Ok(())
}

/// Logging utilities for the bootstrap steps
pub mod utils {
    use std::path::Path;
    use tracing::{info, span, Level, Span};

    /// Create a span covering one bootstrap run
    pub fn bootstrap_span(script: &Path, venv: &Path) -> Span {
        span!(
            Level::INFO,
            "bootstrap",
            script = %script.display(),
            venv = %venv.display()
        )
    }

    /// Create a span for a single bootstrap step
    pub fn step_span(step: &'static str) -> Span {
        span!(Level::DEBUG, "step", name = step)
    }

    /// Log captured subprocess output line by line at debug level
    pub fn log_captured_output(command: &str, stdout: &str, stderr: &str) {
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(command = %command, stream = "stdout", "{line}");
        }
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(command = %command, stream = "stderr", "{line}");
        }
    }

    /// Log that a package install decision was made
    pub fn log_package_decision(package: &str, decision: &str) {
        info!(package = %package, decision = %decision, "Dependency processed");
    }
}
