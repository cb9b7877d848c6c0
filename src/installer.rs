// Package installer (pip) invocations inside the environment

use std::path::{Path, PathBuf};

use crate::environment::VirtualEnv;
use crate::error::{InstallerError, Result};
use crate::logging::utils::log_captured_output;
use crate::process::{CommandRunner, ProcessConfig, ProcessResult};

/// Thin wrapper over the environment's own `pip` executable
pub struct PipInstaller<'a, R: CommandRunner> {
    runner: &'a R,
    pip: PathBuf,
    working_dir: Option<PathBuf>,
}

impl<'a, R: CommandRunner> PipInstaller<'a, R> {
    pub fn new(runner: &'a R, venv: &VirtualEnv) -> Self {
        Self {
            runner,
            pip: venv.pip_executable(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn pip(&self) -> &Path {
        &self.pip
    }

    /// `pip install --upgrade <package>`
    pub fn upgrade(&self, package: &str) -> Result<()> {
        tracing::info!(package = %package, "Upgrading");
        let result = self.pip_command(["install", "--upgrade", package])?;
        if !result.success() {
            return Err(InstallerError::UpgradeFailed {
                package: package.to_string(),
                exit_code: result.exit_code(),
                stdout: result.stdout(),
                stderr: result.stderr(),
            }
            .into());
        }
        Ok(())
    }

    /// `pip install <package>`
    pub fn install(&self, package: &str) -> Result<()> {
        tracing::info!(package = %package, "Installing");
        let result = self.pip_command(["install", package])?;
        if !result.success() {
            return Err(InstallerError::InstallFailed {
                package: package.to_string(),
                exit_code: result.exit_code(),
                stdout: result.stdout(),
                stderr: result.stderr(),
            }
            .into());
        }
        Ok(())
    }

    /// `pip install -r <manifest>`; the manifest itself is never parsed here
    pub fn install_requirements(&self, manifest: &Path) -> Result<()> {
        tracing::info!(file = %manifest.display(), "Installing requirements");
        let config = self
            .base_config()
            .with_args(["install".into(), "-r".into(), manifest.as_os_str().to_os_string()]);
        let result = self.execute(config)?;
        if !result.success() {
            return Err(InstallerError::RequirementsFailed {
                file: manifest.to_path_buf(),
                exit_code: result.exit_code(),
                stdout: result.stdout(),
                stderr: result.stderr(),
            }
            .into());
        }
        Ok(())
    }

    /// `pip show <package>`; a nonzero exit means "not installed", never an error
    pub fn is_installed(&self, package: &str) -> Result<bool> {
        let name = strip_version_pin(package);
        let result = self.pip_command(["show", name])?;
        Ok(result.success())
    }

    fn pip_command<const N: usize>(&self, args: [&str; N]) -> Result<ProcessResult> {
        self.execute(self.base_config().with_args(args))
    }

    fn base_config(&self) -> ProcessConfig {
        let config = ProcessConfig::new(&self.pip);
        match self.working_dir {
            Some(ref dir) => config.with_working_dir(dir.clone()),
            None => config,
        }
    }

    fn execute(&self, config: ProcessConfig) -> Result<ProcessResult> {
        let command = config.display_command();
        let result = self.runner.run(config)?;
        log_captured_output(&command, &result.stdout(), &result.stderr());
        Ok(result)
    }
}

/// `requests==2.31` -> `requests`
fn strip_version_pin(package: &str) -> &str {
    package
        .split("==")
        .next()
        .map(str::trim)
        .unwrap_or(package)
}
