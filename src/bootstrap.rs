// Environment bootstrapper: create the venv, install what the target script
// needs, then run it with the venv's interpreter

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::BootstrapConfig;
use crate::dependency::{self, stdlib, InstallReport, PackageAliases, Resolution};
use crate::environment::{self, VirtualEnv};
use crate::error::{exit_codes, EnvironmentError, Result};
use crate::installer::PipInstaller;
use crate::logging::utils::{bootstrap_span, log_package_decision, step_span};
use crate::process::{CommandRunner, ProcessConfig, ProcessManager};

/// Packages refreshed by `ensure_tooling`, in order
pub const TOOLING_PACKAGES: [&str; 2] = ["pip", "setuptools"];

pub struct Bootstrapper<R: CommandRunner = ProcessManager> {
    config: BootstrapConfig,
    aliases: PackageAliases,
    runner: R,
}

impl Bootstrapper<ProcessManager> {
    pub fn new(config: BootstrapConfig) -> Self {
        Self::with_runner(config, ProcessManager::new())
    }
}

impl<R: CommandRunner> Bootstrapper<R> {
    pub fn with_runner(config: BootstrapConfig, runner: R) -> Self {
        let aliases = PackageAliases::with_overrides(&config.package_aliases);
        Self {
            config,
            aliases,
            runner,
        }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The environment this bootstrapper manages
    pub fn environment(&self) -> VirtualEnv {
        VirtualEnv::new(&self.config.venv_dir)
    }

    /// Full sequence: environment, tooling, helper library, dependencies,
    /// target. Returns the target script's exit code.
    pub fn run(&self, script: &Path, args: &[OsString]) -> Result<i32> {
        let venv = self.environment();
        let script = self.script_path(script);
        let _span = bootstrap_span(&script, venv.root()).entered();

        self.create_environment(&venv)?;
        self.ensure_tooling(&venv)?;
        self.ensure_support_library(&venv)?;

        let resolution = self.resolve_dependencies(&venv, &script)?;
        if let Some(modules) = resolution.pending_modules() {
            self.install_dependencies(modules, &venv)?;
        }

        self.run_target(&venv, &script, args)
    }

    /// Create the environment if absent. Returns `true` when it was created.
    pub fn create_environment(&self, venv: &VirtualEnv) -> Result<bool> {
        let _span = step_span("create_environment").entered();
        environment::create_environment(&self.runner, venv, &self.config.python)
    }

    /// Upgrade pip and setuptools inside the environment
    pub fn ensure_tooling(&self, venv: &VirtualEnv) -> Result<()> {
        let _span = step_span("ensure_tooling").entered();
        if !self.config.upgrade_tooling {
            tracing::info!("Skipping installer upgrade");
            return Ok(());
        }

        let installer = self.installer(venv);
        for package in TOOLING_PACKAGES {
            installer.upgrade(package)?;
        }
        Ok(())
    }

    /// Make sure the stdlib helper library imports inside the environment,
    /// installing it once if needed
    pub fn ensure_support_library(&self, venv: &VirtualEnv) -> Result<()> {
        let _span = step_span("ensure_support_library").entered();
        if stdlib::probe(&self.runner, venv)?.importable {
            tracing::debug!(
                library = stdlib::SUPPORT_LIBRARY_MODULE,
                "Support library already importable"
            );
            return Ok(());
        }

        tracing::info!(
            package = stdlib::SUPPORT_LIBRARY_PACKAGE,
            "Installing support library"
        );
        self.installer(venv).install(stdlib::SUPPORT_LIBRARY_PACKAGE)?;

        let outcome = stdlib::probe(&self.runner, venv)?;
        if !outcome.importable {
            tracing::error!(
                library = stdlib::SUPPORT_LIBRARY_MODULE,
                stdout = %outcome.stdout.trim(),
                stderr = %outcome.stderr.trim(),
                "Support library import failed within virtual environment"
            );
            return Err(EnvironmentError::ProbeFailed {
                library: stdlib::SUPPORT_LIBRARY_MODULE.to_string(),
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            }
            .into());
        }

        tracing::debug!(stdout = %outcome.stdout.trim(), "Support library probe passed");
        Ok(())
    }

    /// Manifest first: install `requirements.txt` wholesale when present,
    /// otherwise scan the script for imports
    pub fn resolve_dependencies(&self, venv: &VirtualEnv, script: &Path) -> Result<Resolution> {
        let _span = step_span("resolve_dependencies").entered();
        let manifest = &self.config.requirements_file;

        if manifest.is_file() {
            tracing::info!(file = %manifest.display(), "Installing requirements from manifest");
            self.installer(venv).install_requirements(manifest)?;
            return Ok(Resolution::Manifest(manifest.clone()));
        }

        tracing::info!(
            file = %manifest.display(),
            "No manifest found. Parsing the script for dependencies"
        );
        let script = self.script_path(script);
        let mut modules = dependency::scan_script(&script)?;

        if let Some(script_dir) = script.parent() {
            modules.retain(|module| {
                let local = dependency::is_local_module(script_dir, module);
                if local {
                    log_package_decision(module, "local module");
                }
                !local
            });
        }

        if modules.is_empty() {
            tracing::info!("No dependencies found in the script");
        } else {
            tracing::debug!(modules = ?modules, "Inferred dependencies");
        }
        Ok(Resolution::Scanned(modules))
    }

    /// Install every non-stdlib module in `names` that the installer does not
    /// already report as present
    pub fn install_dependencies(
        &self,
        names: &BTreeSet<String>,
        venv: &VirtualEnv,
    ) -> Result<InstallReport> {
        let _span = step_span("install_dependencies").entered();
        let mut report = InstallReport::default();
        if names.is_empty() {
            return Ok(report);
        }

        let version = venv.python_version(&self.runner)?.major_minor();
        let builtins = stdlib::enumerate(&self.runner, venv, &version)?;
        let installer = self.installer(venv);

        for module in names {
            if builtins.contains(module) {
                tracing::info!(module = %module, "Skipping built-in module");
                report.builtin.push(module.clone());
                continue;
            }
            if self.config.ignore_modules.iter().any(|m| m == module) {
                log_package_decision(module, "ignored");
                report.ignored.push(module.clone());
                continue;
            }

            let package = self.aliases.resolve(module);
            if package != module {
                tracing::debug!(module = %module, package = %package, "Mapped import name");
            }

            tracing::info!(package = %package, "Checking installation");
            if installer.is_installed(package)? {
                log_package_decision(package, "already installed");
                report.already_installed.push(package.to_string());
                continue;
            }

            installer.install(package)?;
            report.installed.push(package.to_string());
        }

        tracing::debug!(
            packages = ?report.touched_packages().collect::<Vec<_>>(),
            skipped = report.builtin.len() + report.ignored.len(),
            "Dependencies satisfied"
        );
        Ok(report)
    }

    /// Run the script with the environment's interpreter and the terminal
    /// attached. The child's exit code is returned untouched.
    pub fn run_target(&self, venv: &VirtualEnv, script: &Path, args: &[OsString]) -> Result<i32> {
        let _span = step_span("run_target").entered();
        let script = self.script_path(script);

        let config = ProcessConfig::new(venv.python_executable())
            .with_args([script.into_os_string()])
            .with_additional_args(args.iter().cloned())
            .with_working_dir(self.config.working_dir.clone())
            .with_environment(venv.activation_environment())
            .interactive();

        tracing::debug!(command = %config.display_command(), "Running target script");
        let result = self.runner.run(config)?;
        let code = result.exit_code().unwrap_or(exit_codes::GENERAL_ERROR);

        if code != exit_codes::SUCCESS {
            tracing::debug!(exit_code = code, "Target script exited with failure");
        }
        Ok(code)
    }

    fn installer(&self, venv: &VirtualEnv) -> PipInstaller<'_, R> {
        PipInstaller::new(&self.runner, venv).with_working_dir(self.config.working_dir.clone())
    }

    fn script_path(&self, script: &Path) -> PathBuf {
        if script.is_absolute() {
            script.to_path_buf()
        } else {
            self.config.working_dir.join(script)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessResult;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Answers every call with success and records the command lines
    struct RecordingRunner {
        calls: RefCell<Vec<String>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, config: ProcessConfig) -> Result<ProcessResult> {
            self.calls.borrow_mut().push(config.display_command());
            Ok(ProcessResult::from_exit_code(0, "", ""))
        }
    }

    fn bootstrapper(dir: &TempDir) -> Bootstrapper<RecordingRunner> {
        Bootstrapper::with_runner(
            BootstrapConfig::new(dir.path()),
            RecordingRunner {
                calls: RefCell::new(Vec::new()),
            },
        )
    }

    #[test]
    fn test_tooling_upgrades_pip_then_setuptools() {
        let dir = TempDir::new().unwrap();
        let boot = bootstrapper(&dir);
        boot.ensure_tooling(&boot.environment()).unwrap();

        let calls = boot.runner().calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].ends_with("install --upgrade pip"));
        assert!(calls[1].ends_with("install --upgrade setuptools"));
    }

    #[test]
    fn test_tooling_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let boot = Bootstrapper::with_runner(
            BootstrapConfig::new(dir.path()).with_upgrade_tooling(false),
            RecordingRunner {
                calls: RefCell::new(Vec::new()),
            },
        );
        boot.ensure_tooling(&boot.environment()).unwrap();
        assert!(boot.runner().calls.borrow().is_empty());
    }

    #[test]
    fn test_support_library_present_is_single_probe() {
        let dir = TempDir::new().unwrap();
        let boot = bootstrapper(&dir);
        boot.ensure_support_library(&boot.environment()).unwrap();

        let calls = boot.runner().calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("import stdlib_list"));
    }

    #[test]
    fn test_empty_dependency_set_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let boot = bootstrapper(&dir);
        let report = boot
            .install_dependencies(&BTreeSet::new(), &boot.environment())
            .unwrap();
        assert_eq!(report, InstallReport::default());
        assert!(boot.runner().calls.borrow().is_empty());
    }

    #[test]
    fn test_relative_script_is_anchored_at_working_dir() {
        let dir = TempDir::new().unwrap();
        let boot = bootstrapper(&dir);
        assert_eq!(
            boot.script_path(Path::new("app.py")),
            dir.path().join("app.py")
        );
    }
}
