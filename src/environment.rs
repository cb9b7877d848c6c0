// Isolated Python environment (venv) handling: layout, creation and
// interpreter version discovery

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EnvironmentError, Result};
use crate::logging::utils::log_captured_output;
use crate::process::{CommandRunner, ProcessConfig, ProcessEnvironment};

/// Prints `major.minor.micro` of the running interpreter
const VERSION_PROBE: &str = "import sys; print('.'.join(map(str, sys.version_info[:3])))";

/// A venv rooted at a fixed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// Directory holding the environment's executables
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    pub fn python_executable(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("python.exe")
        } else {
            self.bin_dir().join("python")
        }
    }

    pub fn pip_executable(&self) -> PathBuf {
        if cfg!(windows) {
            self.bin_dir().join("pip.exe")
        } else {
            self.bin_dir().join("pip")
        }
    }

    /// Changes to the inherited environment that make a child behave as if
    /// the venv were activated
    pub fn activation_environment(&self) -> ProcessEnvironment {
        let mut env = ProcessEnvironment::new();
        env.set_var("VIRTUAL_ENV", self.root.as_os_str())
            .remove_var("PYTHONHOME")
            .set_var("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            .add_to_path(self.bin_dir());
        env
    }

    /// Query the environment's interpreter for its version
    pub fn python_version<R: CommandRunner>(&self, runner: &R) -> Result<PythonVersion> {
        let config = ProcessConfig::new(self.python_executable()).with_args(["-c", VERSION_PROBE]);
        let command = config.display_command();
        let result = runner.run(config)?;
        log_captured_output(&command, &result.stdout(), &result.stderr());

        if !result.success() {
            return Err(EnvironmentError::VersionQueryFailed {
                message: format!("{command} exited with {:?}", result.exit_code()),
                stderr: result.stderr(),
            }
            .into());
        }

        PythonVersion::parse(&result.stdout())
    }
}

/// Create the environment at `venv` unless something already exists there.
/// Returns `true` when a new environment was created.
pub fn create_environment<R: CommandRunner>(
    runner: &R,
    venv: &VirtualEnv,
    python: &str,
) -> Result<bool> {
    if venv.exists() {
        tracing::info!(
            path = %venv.root().display(),
            "Virtual environment already exists"
        );
        if !venv.python_executable().exists() {
            tracing::warn!(
                path = %venv.python_executable().display(),
                "Environment directory has no interpreter; later steps may fail"
            );
        }
        return Ok(false);
    }

    let base_python = resolve_base_python(python)?;
    tracing::info!(
        path = %venv.root().display(),
        python = %base_python.display(),
        "Creating virtual environment"
    );

    let config = ProcessConfig::new(&base_python).with_args([
        "-m".into(),
        "venv".into(),
        venv.root().as_os_str().to_os_string(),
    ]);
    let command = config.display_command();
    let result = runner.run(config)?;
    log_captured_output(&command, &result.stdout(), &result.stderr());

    if !result.success() {
        return Err(EnvironmentError::CreationFailed {
            path: venv.root().to_path_buf(),
            command,
            exit_code: result.exit_code(),
            stdout: result.stdout(),
            stderr: result.stderr(),
        }
        .into());
    }

    Ok(true)
}

/// A bare name is looked up on PATH; anything with a separator is used as given
pub fn resolve_base_python(python: &str) -> Result<PathBuf> {
    let candidate = Path::new(python);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }

    which::which(python).map_err(|_| {
        EnvironmentError::InterpreterNotFound {
            name: python.to_string(),
            suggestion: Some(
                "Install Python 3 or pass --python with the interpreter path".to_string(),
            ),
        }
        .into()
    })
}

/// Interpreter version as reported by `sys.version_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonVersion(semver::Version);

impl PythonVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        semver::Version::parse(trimmed).map(Self).map_err(|e| {
            EnvironmentError::VersionQueryFailed {
                message: format!("unexpected version string {trimmed:?}: {e}"),
                stderr: String::new(),
            }
            .into()
        })
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    /// The `"<major>.<minor>"` form the stdlib helper expects
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.0.major, self.0.minor)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
