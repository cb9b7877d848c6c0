// Configuration handling for venv-wrapper
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result, WrapperError};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = ".venv-wrapper.yaml";
pub const DEFAULT_VENV_DIR: &str = ".venv";
pub const DEFAULT_REQUIREMENTS_FILE: &str = "requirements.txt";
pub const DEFAULT_PYTHON: &str = "python3";

/// On-disk configuration. Every field is optional; unset fields fall back to
/// the defaults above.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub venv_dir: Option<PathBuf>,
    pub requirements_file: Option<PathBuf>,
    pub python: Option<String>,
    pub upgrade_tooling: Option<bool>,
    #[serde(default)]
    pub package_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub ignore_modules: Vec<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WrapperError::Config(Box::new(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(format!(
                    "Create {} or drop the --config flag to use defaults",
                    path.display()
                )),
            })));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_with_context(&content, Some(path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_context(yaml, None)
    }

    fn from_yaml_with_context(yaml: &str, file_path: Option<&Path>) -> Result<Self> {
        // An empty file deserializes to unit, not to a mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            let mut config_error = *Box::<ConfigError>::from(e);
            if let ConfigError::InvalidYaml {
                file_path: ref mut path,
                ..
            } = config_error
            {
                *path = file_path.map(Path::to_path_buf);
            }
            WrapperError::Config(Box::new(config_error))
        })?;

        config.validate(file_path)?;
        Ok(config)
    }

    /// Load `--config` if given, else the default file if it exists, else defaults
    pub fn discover(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let path = absolutize(working_dir, path);
            tracing::debug!(path = %path.display(), "Loading configuration");
            return Self::from_file(&path);
        }

        let candidate = working_dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "Loading configuration");
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self, file_path: Option<&Path>) -> Result<()> {
        let invalid = |field: &str, value: &str, message: &str| {
            WrapperError::Config(Box::new(ConfigError::InvalidValue {
                message: message.to_string(),
                field: field.to_string(),
                value: value.to_string(),
                file_path: file_path.map(Path::to_path_buf),
            }))
        };

        if let Some(ref dir) = self.venv_dir {
            if dir.as_os_str().is_empty() {
                return Err(invalid("venv_dir", "", "must not be empty"));
            }
        }
        if let Some(ref file) = self.requirements_file {
            if file.as_os_str().is_empty() {
                return Err(invalid("requirements_file", "", "must not be empty"));
            }
        }
        if let Some(ref python) = self.python {
            if python.trim().is_empty() {
                return Err(invalid("python", python, "must name an interpreter"));
            }
        }
        for (module, package) in &self.package_aliases {
            if module.trim().is_empty() || package.trim().is_empty() {
                return Err(invalid(
                    "package_aliases",
                    &format!("{module}: {package}"),
                    "alias keys and values must not be empty",
                ));
            }
        }
        if let Some(module) = self.ignore_modules.iter().find(|m| m.trim().is_empty()) {
            return Err(invalid("ignore_modules", module, "entries must not be empty"));
        }

        Ok(())
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub venv_dir: Option<PathBuf>,
    pub requirements_file: Option<PathBuf>,
    pub python: Option<String>,
    pub no_upgrade: bool,
}

/// Fully resolved settings for one bootstrap run
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub working_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub requirements_file: PathBuf,
    pub python: String,
    pub upgrade_tooling: bool,
    pub package_aliases: BTreeMap<String, String>,
    pub ignore_modules: Vec<String>,
}

impl BootstrapConfig {
    /// Defaults rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::resolve(working_dir, Config::default(), Overrides::default())
    }

    /// Merge file values and CLI overrides; relative paths are anchored at `working_dir`
    pub fn resolve(working_dir: impl Into<PathBuf>, file: Config, overrides: Overrides) -> Self {
        let working_dir = working_dir.into();

        let venv_dir = overrides
            .venv_dir
            .or(file.venv_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_VENV_DIR));
        let requirements_file = overrides
            .requirements_file
            .or(file.requirements_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REQUIREMENTS_FILE));
        let python = overrides
            .python
            .or(file.python)
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string());
        let upgrade_tooling = !overrides.no_upgrade && file.upgrade_tooling.unwrap_or(true);

        Self {
            venv_dir: absolutize(&working_dir, &venv_dir),
            requirements_file: absolutize(&working_dir, &requirements_file),
            working_dir,
            python,
            upgrade_tooling,
            package_aliases: file.package_aliases,
            ignore_modules: file.ignore_modules,
        }
    }

    pub fn with_venv_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.venv_dir = absolutize(&self.working_dir, dir.as_ref());
        self
    }

    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    pub fn with_upgrade_tooling(mut self, upgrade: bool) -> Self {
        self.upgrade_tooling = upgrade;
        self
    }

    pub fn with_alias(mut self, module: impl Into<String>, package: impl Into<String>) -> Self {
        self.package_aliases.insert(module.into(), package.into());
        self
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
