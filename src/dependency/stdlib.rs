// Standard-library enumeration through the `stdlib_list` helper library

use std::collections::HashSet;

use crate::environment::VirtualEnv;
use crate::error::{EnvironmentError, Result};
use crate::logging::utils::log_captured_output;
use crate::process::{CommandRunner, ProcessConfig};

/// Import name of the helper library
pub const SUPPORT_LIBRARY_MODULE: &str = "stdlib_list";
/// Installable name of the helper library
pub const SUPPORT_LIBRARY_PACKAGE: &str = "stdlib-list";

/// Python snippet that succeeds only if the helper library imports
pub fn probe_snippet() -> String {
    format!("import {SUPPORT_LIBRARY_MODULE}; print(\"{SUPPORT_LIBRARY_MODULE} imported successfully\")")
}

/// Python snippet printing the module list for `version` (`"<major>.<minor>"`)
pub fn enumeration_snippet(version: &str) -> String {
    format!(
        "import {SUPPORT_LIBRARY_MODULE}; print({SUPPORT_LIBRARY_MODULE}.stdlib_list(\"{version}\"))"
    )
}

/// Module names bundled with one interpreter version
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StdlibModules {
    names: HashSet<String>,
}

impl StdlibModules {
    /// Parse the printed repr of a Python list of strings, e.g. `['os', 'os.path']`
    pub fn parse(text: &str) -> Self {
        let body = text.trim().trim_start_matches('[').trim_end_matches(']');
        let names = body
            .split(',')
            .map(|entry| {
                entry
                    .chars()
                    .filter(|c| !matches!(c, '\'' | '"') && !c.is_whitespace())
                    .collect::<String>()
            })
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.names.contains(module)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for StdlibModules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ask the helper library inside `venv` for the standard-library set of `version`
pub fn enumerate<R: CommandRunner>(
    runner: &R,
    venv: &VirtualEnv,
    version: &str,
) -> Result<StdlibModules> {
    let config = ProcessConfig::new(venv.python_executable())
        .with_args(["-c".to_string(), enumeration_snippet(version)]);
    let command = config.display_command();
    let result = runner.run(config)?;

    if !result.success() {
        tracing::error!(version = %version, "stdlib_list command failed");
        for line in result.stdout().lines().chain(result.stderr().lines()) {
            tracing::error!("{line}");
        }
        return Err(EnvironmentError::StdlibEnumerationFailed {
            version: version.to_string(),
            stdout: result.stdout(),
            stderr: result.stderr(),
        }
        .into());
    }

    let modules = StdlibModules::parse(&result.stdout());
    tracing::debug!(
        command = %command,
        version = %version,
        count = modules.len(),
        "Enumerated standard library modules"
    );
    Ok(modules)
}

/// Run the import probe with the environment's own interpreter
pub fn probe<R: CommandRunner>(runner: &R, venv: &VirtualEnv) -> Result<ProbeOutcome> {
    let config =
        ProcessConfig::new(venv.python_executable()).with_args(["-c".to_string(), probe_snippet()]);
    let command = config.display_command();
    let result = runner.run(config)?;
    log_captured_output(&command, &result.stdout(), &result.stderr());

    Ok(ProbeOutcome {
        importable: result.success(),
        stdout: result.stdout(),
        stderr: result.stderr(),
    })
}

/// Result of running the import probe
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub importable: bool,
    pub stdout: String,
    pub stderr: String,
}
