// Runs the installer, interpreter queries and the target script: captures
// output, applies environment changes and translates exit statuses

use crate::error::{ProcessError, Result};
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// Process execution configuration
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub command: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub environment: HashMap<String, OsString>,
    /// Variables removed from the inherited environment
    pub removed_env: BTreeSet<String>,
    pub capture_output: bool,
    pub inherit_stdin: bool,
    pub inherit_env: bool,
}

impl ProcessConfig {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            environment: HashMap::new(),
            removed_env: BTreeSet::new(),
            capture_output: true,
            inherit_stdin: false,
            inherit_env: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_additional_args<I, S>(mut self, additional_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(additional_args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Apply the variables set and removed by `env`
    pub fn with_environment(mut self, env: ProcessEnvironment) -> Self {
        self.environment = env.vars;
        self.removed_env = env.removed;
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Hand the terminal to the child: stdin, stdout and stderr are inherited.
    pub fn interactive(mut self) -> Self {
        self.capture_output = false;
        self.inherit_stdin = true;
        self
    }

    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Render the command line for log and error messages
    pub fn display_command(&self) -> String {
        let mut rendered = self.command.display().to_string();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }

    /// Whether the first argument equals `arg`
    pub fn first_arg_is(&self, arg: &str) -> bool {
        self.args.first().is_some_and(|first| first == arg)
    }
}

/// Process execution result
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Exit code; children killed by a signal report `128 + signal` on Unix
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessResult {
    /// Build a result from a raw exit code and captured output
    pub fn from_exit_code(
        code: i32,
        stdout: impl Into<Vec<u8>>,
        stderr: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Translate an exit status into a shell-style exit code
pub fn exit_code_of(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        status.signal().map(|signal| 128 + signal)
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Seam between the bootstrapper and the operating system. Every external
/// invocation goes through `run`, blocking until the child has exited.
pub trait CommandRunner {
    fn run(&self, config: ProcessConfig) -> Result<ProcessResult>;
}

/// Runs child processes on a current-thread tokio runtime
#[derive(Debug, Default)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    // Synchronous execution
    pub fn execute(&self, config: ProcessConfig) -> Result<ProcessResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProcessError::RuntimeUnavailable {
                error: e.to_string(),
            })?;
        runtime.block_on(self.execute_async(config))
    }

    pub async fn execute_async(&self, config: ProcessConfig) -> Result<ProcessResult> {
        use std::process::Stdio;
        use tokio::process::Command;

        let start_time = std::time::Instant::now();
        let command_line = config.display_command();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        if !config.inherit_env {
            cmd.env_clear();
        }
        for key in &config.removed_env {
            cmd.env_remove(key);
        }
        for (key, value) in &config.environment {
            cmd.env(key, value);
        }

        if config.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }
        if config.inherit_stdin {
            cmd.stdin(Stdio::inherit());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.kill_on_drop(true);

        tracing::debug!(command = %command_line, "Spawning process");

        let child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            command: command_line.clone(),
            error: e.to_string(),
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProcessError::WaitFailed {
                command: command_line.clone(),
                error: e.to_string(),
            })?;

        let result = ProcessResult {
            exit_code: exit_code_of(&output.status),
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start_time.elapsed(),
        };

        tracing::debug!(
            command = %command_line,
            exit_code = ?result.exit_code,
            duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            "Process finished"
        );

        Ok(result)
    }
}

impl CommandRunner for ProcessManager {
    fn run(&self, config: ProcessConfig) -> Result<ProcessResult> {
        self.execute(config)
    }
}

/// Changes applied to a child's inherited environment. Values are kept as
/// `OsString` so non-UTF-8 values (including `PATH`) pass through intact.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    vars: HashMap<String, OsString>,
    removed: BTreeSet<String>,
}

impl ProcessEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_var(&mut self, key: &str, value: impl Into<OsString>) -> &mut Self {
        self.removed.remove(key);
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn remove_var(&mut self, key: &str) -> &mut Self {
        self.vars.remove(key);
        self.removed.insert(key.to_string());
        self
    }

    /// Prepend `path` to `PATH`. The base is the `PATH` already set here, or
    /// the current process's own.
    pub fn add_to_path(&mut self, path: PathBuf) -> &mut Self {
        let current = self
            .vars
            .get("PATH")
            .cloned()
            .or_else(|| std::env::var_os("PATH"));

        let mut entries = vec![path];
        if let Some(ref current) = current {
            entries.extend(std::env::split_paths(current));
        }

        match std::env::join_paths(entries) {
            Ok(joined) => {
                self.set_var("PATH", joined);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot extend PATH; leaving it unchanged");
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&OsString> {
        self.vars.get(key)
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.removed.contains(key)
    }
}
