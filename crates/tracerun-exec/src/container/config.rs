use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// When the container CLI should pull the base image before running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    Always,
    Missing,
    Never,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullPolicy::Always => "always",
            PullPolicy::Missing => "missing",
            PullPolicy::Never => "never",
        }
    }
}

impl FromStr for PullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(PullPolicy::Always),
            "missing" => Ok(PullPolicy::Missing),
            "never" => Ok(PullPolicy::Never),
            other => Err(format!("unknown pull policy: {other}")),
        }
    }
}

/// Settings for driving a `docker`-compatible CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerEngineConfig {
    /// CLI binary, resolved through `PATH` (`docker`, `podman`, ...).
    pub program: String,
    /// Arguments placed before every subcommand, e.g. `["--host", "tcp://..."]`.
    pub global_args: Vec<String>,
    /// `--pull` value for `run`; omitted when `None`.
    pub pull: Option<PullPolicy>,
    pub connect_timeout_ms: u64,
    pub release_timeout_ms: u64,
    /// Grace period between SIGTERM and SIGKILL on cancel.
    pub kill_grace_ms: u64,
    /// Tail of each output stream kept in memory.
    pub max_capture_bytes: usize,
    /// Characters of stderr carried by an execution error.
    pub stderr_snippet_chars: usize,
    /// Forward container output lines to the log.
    pub log_output: bool,
}

impl Default for ContainerEngineConfig {
    fn default() -> Self {
        Self {
            program: "docker".into(),
            global_args: Vec::new(),
            pull: None,
            connect_timeout_ms: 10_000,
            release_timeout_ms: 10_000,
            kill_grace_ms: 2_000,
            max_capture_bytes: 64 * 1024,
            stderr_snippet_chars: 512,
            log_output: true,
        }
    }
}

impl ContainerEngineConfig {
    pub fn docker() -> Self {
        Self::default()
    }

    pub fn podman() -> Self {
        Self {
            program: "podman".into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ExecError> {
        if self.program.trim().is_empty() {
            return Err(ExecError::MissingProgram);
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
