use thiserror::Error;
use tracerun_model::ModelError;

use crate::util::snippet;

/// Longest stderr excerpt included in a diagnostic line.
pub const DIAGNOSTIC_SNIPPET_CHARS: usize = 240;

/// Failure reported by an execution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Connection(String),
    /// Command exited non-zero, or the base environment could not be materialized.
    #[error("exit code {exit_code}: {stderr}")]
    Execution { exit_code: i32, stderr: String },
    #[error("cancelled")]
    Cancelled,
    #[error("connection already released")]
    Released,
    #[error("invalid task: {0}")]
    InvalidTask(#[from] ModelError),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

/// Failure of one instrumented run, tagged by what went wrong.
#[derive(Error, Debug)]
pub enum TaskRunError {
    #[error("connection error: {0}")]
    Connection(#[source] EngineError),
    #[error("execution error: {0}")]
    Execution(#[source] EngineError),
    #[error("cancellation error: {0}")]
    Cancelled(#[source] EngineError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ModelError),
}

impl TaskRunError {
    /// Classify an error raised while connecting.
    pub fn from_connect(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => TaskRunError::Cancelled(e),
            EngineError::InvalidTask(m) => TaskRunError::InvalidConfig(m),
            other => TaskRunError::Connection(other),
        }
    }

    /// Classify an error raised while running the task.
    pub fn from_run(e: EngineError) -> Self {
        match e {
            EngineError::Cancelled => TaskRunError::Cancelled(e),
            EngineError::InvalidTask(m) => TaskRunError::InvalidConfig(m),
            other => TaskRunError::Execution(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskRunError::Connection(_) => "connection",
            TaskRunError::Execution(_) => "execution",
            TaskRunError::Cancelled(_) => "cancellation",
            TaskRunError::InvalidConfig(_) => "config",
        }
    }

    /// Exit code of the task, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskRunError::Execution(EngineError::Execution { exit_code, .. }) => Some(*exit_code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskRunError::Cancelled(_))
    }

    /// One line for operators: error kind, and exit code plus stderr excerpt for execution errors.
    pub fn diagnostic(&self) -> String {
        match self {
            TaskRunError::Execution(EngineError::Execution { exit_code, stderr }) => {
                let excerpt = snippet(stderr, DIAGNOSTIC_SNIPPET_CHARS);
                if excerpt.is_empty() {
                    format!("execution error: exit code {exit_code}")
                } else {
                    format!("execution error: exit code {exit_code}: {excerpt}")
                }
            }
            other => snippet(&other.to_string(), DIAGNOSTIC_SNIPPET_CHARS * 2),
        }
    }
}
