use serde::{Deserialize, Serialize};

use crate::{BaseRef, ModelError, TaskEnv, TaskSpec};

/// Input of a single instrumented run.
///
/// `Default` reproduces the stock demo: `echo "Hello from Dagger!"` on `alpine:latest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    /// Base environment reference.
    pub base_ref: BaseRef,
    /// Command to execute inside the base environment.
    pub command: Vec<String>,
    /// Environment variables for the task.
    pub env: TaskEnv,
    /// Name of the root span of the session.
    pub span_name: String,
    /// Name of the child span wrapping the task.
    pub task_span_name: String,
    /// Human-readable label stored in the child span's `step` attribute.
    pub step_label: String,
    /// Event recorded on the root span after a successful run.
    pub completion_event: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_ref: "alpine:latest".to_string(),
            command: vec!["echo".to_string(), "Hello from Dagger!".to_string()],
            env: TaskEnv::new(),
            span_name: "main-process".to_string(),
            task_span_name: "dagger-pipeline".to_string(),
            step_label: "Alpine Container build with Dagger!".to_string(),
            completion_event: "Execution completed successfully!".to_string(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.span_name.trim().is_empty() || self.task_span_name.trim().is_empty() {
            return Err(ModelError::EmptySpanName);
        }
        if self.command.is_empty() {
            return Err(ModelError::EmptyCommand);
        }
        self.task_spec().validate()
    }

    /// Task declared by this configuration.
    pub fn task_spec(&self) -> TaskSpec {
        TaskSpec {
            base_ref: self.base_ref.clone(),
            command: self.command.clone(),
            env: self.env.clone(),
        }
    }
}
