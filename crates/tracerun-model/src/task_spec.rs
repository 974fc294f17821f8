use serde::{Deserialize, Serialize};

use crate::{BaseRef, ModelError, TaskEnv};

/// One declared (environment, command) pair.
///
/// A spec is consumed once by the engine and never mutated after submission.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Base environment reference (e.g. `"alpine:latest"`, `"docker.io/library/redis:7"`).
    pub base_ref: BaseRef,
    /// Program followed by its arguments, in order.
    ///
    /// Empty means "use the image's default entrypoint".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Environment variables for the task.
    #[serde(default, skip_serializing_if = "TaskEnv::is_empty")]
    pub env: TaskEnv,
}

impl TaskSpec {
    pub fn new(base_ref: impl Into<BaseRef>) -> Self {
        Self {
            base_ref: base_ref.into(),
            command: Vec::new(),
            env: TaskEnv::new(),
        }
    }

    /// Program name, if a command was declared.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.base_ref.trim().is_empty() {
            return Err(ModelError::EmptyBaseRef);
        }
        if let Some(program) = self.program()
            && program.trim().is_empty()
        {
            return Err(ModelError::BlankProgram);
        }
        self.env.validate()
    }
}
