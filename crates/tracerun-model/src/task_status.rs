use serde::{Deserialize, Serialize};

/// Lifecycle of a single task submitted to an execution engine.
///
/// ```text
/// Declared -> Submitted -> { Succeeded | Failed | Cancelled }
/// ```
/// Terminal states are final, there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Environment and command are declared, nothing was sent yet.
    Declared,
    /// Task was handed to the engine and is executing.
    Submitted,
    /// Command exited with status zero.
    Succeeded,
    /// Command exited non-zero or the environment could not be materialized.
    Failed,
    /// Run was cancelled before the engine reported completion.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            TaskStatus::Declared => {
                matches!(next, TaskStatus::Submitted | TaskStatus::Cancelled)
            }
            TaskStatus::Submitted => next.is_terminal(),
            _ => false,
        }
    }

    /// Short lowercase label for logs and span attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Declared => "declared",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}
