//! Execution engine boundary.
//!
//! An [`Engine`] hands out [`Connection`]s; a connection materializes a base
//! environment and runs one command in it. Callers go through
//! [`ConnectionGuard`] and [`TaskBuilder`], which own the release discipline and
//! the cancellation race so that engine implementations stay small.

mod builder;
mod guard;

pub use builder::TaskBuilder;
pub use guard::ConnectionGuard;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracerun_model::TaskSpec;

use crate::error::EngineError;

/// Result of a task that exited with status zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Short engine name for logs and span attributes.
    fn name(&self) -> &'static str;

    /// Open a live connection. The returned connection must be released exactly once.
    async fn connect(&self, cancel: &CancellationToken) -> Result<Box<dyn Connection>, EngineError>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Identifier of this connection, unique per engine.
    fn id(&self) -> &str;

    fn is_alive(&self) -> bool;

    /// Materialize `task.base_ref`, run `task.command` in it and wait for the exit status.
    ///
    /// A non-zero exit is reported as [`EngineError::Execution`].
    /// Implementations should watch `cancel`; callers additionally race it.
    async fn execute(
        &self,
        task: &TaskSpec,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, EngineError>;

    /// Free engine-side resources. Must be idempotent and safe while a task is still running.
    async fn release(&self) -> Result<(), EngineError>;
}
