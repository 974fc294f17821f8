use tokio_util::sync::CancellationToken;
use tracerun_model::{TaskEnv, TaskSpec};
use tracing::trace;

use crate::{
    engine::{ConnectionGuard, TaskOutput},
    error::EngineError,
};

/// Immutable task declaration bound to a connection.
///
/// Every `with_*` call returns a new builder and leaves `self` untouched, so a
/// base declaration can be branched into several tasks.
#[derive(Clone)]
pub struct TaskBuilder<'a> {
    guard: &'a ConnectionGuard,
    spec: TaskSpec,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(guard: &'a ConnectionGuard, base_ref: String) -> Self {
        Self {
            guard,
            spec: TaskSpec::new(base_ref),
        }
    }

    /// Replace the command (program followed by its arguments).
    pub fn with_command<I, S>(&self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = self.spec.clone();
        spec.command = argv.into_iter().map(Into::into).collect();
        Self {
            guard: self.guard,
            spec,
        }
    }

    /// Merge environment variables over the ones already declared.
    pub fn with_env(&self, env: &TaskEnv) -> Self {
        let mut spec = self.spec.clone();
        for kv in env.iter() {
            spec.env.push(kv.key(), kv.value());
        }
        Self {
            guard: self.guard,
            spec,
        }
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Submit the task and wait for its terminal state.
    ///
    /// Returns [`EngineError::Cancelled`] as soon as `cancel` fires, whether or
    /// not the engine itself reacts to the token.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<TaskOutput, EngineError> {
        self.spec.validate()?;
        let conn = self.guard.connection()?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        trace!(target: "tracerun.core.engine", conn = conn.id(), base = %self.spec.base_ref, command = ?self.spec.command, "submit");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            res = conn.execute(&self.spec, cancel) => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use std::time::Duration;

    #[tokio::test]
    async fn with_command_does_not_mutate_base() {
        let engine = FakeEngine::succeeding("");
        let guard = ConnectionGuard::connect(&engine, &CancellationToken::new())
            .await
            .unwrap();

        let base = guard.new_task("alpine:latest");
        let echo = base.with_command(["echo", "hi"]);
        let env = echo.with_env(&TaskEnv::new().with("A", "1"));

        assert!(base.spec().command.is_empty());
        assert_eq!(echo.spec().command, vec!["echo", "hi"]);
        assert!(echo.spec().env.is_empty());
        assert_eq!(env.spec().env.get("A"), Some("1"));
        assert_eq!(env.spec().base_ref, "alpine:latest");

        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn run_executes_on_connection() {
        let engine = FakeEngine::succeeding("hello\n");
        let guard = ConnectionGuard::connect(&engine, &CancellationToken::new())
            .await
            .unwrap();

        let out = guard
            .new_task("alpine:latest")
            .with_command(["echo", "hello"])
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(engine.submitted()[0].command, vec!["echo", "hello"]);

        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected_before_submit() {
        let engine = FakeEngine::succeeding("");
        let guard = ConnectionGuard::connect(&engine, &CancellationToken::new())
            .await
            .unwrap();

        let err = guard
            .new_task(" ")
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTask(_)));
        assert!(engine.submitted().is_empty());

        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn run_returns_promptly_on_cancel() {
        let engine = FakeEngine::hanging();
        let guard = ConnectionGuard::connect(&engine, &CancellationToken::new())
            .await
            .unwrap();
        let task = guard.new_task("alpine:latest").with_command(["sleep", "infinity"]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let res = tokio::time::timeout(Duration::from_secs(2), task.run(&cancel)).await;
        assert_eq!(res.expect("run must not block"), Err(EngineError::Cancelled));

        guard.release().await.unwrap();
    }
}
