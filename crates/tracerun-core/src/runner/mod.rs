use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use opentelemetry::{
    KeyValue,
    trace::{Span as _, Status},
};
use tokio_util::sync::CancellationToken;
use tracerun_model::{RunConfig, TaskStatus};
use tracerun_observe::{Span, SpanContext, Telemetry};
use tracing::{debug, info, instrument, warn};

use crate::{
    engine::{ConnectionGuard, Engine, TaskOutput},
    error::{EngineError, TaskRunError},
};

/// Successful end of a run.
#[derive(Debug, Clone)]
pub struct ExitOutcome {
    pub status: TaskStatus,
    pub exit_code: i32,
    pub stdout: String,
    pub duration: Duration,
    /// Context of the root span, for correlating with exported traces.
    pub trace: SpanContext,
}

/// Runs one task on an engine inside a root span and a task span.
///
/// The runner never decides whether a failure is fatal: every outcome is
/// returned to the caller.
pub struct TaskRunner {
    engine: Arc<dyn Engine>,
    telemetry: Arc<dyn Telemetry>,
}

impl TaskRunner {
    pub fn new(engine: Arc<dyn Engine>, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { engine, telemetry }
    }

    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    /// Open a root span, connect, run the configured task under a child span,
    /// then release the connection and close the root span.
    ///
    /// Ordering on every path: task span ends before the release, release
    /// happens before the root span ends. A failed connect never reaches
    /// `run` or `release`.
    #[instrument(level = "debug", target = "tracerun.core.runner", skip_all, fields(engine = self.engine.name(), base = %cfg.base_ref))]
    pub async fn run(
        &self,
        cfg: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome, TaskRunError> {
        cfg.validate()?;
        let started = Instant::now();

        let mut root = self.telemetry.start_span(None, &cfg.span_name);
        let root_ctx = root.span_context().clone();
        root.set_attribute(KeyValue::new("engine", self.engine.name()));

        let guard = match ConnectionGuard::connect(self.engine.as_ref(), cancel).await {
            Ok(guard) => guard,
            Err(e) => {
                let err = TaskRunError::from_connect(e);
                warn!(target: "tracerun.core.runner", error = %err, "connect failed");
                root.set_status(Status::error(err.to_string()));
                root.end();
                return Err(err);
            }
        };
        root.set_attribute(KeyValue::new("engine.connection", guard.id().to_string()));

        let result = self.run_task(&guard, cfg, &root_ctx, cancel).await;

        match &result {
            Ok(_) => {
                root.add_event(cfg.completion_event.clone(), Vec::new());
                root.set_status(Status::Ok);
            }
            Err(e) => root.set_status(Status::error(e.to_string())),
        }

        let conn_id = guard.id().to_string();
        if let Err(e) = guard.release().await {
            // The task already reached its terminal state; a failed cleanup does not change it.
            warn!(target: "tracerun.core.runner", conn = %conn_id, error = %e, "release failed");
            root.add_event("connection release failed", Vec::new());
        }
        root.end();

        let output = result?;
        let duration = started.elapsed();
        info!(
            target: "tracerun.core.runner",
            duration_ms = duration.as_millis() as u64,
            trace_id = %root_ctx.trace_id(),
            "task succeeded"
        );
        Ok(ExitOutcome {
            status: TaskStatus::Succeeded,
            exit_code: output.exit_code,
            stdout: output.stdout,
            duration,
            trace: root_ctx,
        })
    }

    async fn run_task(
        &self,
        guard: &ConnectionGuard,
        cfg: &RunConfig,
        parent: &SpanContext,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, TaskRunError> {
        let mut span = self.telemetry.start_span(Some(parent), &cfg.task_span_name);
        span.set_attributes([
            KeyValue::new("step", cfg.step_label.clone()),
            KeyValue::new("task.base_ref", cfg.base_ref.clone()),
            KeyValue::new("task.command", cfg.command.join(" ")),
        ]);

        let task = guard
            .new_task(cfg.base_ref.as_str())
            .with_command(cfg.command.iter().cloned())
            .with_env(&cfg.env);

        let mut status = TaskStatus::Declared;
        advance(&mut status, TaskStatus::Submitted, &mut span);
        let result = task.run(cancel).await;

        let terminal = match &result {
            Ok(_) => TaskStatus::Succeeded,
            Err(EngineError::Cancelled) => TaskStatus::Cancelled,
            Err(_) => TaskStatus::Failed,
        };
        advance(&mut status, terminal, &mut span);

        match &result {
            Ok(out) => {
                span.set_attribute(KeyValue::new("task.exit_code", i64::from(out.exit_code)));
                span.set_status(Status::Ok);
            }
            Err(e) => {
                if let EngineError::Execution { exit_code, .. } = e {
                    span.set_attribute(KeyValue::new("task.exit_code", i64::from(*exit_code)));
                }
                span.set_status(Status::error(e.to_string()));
            }
        }
        span.end();

        result.map_err(TaskRunError::from_run)
    }
}

fn advance(status: &mut TaskStatus, next: TaskStatus, span: &mut Span) {
    if !status.can_transition_to(next) {
        warn!(target: "tracerun.core.runner", from = status.as_str(), to = next.as_str(), "unexpected task transition");
    }
    debug!(target: "tracerun.core.runner", from = status.as_str(), to = next.as_str(), "task transition");
    *status = next;
    span.set_attribute(KeyValue::new("task.status", next.as_str()));
}
