use std::{
    process::Stdio,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use tracerun_core::{Connection, EngineError, TaskOutput, util::snippet};
use tracerun_model::TaskSpec;

use super::{args, config::ContainerEngineConfig};
use crate::{
    capture::pump,
    error::ExecError,
    util::{cmd_program, exit_code, kill_graceful},
};

/// One logical session with the container CLI.
pub struct CliConnection {
    id: String,
    alive: AtomicBool,
    cfg: Arc<ContainerEngineConfig>,
}

impl CliConnection {
    pub(crate) fn new(cfg: Arc<ContainerEngineConfig>) -> Self {
        Self {
            id: format!("tracerun-{}", Uuid::new_v4().simple()),
            alive: AtomicBool::new(true),
            cfg,
        }
    }

    /// Run a short CLI subcommand and return its stdout.
    async fn invoke(&self, argv: &[String]) -> Result<String, ExecError> {
        let mut cmd = cmd_program(&self.cfg.program, &self.cfg.global_args, argv);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.cfg.release_timeout(), cmd.output())
            .await
            .map_err(|_| ExecError::Timeout {
                what: "cleanup",
                timeout_ms: self.cfg.release_timeout_ms,
            })?
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.cfg.program)))?;

        if !output.status.success() {
            return Err(ExecError::NonZeroExit {
                code: exit_code(&output.status),
                stderr: snippet(
                    &String::from_utf8_lossy(&output.stderr),
                    self.cfg.stderr_snippet_chars,
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Connection for CliConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute(
        &self,
        task: &TaskSpec,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::Released);
        }
        task.validate()?;

        let argv = args::run_args(&self.cfg, &self.id, task);
        trace!(target: "tracerun.exec.container", program = %self.cfg.program, args = ?argv, "spawn");

        let mut cmd = cmd_program(&self.cfg.program, &self.cfg.global_args, &argv);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Io(format!("spawn {}: {e}", self.cfg.program)))?;

        let (log, max) = (self.cfg.log_output, self.cfg.max_capture_bytes);
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump(out, "stdout", log, max)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump(err, "stderr", log, max)));

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|e| EngineError::Io(format!("wait: {e}")))?;
                let stdout = match stdout {
                    Some(h) => h.await.unwrap_or_default(),
                    None => String::new(),
                };
                let stderr = match stderr {
                    Some(h) => h.await.unwrap_or_default(),
                    None => String::new(),
                };

                let code = exit_code(&status);
                if !status.success() {
                    debug!(target: "tracerun.exec.container", code, "task failed");
                    return Err(EngineError::Execution {
                        exit_code: code,
                        stderr: snippet(&stderr, self.cfg.stderr_snippet_chars),
                    });
                }

                debug!(target: "tracerun.exec.container", "exit success");
                Ok(TaskOutput { exit_code: code, stdout, stderr })
            }
            _ = cancel.cancelled() => {
                debug!(target: "tracerun.exec.container", "cancelled; stopping client");
                if let Err(e) = kill_graceful(&mut child, self.cfg.kill_grace()).await {
                    warn!(target: "tracerun.exec.container", error = %e, "failed to stop container client");
                }
                // Orphaned grandchildren may hold the pipes open.
                for handle in [stdout, stderr].into_iter().flatten() {
                    handle.abort();
                }
                Err(EngineError::Cancelled)
            }
        }
    }

    async fn release(&self) -> Result<(), EngineError> {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let listed = self
            .invoke(&args::list_args(&self.id))
            .await
            .map_err(|e| EngineError::Io(format!("list containers: {e}")))?;
        let ids: Vec<&str> = listed.split_whitespace().collect();
        if ids.is_empty() {
            debug!(target: "tracerun.exec.container", connection = %self.id, "released");
            return Ok(());
        }

        warn!(
            target: "tracerun.exec.container",
            connection = %self.id,
            count = ids.len(),
            "removing leftover containers"
        );
        self.invoke(&args::remove_args(ids))
            .await
            .map_err(|e| EngineError::Io(format!("remove containers: {e}")))?;
        Ok(())
    }
}
