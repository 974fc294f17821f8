//! [`Engine`] backed by a `docker`-compatible command line client.
//!
//! Each connection tags the containers it starts with a label carrying its id,
//! so that [`Connection::release`] can remove whatever is left behind after a
//! failed or cancelled run.

mod args;
mod config;
mod connection;

pub use args::CONNECTION_LABEL;
pub use config::{ContainerEngineConfig, PullPolicy};
pub use connection::CliConnection;

use std::{process::Stdio, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tracerun_core::{Connection, Engine, EngineError, util::snippet};

use crate::{error::ExecError, util::cmd_program};

pub struct ContainerEngine {
    cfg: Arc<ContainerEngineConfig>,
}

impl ContainerEngine {
    pub fn new(cfg: ContainerEngineConfig) -> Result<Self, ExecError> {
        cfg.validate()?;
        Ok(Self { cfg: Arc::new(cfg) })
    }

    pub fn config(&self) -> &ContainerEngineConfig {
        &self.cfg
    }

    /// Ask the daemon for its version; an error means it cannot run tasks.
    async fn cli_version(&self) -> Result<String, ExecError> {
        let mut cmd = cmd_program(&self.cfg.program, &self.cfg.global_args, &args::version_args());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let timeout = self.cfg.connect_timeout();
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| ExecError::Timeout {
                what: "version check",
                timeout_ms: self.cfg.connect_timeout_ms,
            })?
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.cfg.program)))?;

        if !output.status.success() {
            return Err(ExecError::NonZeroExit {
                code: crate::util::exit_code(&output.status),
                stderr: snippet(
                    &String::from_utf8_lossy(&output.stderr),
                    self.cfg.stderr_snippet_chars,
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Engine for ContainerEngine {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<Box<dyn Connection>, EngineError> {
        debug!(target: "tracerun.exec.container", program = %self.cfg.program, "probing engine");
        let version = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            res = self.cli_version() => res.map_err(|e| EngineError::Connection(e.to_string()))?,
        };

        let conn = CliConnection::new(self.cfg.clone());
        info!(
            target: "tracerun.exec.container",
            program = %self.cfg.program,
            server_version = %version,
            connection = %conn.id(),
            "engine connected"
        );
        Ok(Box::new(conn))
    }
}
