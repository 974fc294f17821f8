use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    engine::{Connection, Engine, TaskBuilder},
    error::EngineError,
};

/// Exclusive owner of one engine connection.
///
/// [`ConnectionGuard::release`] consumes the guard, so a connection can only be
/// released once through it. A guard dropped without release (early return,
/// panic unwinding) schedules the release on the current tokio runtime.
pub struct ConnectionGuard {
    conn: Option<Box<dyn Connection>>,
    engine: &'static str,
}

impl ConnectionGuard {
    /// Connect through `engine`, giving up as soon as `cancel` fires.
    pub async fn connect(
        engine: &dyn Engine,
        cancel: &CancellationToken,
    ) -> Result<Self, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            res = engine.connect(cancel) => res?,
        };
        debug!(target: "tracerun.core.engine", engine = engine.name(), conn = conn.id(), "connected");
        Ok(Self {
            conn: Some(conn),
            engine: engine.name(),
        })
    }

    /// Wrap an already opened connection.
    pub fn new(conn: Box<dyn Connection>, engine: &'static str) -> Self {
        Self {
            conn: Some(conn),
            engine,
        }
    }

    pub fn id(&self) -> &str {
        self.conn.as_deref().map_or("released", |c| c.id())
    }

    pub fn engine(&self) -> &'static str {
        self.engine
    }

    pub(crate) fn connection(&self) -> Result<&dyn Connection, EngineError> {
        self.conn.as_deref().ok_or(EngineError::Released)
    }

    /// Declare a task on `base_ref`. No I/O happens until [`TaskBuilder::run`].
    pub fn new_task(&self, base_ref: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, base_ref.into())
    }

    /// Release the connection.
    pub async fn release(mut self) -> Result<(), EngineError> {
        match self.conn.take() {
            Some(conn) => {
                let id = conn.id().to_string();
                let res = conn.release().await;
                debug!(target: "tracerun.core.engine", engine = self.engine, conn = %id, ok = res.is_ok(), "released");
                res
            }
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        warn!(target: "tracerun.core.engine", engine = self.engine, conn = conn.id(), "connection dropped without release");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.release().await {
                        warn!(target: "tracerun.core.engine", error = %e, "deferred release failed");
                    }
                });
            }
            Err(_) => {
                warn!(target: "tracerun.core.engine", "no runtime to release connection; engine-side resources may leak");
            }
        }
    }
}
