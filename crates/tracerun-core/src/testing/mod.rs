//! In-process fakes for exercising runners without a real engine.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracerun_model::TaskSpec;

use crate::{
    engine::{Connection, Engine, TaskOutput},
    error::EngineError,
};

/// Call counters shared by a [`FakeEngine`] and its connections.
#[derive(Debug, Default)]
pub struct FakeStats {
    pub connects: AtomicUsize,
    pub runs: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// What a fake connection does when asked to execute a task.
#[derive(Debug, Clone)]
pub enum FakeRun {
    /// Exit with `code` after `delay`; non-zero codes become [`EngineError::Execution`].
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
        delay: Duration,
    },
    /// Fail with the given error without running anything.
    Fail(EngineError),
    /// Never complete and ignore the cancellation token.
    Hang,
}

/// Scripted [`Engine`] counting connect/run/release calls.
pub struct FakeEngine {
    connect_error: Option<EngineError>,
    run: FakeRun,
    stats: Arc<FakeStats>,
    submitted: Arc<Mutex<Vec<TaskSpec>>>,
}

impl FakeEngine {
    pub fn new(run: FakeRun) -> Self {
        Self {
            connect_error: None,
            run,
            stats: Arc::new(FakeStats::default()),
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Exits zero with the given stdout.
    pub fn succeeding(stdout: &str) -> Self {
        Self::new(FakeRun::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            delay: Duration::ZERO,
        })
    }

    /// Exits with `code` and the given stderr.
    pub fn exiting(code: i32, stderr: &str) -> Self {
        Self::new(FakeRun::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            delay: Duration::ZERO,
        })
    }

    pub fn hanging() -> Self {
        Self::new(FakeRun::Hang)
    }

    /// Every connect attempt fails with [`EngineError::Connection`].
    pub fn unreachable(reason: &str) -> Self {
        Self {
            connect_error: Some(EngineError::Connection(reason.to_string())),
            ..Self::succeeding("")
        }
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        Arc::clone(&self.stats)
    }

    /// Tasks handed to `execute`, in order.
    pub fn submitted(&self) -> Vec<TaskSpec> {
        self.submitted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl Engine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, _cancel: &CancellationToken) -> Result<Box<dyn Connection>, EngineError> {
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        let n = self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            id: format!("fake-{n}"),
            alive: AtomicBool::new(true),
            run: self.run.clone(),
            stats: Arc::clone(&self.stats),
            submitted: Arc::clone(&self.submitted),
        }))
    }
}

struct FakeConnection {
    id: String,
    alive: AtomicBool,
    run: FakeRun,
    stats: Arc<FakeStats>,
    submitted: Arc<Mutex<Vec<TaskSpec>>>,
}

#[async_trait]
impl Connection for FakeConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute(
        &self,
        task: &TaskSpec,
        _cancel: &CancellationToken,
    ) -> Result<TaskOutput, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::Released);
        }
        self.stats.runs.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(task.clone());

        match &self.run {
            FakeRun::Exit {
                code,
                stdout,
                stderr,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                if *code == 0 {
                    Ok(TaskOutput {
                        exit_code: 0,
                        stdout: stdout.clone(),
                        stderr: stderr.clone(),
                    })
                } else {
                    Err(EngineError::Execution {
                        exit_code: *code,
                        stderr: stderr.clone(),
                    })
                }
            }
            FakeRun::Fail(err) => Err(err.clone()),
            FakeRun::Hang => std::future::pending().await,
        }
    }

    async fn release(&self) -> Result<(), EngineError> {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
