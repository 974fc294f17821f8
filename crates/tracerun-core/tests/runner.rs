use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use opentelemetry::{Value, trace::Status};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use tokio_util::sync::CancellationToken;
use tracerun_core::{
    EngineError, TaskRunError, TaskRunner,
    testing::{FakeEngine, FakeRun},
};
use tracerun_model::{RunConfig, TaskStatus};
use tracerun_observe::{OtelTelemetry, Span, SpanContext, Telemetry, TelemetryError};

/// Counts span starts so they can be matched against exported (ended) spans.
struct Counting {
    inner: OtelTelemetry,
    started: AtomicUsize,
}

impl Telemetry for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn start_span(&self, parent: Option<&SpanContext>, name: &str) -> Span {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.inner.start_span(parent, name)
    }

    fn shutdown(&self, timeout: Duration) -> Result<(), TelemetryError> {
        self.inner.shutdown(timeout)
    }
}

struct Spans {
    telemetry: Arc<Counting>,
    exporter: InMemorySpanExporter,
}

impl Spans {
    fn new() -> Self {
        let (inner, exporter) = OtelTelemetry::in_memory();
        Self {
            telemetry: Arc::new(Counting {
                inner,
                started: AtomicUsize::new(0),
            }),
            exporter,
        }
    }

    fn finished(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }

    fn find(&self, name: &str) -> Option<SpanData> {
        self.finished().into_iter().find(|s| s.name == name)
    }

    fn started(&self) -> usize {
        self.telemetry.started.load(Ordering::SeqCst)
    }

    fn assert_no_leaks(&self) {
        assert_eq!(self.started(), self.finished().len());
    }
}

fn attr(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

fn is_error(span: &SpanData) -> bool {
    matches!(span.status, Status::Error { .. })
}

fn setup(engine: FakeEngine) -> (TaskRunner, Spans) {
    let spans = Spans::new();
    let runner = TaskRunner::new(Arc::new(engine), spans.telemetry.clone());
    (runner, spans)
}

#[tokio::test]
async fn echo_on_alpine_succeeds() {
    let engine = FakeEngine::succeeding("Hello from Dagger!\n");
    let stats = engine.stats();
    let (runner, spans) = setup(engine);

    let cfg = RunConfig::default();
    let outcome = runner.run(&cfg, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, TaskStatus::Succeeded);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout, "Hello from Dagger!\n");

    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.runs(), 1);
    assert_eq!(stats.releases(), 1);

    let root = spans.find("main-process").unwrap();
    let completions = root
        .events
        .iter()
        .filter(|e| e.name == "Execution completed successfully!")
        .count();
    assert_eq!(completions, 1);
    assert_eq!(root.status, Status::Ok);
    spans.assert_no_leaks();
}

#[tokio::test]
async fn submitted_task_matches_config() {
    let engine = Arc::new(FakeEngine::succeeding(""));
    let spans = Spans::new();
    let runner = TaskRunner::new(engine.clone(), spans.telemetry.clone());

    runner
        .run(&RunConfig::default(), &CancellationToken::new())
        .await
        .unwrap();

    let submitted = engine.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].base_ref, "alpine:latest");
    assert_eq!(submitted[0].command, vec!["echo", "Hello from Dagger!"]);
}

#[tokio::test]
async fn non_zero_exit_is_execution_error_and_releases() {
    let engine = FakeEngine::exiting(1, "sh: nope: not found");
    let stats = engine.stats();
    let (runner, spans) = setup(engine);

    let err = runner
        .run(&RunConfig::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        TaskRunError::Execution(EngineError::Execution { exit_code, stderr }) => {
            assert_eq!(*exit_code, 1);
            assert_eq!(stderr, "sh: nope: not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), Some(1));
    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.releases(), 1);

    let root = spans.find("main-process").unwrap();
    let task = spans.find("dagger-pipeline").unwrap();
    assert!(is_error(&root));
    assert!(is_error(&task));
    assert!(root.events.is_empty());
    spans.assert_no_leaks();
}

#[tokio::test]
async fn unreachable_engine_never_runs_or_releases() {
    let engine = FakeEngine::unreachable("cannot reach engine socket");
    let stats = engine.stats();
    let (runner, spans) = setup(engine);

    let err = runner
        .run(&RunConfig::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TaskRunError::Connection(EngineError::Connection(_))));
    assert_eq!(err.kind(), "connection");
    assert_eq!(stats.runs(), 0);
    assert_eq!(stats.releases(), 0);

    assert_eq!(spans.started(), 1);
    assert!(spans.find("dagger-pipeline").is_none());
    assert!(is_error(&spans.find("main-process").unwrap()));
    spans.assert_no_leaks();
}

#[tokio::test]
async fn cancel_during_run_is_bounded_and_releases() {
    let engine = FakeEngine::hanging();
    let stats = engine.stats();
    let (runner, spans) = setup(engine);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(25)).await;
        trigger.cancel();
    });

    let cfg = RunConfig::default();
    let res = tokio::time::timeout(Duration::from_secs(2), runner.run(&cfg, &cancel))
        .await
        .expect("cancelled run must return promptly");

    let err = res.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), "cancellation");
    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.releases(), 1);

    let task = spans.find("dagger-pipeline").unwrap();
    assert_eq!(attr(&task, "task.status"), Some(Value::from("cancelled")));
    spans.assert_no_leaks();
}

#[tokio::test]
async fn engine_side_failure_is_execution_error() {
    let engine = FakeEngine::new(FakeRun::Fail(EngineError::Execution {
        exit_code: 125,
        stderr: "Unable to find image 'nope:latest' locally".into(),
    }));
    let stats = engine.stats();
    let (runner, spans) = setup(engine);

    let cfg = RunConfig {
        base_ref: "nope:latest".into(),
        ..Default::default()
    };
    let err = runner.run(&cfg, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.exit_code(), Some(125));
    assert!(err.diagnostic().contains("Unable to find image"));
    assert_eq!(stats.releases(), 1);
    spans.assert_no_leaks();
}

#[tokio::test]
async fn independent_runs_keep_separate_traces() {
    let spans = Spans::new();
    let engine = Arc::new(FakeEngine::new(FakeRun::Exit {
        code: 0,
        stdout: String::new(),
        stderr: String::new(),
        delay: Duration::from_millis(10),
    }));
    let runner = Arc::new(TaskRunner::new(engine.clone(), spans.telemetry.clone()));

    let a = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            runner
                .run(&RunConfig::default(), &CancellationToken::new())
                .await
        })
    };
    let b = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            runner
                .run(&RunConfig::default(), &CancellationToken::new())
                .await
        })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_ne!(a.trace.trace_id(), b.trace.trace_id());
    assert_eq!(engine.stats().connects(), 2);
    assert_eq!(engine.stats().releases(), 2);
    assert_eq!(spans.finished().len(), 4);
    spans.assert_no_leaks();
}
