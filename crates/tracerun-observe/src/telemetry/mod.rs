//! Telemetry context: scoped span creation on top of the OpenTelemetry SDK.
//!
//! Callers obtain spans through [`Telemetry::start_span`] and never see which
//! exporter receives them. Span operations never fail and never block on
//! export; only [`Telemetry::shutdown`] waits on the exporter, and its errors
//! are meant to be logged, not propagated into the outcome of the
//! instrumented work.

mod config;
mod error;
mod resource;

pub use config::{
    ENV_OTLP_ENDPOINT, ENV_OTLP_TRACES_ENDPOINT, ENV_SERVICE_NAME, ENV_TRACES_EXPORTER,
    ExporterKind, TelemetryConfig,
};
pub use error::TelemetryError;
pub use resource::detect_resource;

pub use opentelemetry::trace::{SpanContext, Status};
pub use opentelemetry_sdk::trace::Span;

use std::{sync::Arc, time::Duration};

use opentelemetry::{
    Context,
    trace::{TraceContextExt as _, Tracer as _, TracerProvider as _},
};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

const TRACER_NAME: &str = "tracerun";

/// Span factory and flush point for one process.
///
/// Implementations are `Send + Sync`; concurrent runs may share one instance
/// as long as each run keeps its own span tree.
pub trait Telemetry: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Start a span as a child of `parent`, or as the root of a new trace if `parent` is `None`.
    ///
    /// The span ends on [`Span::end`](opentelemetry::trace::Span::end) or when dropped.
    fn start_span(&self, parent: Option<&SpanContext>, name: &str) -> Span;

    /// Flush buffered spans and stop exporting, waiting at most `timeout`.
    fn shutdown(&self, timeout: Duration) -> Result<(), TelemetryError>;
}

/// [`Telemetry`] backed by an [`SdkTracerProvider`].
#[derive(Clone)]
pub struct OtelTelemetry {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
}

impl OtelTelemetry {
    pub fn new(provider: SdkTracerProvider) -> Self {
        let tracer = provider.tracer(TRACER_NAME);
        Self { provider, tracer }
    }

    /// Spans are created and dropped; nothing is exported.
    pub fn disabled(service_name: &str) -> Self {
        Self::new(
            SdkTracerProvider::builder()
                .with_resource(detect_resource(service_name))
                .build(),
        )
    }

    /// Spans are kept in memory and exported as soon as they end.
    #[cfg(any(test, feature = "testing"))]
    pub fn in_memory() -> (Self, opentelemetry_sdk::trace::InMemorySpanExporter) {
        let exporter = opentelemetry_sdk::trace::InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_resource(detect_resource("tracerun-test"))
            .with_simple_exporter(exporter.clone())
            .build();
        (Self::new(provider), exporter)
    }

    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }
}

impl Telemetry for OtelTelemetry {
    fn name(&self) -> &'static str {
        "opentelemetry"
    }

    fn start_span(&self, parent: Option<&SpanContext>, name: &str) -> Span {
        // An explicit empty context keeps ambient spans out of the tree.
        let cx = match parent {
            Some(parent) => Context::new().with_remote_span_context(parent.clone()),
            None => Context::new(),
        };
        self.tracer.start_with_context(name.to_string(), &cx)
    }

    fn shutdown(&self, timeout: Duration) -> Result<(), TelemetryError> {
        self.provider.shutdown_with_timeout(timeout)?;
        tracing::debug!(target: "tracerun.observe.telemetry", "telemetry shut down");
        Ok(())
    }
}

/// Build the provider selected by `cfg`.
///
/// Fails only when the exporter itself cannot be constructed; callers may fall
/// back to [`OtelTelemetry::disabled`].
pub fn init_telemetry(cfg: &TelemetryConfig) -> Result<Arc<dyn Telemetry>, TelemetryError> {
    let builder = SdkTracerProvider::builder().with_resource(detect_resource(&cfg.service_name));

    let builder = match cfg.exporter {
        ExporterKind::None => builder,
        ExporterKind::Console => {
            builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        }
        ExporterKind::Otlp => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build()
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
            builder.with_batch_exporter(exporter)
        }
    };

    tracing::debug!(
        target: "tracerun.observe.telemetry",
        service = %cfg.service_name,
        exporter = cfg.exporter.as_str(),
        "telemetry initialized"
    );
    Ok(Arc::new(OtelTelemetry::new(builder.build())))
}
