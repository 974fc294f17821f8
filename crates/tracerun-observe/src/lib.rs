mod logger;
pub use logger::*;

pub mod telemetry;
pub use telemetry::{
    ExporterKind, OtelTelemetry, Span, SpanContext, Status, Telemetry, TelemetryConfig,
    TelemetryError, init_telemetry,
};
