use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid exporter: {0} (expected: none|console|otlp)")]
    InvalidExporter(String),
    #[error("exporter setup failed: {0}")]
    Exporter(String),
    #[error("telemetry sdk: {0}")]
    Sdk(#[from] OTelSdkError),
}
