use std::{str::FromStr, time::Duration};

use crate::telemetry::error::TelemetryError;

pub const ENV_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
pub const ENV_TRACES_EXPORTER: &str = "OTEL_TRACES_EXPORTER";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
pub const ENV_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";

/// Where finished spans go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterKind {
    /// Spans are recorded by the SDK and dropped.
    None,
    /// Each span is printed to stdout as it ends.
    Console,
    /// Batched OTLP/HTTP export; endpoint and headers come from `OTEL_EXPORTER_OTLP_*`.
    Otlp,
}

impl ExporterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExporterKind::None => "none",
            ExporterKind::Console => "console",
            ExporterKind::Otlp => "otlp",
        }
    }
}

impl FromStr for ExporterKind {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "none" => Ok(ExporterKind::None),
            "console" | "stdout" => Ok(ExporterKind::Console),
            "otlp" => Ok(ExporterKind::Otlp),
            _ => Err(TelemetryError::InvalidExporter(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub exporter: ExporterKind,
    /// Upper bound for the final flush.
    pub shutdown_timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "tracerun".to_string(),
            exporter: ExporterKind::Console,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl TelemetryConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Settings from the standard `OTEL_*` process environment.
    pub fn detect(service_name: &str) -> Self {
        Self::detect_from(service_name, |key| std::env::var(key).ok())
    }

    /// Settings from an arbitrary variable lookup.
    ///
    /// `OTEL_SERVICE_NAME` overrides `service_name`. `OTEL_TRACES_EXPORTER`
    /// picks the exporter (first supported entry of the list). Without it, an
    /// OTLP endpoint variable selects OTLP; with neither, nothing is exported.
    pub fn detect_from<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let service_name =
            non_blank(ENV_SERVICE_NAME).unwrap_or_else(|| service_name.to_string());

        let exporter = match non_blank(ENV_TRACES_EXPORTER) {
            Some(raw) => {
                let picked = raw
                    .split(',')
                    .find_map(|name| name.parse::<ExporterKind>().ok());
                match picked {
                    Some(kind) => kind,
                    None => {
                        tracing::warn!(
                            target: "tracerun.observe.telemetry",
                            exporter = %raw,
                            "unsupported traces exporter; spans will not be exported"
                        );
                        ExporterKind::None
                    }
                }
            }
            None if non_blank(ENV_OTLP_TRACES_ENDPOINT).is_some()
                || non_blank(ENV_OTLP_ENDPOINT).is_some() =>
            {
                ExporterKind::Otlp
            }
            None => ExporterKind::None,
        };

        Self {
            service_name,
            exporter,
            ..Self::default()
        }
    }
}
