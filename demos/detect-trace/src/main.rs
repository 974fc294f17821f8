use std::{process::ExitCode, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tracerun_core::TaskRunner;
use tracerun_exec::{ContainerEngine, ContainerEngineConfig};
use tracerun_model::RunConfig;
use tracerun_observe::{
    LoggerConfig, LoggerLevel, OtelTelemetry, Telemetry, TelemetryConfig, init_logger,
    init_telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cfg = LoggerConfig {
        level: LoggerLevel::new("info")?,
        ..Default::default()
    };
    init_logger(&cfg)?;

    // Exporter and service name come from OTEL_TRACES_EXPORTER / OTEL_SERVICE_NAME.
    let telemetry_cfg = TelemetryConfig::detect("detect-trace");
    info!(
        service = %telemetry_cfg.service_name,
        exporter = telemetry_cfg.exporter.as_str(),
        "telemetry detected"
    );
    let telemetry: Arc<dyn Telemetry> = match init_telemetry(&telemetry_cfg) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            warn!(error = %e, "telemetry unavailable; spans will not be exported");
            Arc::new(OtelTelemetry::disabled(&telemetry_cfg.service_name))
        }
    };

    let engine = ContainerEngine::new(ContainerEngineConfig::default())?;
    let runner = TaskRunner::new(Arc::new(engine), telemetry.clone());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let result = runner.run(&RunConfig::default(), &cancel).await;

    if let Err(e) = telemetry.shutdown(telemetry_cfg.shutdown_timeout()) {
        warn!(error = %e, "telemetry shutdown failed");
    }

    match result {
        Ok(outcome) => {
            info!(
                trace_id = %outcome.trace.trace_id(),
                duration_ms = outcome.duration.as_millis() as u64,
                "run finished"
            );
            println!("Executed container successfully!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.diagnostic());
            Ok(ExitCode::FAILURE)
        }
    }
}
