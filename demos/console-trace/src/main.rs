use std::{process::ExitCode, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tracerun_core::TaskRunner;
use tracerun_exec::{ContainerEngine, ContainerEngineConfig};
use tracerun_model::RunConfig;
use tracerun_observe::{
    ExporterKind, LoggerConfig, LoggerLevel, OtelTelemetry, Telemetry, TelemetryConfig,
    init_logger, init_telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 1) Logger
    let cfg = LoggerConfig {
        level: LoggerLevel::new("info")?,
        ..Default::default()
    };
    init_logger(&cfg)?;

    // 2) Telemetry: each span printed to stdout as it ends
    let telemetry_cfg = TelemetryConfig {
        service_name: "console-trace".to_string(),
        exporter: ExporterKind::Console,
        ..Default::default()
    };
    let telemetry: Arc<dyn Telemetry> = match init_telemetry(&telemetry_cfg) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            warn!(error = %e, "telemetry unavailable; spans will not be exported");
            Arc::new(OtelTelemetry::disabled(&telemetry_cfg.service_name))
        }
    };

    // 3) Engine + runner
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

    // 4) Run
    let result = runner.run(&RunConfig::default(), &cancel).await;

    // 5) Flush spans; failures here never change the exit status
    if let Err(e) = telemetry.shutdown(telemetry_cfg.shutdown_timeout()) {
        warn!(error = %e, "telemetry shutdown failed");
    }

    match result {
        Ok(_) => {
            println!("Executed container successfully!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.diagnostic());
            Ok(ExitCode::FAILURE)
        }
    }
}
