use service_core::observability::init_tracing;
use watch_gate_service::config::WatchGateConfig;
use watch_gate_service::services::init_metrics;
use watch_gate_service::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = WatchGateConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "watch-gate-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
