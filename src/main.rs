use anyhow::Result;
use chargeapt::config::Config;
use chargeapt::logging::{get_logger, init_logging};
use chargeapt::poller::spawn_status_poller;
use chargeapt::report::ReportAssembler;
use chargeapt::source::{sample_source, snapshot_source};
use chargeapt::status::StatusInferencer;
use chargeapt::web::{AppState, serve};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Logging init failed: {}", e))?;

    let logger = get_logger("main");
    logger.info(&format!(
        "Charge APT {} starting up; samples={}, snapshot={}",
        env!("APP_VERSION"),
        config.sources.samples,
        config.sources.snapshot
    ));

    let tz = config.report.tz()?;
    let assembler = ReportAssembler::from_config(&config.report)?;
    let samples = sample_source(&config.sources)?;
    let snapshots = snapshot_source(&config.sources)?;

    let poller = spawn_status_poller(
        snapshots,
        StatusInferencer::new(config.status.staleness_threshold(), tz),
        config.status.poll_interval(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        samples,
        assembler: Arc::new(assembler),
        status_rx: poller.subscribe(),
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            get_logger("main").error(&format!("Failed to listen for shutdown signal: {}", e));
            std::future::pending::<()>().await;
        }
        get_logger("main").info("Shutdown signal received");
    };

    let served = serve(state, &config.web.host, config.web.port, shutdown).await;
    poller.shutdown().await;

    match served {
        Ok(()) => {
            logger.info("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            logger.error(&format!("Web server error: {}", e));
            Err(e)
        }
    }
}
