use anyhow::{Context, Result};
use elspot::config::Config;
use elspot::logging::{get_logger, init_logging};
use elspot::orchestrator::{LoggingSink, PriceService, RefreshOrchestrator, StaticSubscriptions};
use elspot::source::{EnergiDataServiceClient, GlobalLocationNumber, grid_company_name};
use elspot::time::SystemClock;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // An explicit path wins over the default locations
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    init_logging(&config.logging).context("Failed to initialize logging")?;
    let logger = get_logger("main");
    logger.info(&format!(
        "Elspot {} starting for price area {} ({})",
        env!("APP_VERSION"),
        config.service.price_area,
        config.service.currency
    ));

    let grid_company = GlobalLocationNumber::new(&config.service.grid_company_gln);
    if grid_company.is_empty() {
        logger.warn("No grid company configured, net tariffs will not be fetched");
    } else {
        logger.info(&format!(
            "Grid company {} ({})",
            grid_company,
            grid_company_name(&grid_company).unwrap_or("unknown, no default tariff filter")
        ));
    }

    let clock = Arc::new(SystemClock);
    let source = Arc::new(
        EnergiDataServiceClient::new(&config.api, clock.clone())
            .context("Failed to create Energi Data Service client")?,
    );
    let subscriptions = Arc::new(StaticSubscriptions::new(config.subscriptions.iter().copied()));
    let service = Arc::new(PriceService::new(config, source, clock));

    let handle =
        RefreshOrchestrator::new(service, Arc::new(LoggingSink::new()), subscriptions).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    logger.info("Shutting down");
    handle.shutdown().await;
    logger.info("Shutdown complete");
    Ok(())
}
