use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod datasource;
mod error;
mod handlers;
mod models;
mod scheduler;
mod services;
mod storage;

use config::Config;
use datasource::etherscan::EtherscanGasOracle;
use datasource::opensea::OpenSeaClient;
use datasource::CatalogSource;
use models::EventTable;
use scheduler::PeriodicTask;
use services::gas_tracker::GasPriceJob;
use services::ingestion::EventIngestJob;
use storage::mongo::MongoStore;
use storage::postgres::PostgresStore;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<Vec<Arc<PeriodicTask>>>,
    pub catalog: Arc<dyn CatalogSource>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_scraper=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let postgres = Arc::new(PostgresStore::connect_lazy(&config.postgres));

    let event_table = config
        .events
        .contract_address
        .as_deref()
        .map(EventTable::for_contract)
        .transpose()?;

    let schema_tables: Vec<EventTable> = event_table.iter().cloned().collect();
    if let Err(e) = postgres.ensure_schema(&schema_tables).await {
        tracing::warn!(error = %e, "Could not prepare schema; continuing");
    }

    let opensea = Arc::new(OpenSeaClient::new(&config.opensea));
    let mut tasks = Vec::new();

    let gas_oracle = Arc::new(EtherscanGasOracle::new(&config.etherscan));
    let gas_job = Arc::new(GasPriceJob::new(gas_oracle, postgres.clone()));
    tasks.push(Arc::new(PeriodicTask::new(
        "EtherscanGas",
        config.etherscan.poll_interval,
        gas_job,
    )?));

    if let Some(table) = event_table {
        let mongo = Arc::new(MongoStore::connect_lazy(&config.mongo, &config.app.name)?);
        let events_job = EventIngestJob::new(opensea.clone(), mongo, postgres.clone(), table)
            .with_rate_limit(config.events.rate_limit);
        tasks.push(Arc::new(PeriodicTask::new(
            "OpenSeaEvents",
            config.events.poll_interval,
            Arc::new(events_job),
        )?));
    }

    for task in &tasks {
        task.start()?;
    }

    let state = AppState {
        tasks: Arc::new(tasks),
        catalog: opensea,
    };
    let app = handlers::router(state.clone());

    // Start admin server
    let addr = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting {} admin server on {}", config.app.name, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in state.tasks.iter() {
        task.stop().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
