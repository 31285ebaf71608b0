use axum::Router;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod};
use std::net::SocketAddr;
use tokio_postgres::NoTls;
use tracing::{error, info, warn};

use clinical_persistence::api;
use clinical_persistence::api::handlers::AppState;
use clinical_persistence::config::{mask_credentials, Config};
use clinical_persistence::models::DatabaseFamily;
use clinical_persistence::services::database::DialectSelector;
use clinical_persistence::services::SequenceService;

fn create_pool(connection_url: &str, max_pool_size: usize) -> anyhow::Result<Pool> {
    info!(
        "Creating connection pool for: {} (max_size: {})",
        mask_credentials(connection_url),
        max_pool_size
    );

    let mut cfg = PoolConfig::new();
    cfg.url = Some(connection_url.to_string());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)?;
    pool.resize(max_pool_size);
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Select the SQL dialect once for the whole process
    let family = config.database_family().map_err(|e| {
        error!("{}", e);
        e
    })?;
    let dialect = DialectSelector::install(family)?;
    let sequences = SequenceService::new(dialect);

    let pool = match (family, config.database.url.as_deref()) {
        (DatabaseFamily::PostgreSql, Some(url)) => Some(create_pool(url, config.database.max_pool_size)?),
        (DatabaseFamily::PostgreSql, None) => {
            warn!("DATABASE_URL is not set; sequence endpoints are disabled");
            None
        }
        (family, _) => {
            info!("No bundled executor for {}; sequence endpoints are disabled", family);
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        sequences,
        pool,
    };
    let app: Router = api::routes::create_router_with_state(state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {} ({} dialect)", addr, family);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
