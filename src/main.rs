//! OpenSASE Inventory Sync - order-driven stock synchronization service

use anyhow::Result;
use opensase_inventory_sync::catalog::{CacheLayer, CachingCatalogView, DisabledCache, RedisCache};
use opensase_inventory_sync::config::Config;
use opensase_inventory_sync::http::{router, AppState};
use opensase_inventory_sync::inventory::{AtomicSyncMetrics, StockMutator, StockSyncOrchestrator};
use opensase_inventory_sync::messaging::{ConsumerConfig, NatsBus, OrderEventConsumer};
use opensase_inventory_sync::store::{PgCatalogStore, PgDecrementLedger};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let cache: Arc<dyn CacheLayer> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to connect to Redis, proceeding without caching");
                Arc::new(DisabledCache)
            }
        },
        None => Arc::new(DisabledCache),
    };
    let catalog = Arc::new(CachingCatalogView::new(Arc::new(PgCatalogStore::new(db.clone())), cache, config.cache_ttl));
    let metrics = Arc::new(AtomicSyncMetrics::default());

    let orchestrator = StockSyncOrchestrator::new(StockMutator::new(catalog.clone()), metrics.clone())
        .with_ledger(Arc::new(PgDecrementLedger::new(db.clone())));

    let bus = Arc::new(NatsBus::connect(&config.nats_url).await?);
    let consumer = OrderEventConsumer::new(
        bus,
        metrics.clone(),
        ConsumerConfig { handler_timeout: config.handler_timeout, ..ConsumerConfig::default() },
    );
    consumer.subscribe(Arc::new(orchestrator)).await?;

    let app = router(AppState { catalog, metrics });
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 OpenSASE Inventory Sync listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("Shutting down gracefully...");
    if let Err(e) = consumer.close().await {
        tracing::error!(error = %e, "Error closing consumer");
    }
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => { signal.recv().await; }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
