use settlement_backend::api::{self, AppState};
use settlement_backend::config::Config;
use settlement_backend::database::{self, memory::MemoryStore, PoolConfig, Stores};
use settlement_backend::logging;
use settlement_backend::payments::providers::{DokuProvider, MidtransProvider, TripayProvider};
use settlement_backend::payments::ProviderRegistry;
use settlement_backend::settlement::{CheckoutSettings, HttpFulfillmentDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    logging::init(&config.server.environment);

    tracing::info!("Starting settlement backend");
    tracing::info!("Environment: {}", config.server.environment);

    let (stores, pool) = match &config.database.url {
        Some(url) => {
            let pool = database::init_pool(
                url,
                Some(PoolConfig {
                    max_connections: config.database.max_connections,
                    ..Default::default()
                }),
            )
            .await?;
            database::run_migrations(&pool).await?;
            (Stores::postgres(pool.clone()), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            (Stores::memory(MemoryStore::new()), None)
        }
    };

    let mut providers = ProviderRegistry::new();
    if let Some(midtrans) = config.midtrans.clone() {
        providers.register(Arc::new(MidtransProvider::new(midtrans)?));
    }
    if let Some(doku) = config.doku.clone() {
        providers.register(Arc::new(DokuProvider::new(doku)?));
    }
    if let Some(tripay) = config.tripay.clone() {
        providers.register(Arc::new(TripayProvider::new(tripay)?));
    }
    tracing::info!(providers = ?providers.configured(), "Payment providers configured");

    if config.fulfillment.endpoint.is_none() {
        tracing::warn!("FULFILLMENT_WEBHOOK_URL not set, paid orders will not be forwarded");
    }
    let fulfillment = HttpFulfillmentDispatcher::new(
        config.fulfillment.endpoint.clone(),
        config.fulfillment.timeout_secs,
        stores.profiles.clone(),
    )?;

    let state = AppState::new(
        config.server.environment.clone(),
        stores,
        providers,
        Arc::new(fulfillment),
        CheckoutSettings {
            reference_prefix: config.checkout.reference_prefix.clone(),
            return_url: config.checkout.return_url.clone(),
        },
        pool,
    );
    let app = api::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
