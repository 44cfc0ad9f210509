//! Payment Webhooks server
//!
//! Wires configuration, the Postgres-backed ledger and billing stores, the
//! rate limiter and the webhook router into one axum service.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payment_webhooks::adapters::http::{webhook_router, WebhookAppState};
use payment_webhooks::adapters::postgres::{
    PostgresProcessedEventStore, PostgresPurchaseRepository, PostgresSubscriptionRepository,
};
use payment_webhooks::adapters::rate_limiter::{InMemoryRateLimiter, RedisRateLimiter};
use payment_webhooks::application::webhook::{
    DeliverySettings, EventRouter, HandleWebhookDeliveryHandler,
};
use payment_webhooks::config::{AppConfig, LogFormat};
use payment_webhooks::domain::webhook::SignatureVerifier;
use payment_webhooks::ports::RateLimiter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    tracing::info!("Starting payment webhooks v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    // Lazy so the endpoint comes up during a database outage and answers 503
    tracing::info!(database = %config.database.redacted_url(), "Configuring database pool");
    let pool = config
        .database
        .pool_options()
        .connect_lazy(&config.database.url)?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let rate_limiter = build_rate_limiter(&config).await?;

    let verifier = config
        .webhook
        .signing_secret
        .clone()
        .map(SignatureVerifier::new);
    if verifier.is_none() {
        tracing::error!("Webhook signing secret not configured; deliveries will be refused with 503");
    }

    let store_timeout = config.database.store_timeout();
    let ledger = Arc::new(PostgresProcessedEventStore::new(pool.clone(), store_timeout));
    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone(), store_timeout));
    let purchases = Arc::new(PostgresPurchaseRepository::new(pool, store_timeout));

    let pipeline = HandleWebhookDeliveryHandler::new(
        rate_limiter,
        verifier,
        ledger,
        EventRouter::new(subscriptions, purchases),
        DeliverySettings {
            claim_lease_secs: config.webhook.claim_lease_secs,
            ..DeliverySettings::default()
        },
    );

    let app = webhook_router(WebhookAppState::new(pipeline))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "Listening for payment webhooks");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_rate_limiter(
    config: &AppConfig,
) -> Result<Arc<dyn RateLimiter>, Box<dyn std::error::Error>> {
    match config.redis.url() {
        Some(url) => {
            let client = redis::Client::open(url)?;
            let conn = tokio::time::timeout(
                config.redis.timeout(),
                client.get_multiplexed_tokio_connection(),
            )
            .await??;
            tracing::info!("Using Redis sliding window rate limiter");
            Ok(Arc::new(RedisRateLimiter::new(conn, config.rate_limit.clone())))
        }
        None => {
            tracing::warn!("No Redis URL configured; rate limit windows are per instance");
            let limiter = Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()));
            Arc::clone(&limiter).spawn_sweeper();
            Ok(limiter)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
