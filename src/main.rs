use order_entry_api::services::{
    InMemoryAccountService, InMemoryQuoteSource, QuoteSource, SimulatedSubmissionService,
};
use order_entry_api::{create_router, EngineConfig, OrderEntryEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_entry_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // In-memory collaborators
    let quotes = Arc::new(InMemoryQuoteSource::with_demo_listings());
    let accounts = Arc::new(InMemoryAccountService::new(
        config.simulation.opening_balance,
        config.simulation.default_holding,
    ));
    let submitter = Arc::new(SimulatedSubmissionService::new(Duration::from_millis(
        config.simulation.submission_latency_ms,
    )));

    tracing::info!("📈 Quote book loaded: {} symbols", quotes.list().len());
    tracing::info!(
        "💰 Simulated account: balance {}, {} shares held per symbol",
        config.simulation.opening_balance,
        config.simulation.default_holding
    );
    tracing::info!(
        "🔐 Submission timeout {} ms, re-validation on submit: {}",
        config.confirmation.submission_timeout_ms,
        config.confirmation.revalidate_on_submit
    );
    tracing::info!(
        "🧹 Idle sessions evicted after {} ms (sweep every {} ms)",
        config.confirmation.session_ttl_ms,
        config.confirmation.sweep_interval_ms
    );

    let addr = config.server.bind_addr.clone();
    let engine = Arc::new(OrderEntryEngine::new(config, quotes, accounts, submitter));
    let _sweeper = engine.start_session_sweeper();
    let app = create_router(engine);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("❌ Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Order Entry API server running on http://{}", addr);
    tracing::info!("📊 Health check: http://{}/health", addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("❌ Server error: {}", e);
    }
}
