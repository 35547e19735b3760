//! Payment Reconciliation HTTP Server
//!
//! Axum-based server providing intent creation endpoints and the
//! per-provider webhook receivers that drive reconciliation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pay_server::config::ServerConfig;
use pay_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    for (name, live, secret) in [
        ("stripe", config.stripe.is_live(), config.stripe.webhook_secret.is_some()),
        ("pix", config.pix.is_live(), config.pix.webhook_secret.is_some()),
        ("crypto", config.crypto.is_live(), config.crypto.webhook_secret.is_some()),
    ] {
        if live {
            tracing::info!("✓ {} live client configured", name);
        } else {
            tracing::warn!("⚠ {} running against mock client", name);
        }
        if !secret {
            tracing::warn!("⚠ {} webhook secret missing - deliveries will be rejected", name);
        }
    }

    let state = AppState::from_config(&config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 pay-server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /api/checkout/stripe  - Create Stripe checkout session");
    tracing::info!("  POST /api/checkout/pix     - Create PIX charge");
    tracing::info!("  POST /api/checkout/crypto  - Create crypto payment intent");
    tracing::info!("  GET  /api/payments         - Caller's payment history");
    tracing::info!("  POST /webhooks/stripe      - Stripe notifications");
    tracing::info!("  POST /webhooks/pix         - PIX notifications");
    tracing::info!("  POST /webhooks/crypto      - Crypto processor notifications");

    axum::serve(listener, app).await?;

    Ok(())
}
