//! # pay-server
//!
//! Axum service exposing payment intent creation and one webhook
//! endpoint per provider.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_crypto_intent, create_pix_order, create_stripe_checkout, crypto_webhook, health_check,
    list_payments, pix_webhook, stripe_webhook,
};
pub use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Intent creation
        .route("/api/checkout/stripe", post(create_stripe_checkout))
        .route("/api/checkout/pix", post(create_pix_order))
        .route("/api/checkout/crypto", post(create_crypto_intent))
        .route("/api/payments", get(list_payments))
        // Provider webhooks
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/webhooks/pix", post(pix_webhook))
        .route("/webhooks/crypto", post(crypto_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
