//! HTTP Handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use pay_core::{Payment, PayError, ReconcileOutcome, User};
use pay_gateways::{CryptoAsset, CryptoIntent, PixOrder, StripeCheckout, WebhookGateway};

use crate::auth::link_identity;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_live: bool,
    pub pix_live: bool,
    pub crypto_live: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub plan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CryptoCheckoutBody {
    pub plan_id: String,
    pub crypto_type: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Body returned for every acknowledged webhook delivery
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &PayError) -> ApiError {
    let (status, code) = match err {
        PayError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        PayError::UnknownPlan(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN"),
        PayError::UnsupportedAsset(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_ASSET"),
        PayError::CurrencyMismatch { .. } => (StatusCode::BAD_REQUEST, "CURRENCY_MISMATCH"),
        PayError::AuthenticationFailed(_) => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
        PayError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_live: state.live_providers.stripe,
        pix_live: state.live_providers.pix,
        crypto_live: state.live_providers.crypto,
    })
}

/// POST /api/checkout/stripe
pub async fn create_stripe_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<StripeCheckout>, ApiError> {
    let user = authenticate(&state, &headers).await.map_err(|e| api_error(&e))?;
    let checkout = state
        .intents
        .create_stripe_checkout(&user, &body.plan_id)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, plan_id = %body.plan_id, "stripe checkout failed");
            api_error(&e)
        })?;
    Ok(Json(checkout))
}

/// POST /api/checkout/pix
pub async fn create_pix_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<PixOrder>, ApiError> {
    let user = authenticate(&state, &headers).await.map_err(|e| api_error(&e))?;
    let order = state
        .intents
        .create_pix_order(&user, &body.plan_id)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, plan_id = %body.plan_id, "pix order failed");
            api_error(&e)
        })?;
    Ok(Json(order))
}

/// POST /api/checkout/crypto
pub async fn create_crypto_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CryptoCheckoutBody>,
) -> Result<Json<CryptoIntent>, ApiError> {
    let user = authenticate(&state, &headers).await.map_err(|e| api_error(&e))?;
    let asset = CryptoAsset::parse(&body.crypto_type).map_err(|e| api_error(&e))?;
    let intent = state
        .intents
        .create_crypto_intent(&user, &body.plan_id, asset)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, plan_id = %body.plan_id, "crypto intent failed");
            api_error(&e)
        })?;
    Ok(Json(intent))
}

/// GET /api/payments
///
/// The caller's payment history, oldest first.
pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let user = authenticate(&state, &headers).await.map_err(|e| api_error(&e))?;
    let payments = state
        .payments
        .list_by_user(&user.id)
        .map_err(|e| api_error(&e))?;
    Ok(Json(payments))
}

/// POST /webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    handle_webhook(&state, &state.stripe_webhook, &headers, &body)
}

/// POST /webhooks/pix
pub async fn pix_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    handle_webhook(&state, &state.pix_webhook, &headers, &body)
}

/// POST /webhooks/crypto
pub async fn crypto_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    handle_webhook(&state, &state.crypto_webhook, &headers, &body)
}

// ============================================================================
// Shared webhook plumbing
// ============================================================================

/// Acknowledgement policy: only an authentication failure or a store
/// fault earns a non-2xx. Providers treat non-2xx as "retry forever",
/// so no-ops, unknown ids, and malformed bodies are all acknowledged.
fn handle_webhook(
    state: &AppState,
    gateway: &WebhookGateway,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, Json<WebhookAck>) {
    let signature = headers
        .get(gateway.signature_header())
        .and_then(|v| v.to_str().ok());

    let notification = match gateway.verify_and_parse(body, signature) {
        Ok(n) => n,
        Err(PayError::AuthenticationFailed(reason)) => {
            tracing::warn!(provider = %gateway.provider(), %reason, "webhook rejected");
            return (
                StatusCode::UNAUTHORIZED,
                Json(WebhookAck {
                    received: false,
                    detail: "signature verification failed".into(),
                }),
            );
        }
        Err(PayError::MalformedPayload(reason)) => {
            // Acknowledged so the provider stops retrying; the failure
            // itself needs operator follow-up
            tracing::error!(provider = %gateway.provider(), %reason, "malformed webhook payload");
            return (
                StatusCode::OK,
                Json(WebhookAck {
                    received: true,
                    detail: "payload not processable".into(),
                }),
            );
        }
        Err(e) => {
            tracing::error!(provider = %gateway.provider(), error = %e, "webhook gateway error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck {
                    received: false,
                    detail: "internal error".into(),
                }),
            );
        }
    };

    match state.reconciler.reconcile(&notification) {
        Ok(outcome) => {
            let detail = match outcome {
                ReconcileOutcome::Applied { payment } => {
                    format!("payment {} now {}", payment.id, payment.status)
                }
                ReconcileOutcome::AlreadyProcessed { external_id } => {
                    format!("{} already processed", external_id)
                }
                ReconcileOutcome::NotFound { external_id } => {
                    format!("no payment for {}", external_id)
                }
                ReconcileOutcome::Ignored { reason } => reason,
            };
            (
                StatusCode::OK,
                Json(WebhookAck {
                    received: true,
                    detail,
                }),
            )
        }
        Err(e) => {
            // Store faults get a 5xx so the provider redelivers; the
            // CAS transition makes that redelivery safe
            tracing::error!(provider = %gateway.provider(), error = %e, "reconciliation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck {
                    received: false,
                    detail: "reconciliation failed".into(),
                }),
            )
        }
    }
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> pay_core::Result<User> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(PayError::Unauthenticated)?;
    let identity = state
        .identity
        .resolve(token)
        .await
        .ok_or(PayError::Unauthenticated)?;
    link_identity(state.users.as_ref(), &identity)
}
