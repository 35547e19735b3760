//! Stripe Gateway
//!
//! Hosted-checkout intent creation plus webhook envelope parsing. The
//! live client drives the Stripe API; the mock client synthesizes
//! session artifacts for development and tests.

use async_trait::async_trait;
use serde::Deserialize;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    Currency,
};

use pay_core::{Notification, NotificationKind, PayError, PaymentProvider, Result};

/// Everything the gateway needs to open a checkout session
#[derive(Clone, Debug)]
pub struct CheckoutSessionRequest {
    pub plan_id: String,
    pub plan_name: String,

    /// Price in the smallest currency unit
    pub amount: i64,
    pub currency: String,

    /// Subscription mode vs one-time payment mode
    pub subscription: bool,

    pub customer_email: Option<String>,

    /// Stable user id, echoed back by the webhook
    pub client_reference_id: String,

    pub success_url: String,
    pub cancel_url: String,
}

/// Provider artifact for a created session
#[derive(Clone, Debug)]
pub struct CheckoutArtifact {
    pub session_id: String,
    pub checkout_url: String,
}

/// Stripe API capability
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutArtifact>;
}

/// Live client backed by the Stripe SDK
pub struct LiveStripeClient {
    client: Client,
}

impl LiveStripeClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

#[async_trait]
impl StripeApi for LiveStripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutArtifact> {
        let currency = parse_currency(&request.currency)?;

        let mut params = CreateCheckoutSession::new();
        params.customer_email = request.customer_email.as_deref();
        params.client_reference_id = Some(&request.client_reference_id);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(if request.subscription {
            CheckoutSessionMode::Subscription
        } else {
            CheckoutSessionMode::Payment
        });

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("plan_id".to_string(), request.plan_id.clone());
        metadata.insert("user_id".to_string(), request.client_reference_id.clone());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.plan_name.clone(),
                    ..Default::default()
                }),
                recurring: request.subscription.then(|| {
                    CreateCheckoutSessionLineItemsPriceDataRecurring {
                        interval: CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
                        interval_count: Some(1),
                    }
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PayError::Provider(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PayError::Provider("no checkout URL returned".into()))?;

        Ok(CheckoutArtifact {
            session_id: session.id.to_string(),
            checkout_url,
        })
    }
}

/// Mock client synthesizing `cs_test_…` sessions
pub struct MockStripeClient {
    app_url: String,
}

impl MockStripeClient {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }
}

#[async_trait]
impl StripeApi for MockStripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutArtifact> {
        let session_id = format!(
            "cs_test_{}_{}",
            request.plan_id,
            uuid::Uuid::new_v4().simple()
        );
        let checkout_url = format!(
            "{}/mock-stripe-checkout?session_id={}",
            self.app_url, session_id
        );
        tracing::debug!(session_id = %session_id, "synthesized mock checkout session");
        Ok(CheckoutArtifact {
            session_id,
            checkout_url,
        })
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    match code.to_ascii_lowercase().as_str() {
        "usd" => Ok(Currency::USD),
        "brl" => Ok(Currency::BRL),
        "eur" => Ok(Currency::EUR),
        other => Err(PayError::Provider(format!(
            "unsupported checkout currency {}",
            other
        ))),
    }
}

// ============================================================================
// Webhook parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    payment_status: Option<String>,
    customer: Option<serde_json::Value>,
    subscription: Option<serde_json::Value>,
}

/// References arrive as either a bare id or an expanded object
fn reference_id(value: &Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(id)) => Some(id.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("id")
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        _ => None,
    }
}

/// Parse a verified Stripe webhook body into a notification
///
/// Join key is the checkout session id; all handled event types carry
/// it on `data.object.id`.
pub fn parse_notification(payload: &[u8]) -> Result<Notification> {
    let event: RawStripeEvent = serde_json::from_slice(payload)
        .map_err(|e| PayError::MalformedPayload(e.to_string()))?;

    let kind = match event.event_type.as_str() {
        "checkout.session.completed" => None, // decided by payment_status below
        "checkout.session.async_payment_succeeded" => Some(NotificationKind::Succeeded),
        "checkout.session.async_payment_failed" => Some(NotificationKind::Failed),
        "checkout.session.expired" => Some(NotificationKind::Canceled),
        _ => {
            let external_id = event
                .data
                .object
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            return Ok(Notification::new(
                PaymentProvider::Stripe,
                external_id,
                NotificationKind::Ignored,
                event.event_type,
            ));
        }
    };

    let session: RawCheckoutSession = serde_json::from_value(event.data.object)
        .map_err(|e| PayError::MalformedPayload(format!("checkout session object: {}", e)))?;

    let kind = match kind {
        Some(kind) => kind,
        None => match session.payment_status.as_deref() {
            Some("paid" | "no_payment_required") => NotificationKind::Succeeded,
            Some("unpaid") => NotificationKind::Pending,
            Some(other) => {
                return Err(PayError::MalformedPayload(format!(
                    "unknown payment_status {}",
                    other
                )))
            }
            None => {
                return Err(PayError::MalformedPayload(
                    "checkout.session.completed without payment_status".into(),
                ))
            }
        },
    };

    let customer_id = reference_id(&session.customer);
    let subscription_id = reference_id(&session.subscription);
    let mut notification = Notification::new(
        PaymentProvider::Stripe,
        session.id,
        kind,
        event.event_type,
    );
    if let Some(customer) = customer_id {
        notification = notification.with_customer(customer);
    }
    if let Some(subscription) = subscription_id {
        notification = notification.with_subscription(subscription);
    }
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(payment_status: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_test_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "payment_status": payment_status,
                "customer": "cus_test_123",
                "subscription": "sub_test_123"
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_paid_session_maps_to_succeeded() {
        let n = parse_notification(&completed("paid")).unwrap();
        assert_eq!(n.provider, PaymentProvider::Stripe);
        assert_eq!(n.external_id, "cs_test_123");
        assert_eq!(n.kind, NotificationKind::Succeeded);
        assert_eq!(n.customer_id.as_deref(), Some("cus_test_123"));
        assert_eq!(n.subscription_id.as_deref(), Some("sub_test_123"));
    }

    #[test]
    fn test_unpaid_session_maps_to_pending() {
        let n = parse_notification(&completed("unpaid")).unwrap();
        assert_eq!(n.kind, NotificationKind::Pending);
    }

    #[test]
    fn test_expired_session_maps_to_canceled() {
        let body = serde_json::to_vec(&json!({
            "type": "checkout.session.expired",
            "data": { "object": { "id": "cs_test_exp" } }
        }))
        .unwrap();
        let n = parse_notification(&body).unwrap();
        assert_eq!(n.kind, NotificationKind::Canceled);
        assert_eq!(n.external_id, "cs_test_exp");
    }

    #[test]
    fn test_expanded_customer_object() {
        let body = serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_obj",
                "payment_status": "paid",
                "customer": { "id": "cus_expanded" }
            }}
        }))
        .unwrap();
        let n = parse_notification(&body).unwrap();
        assert_eq!(n.customer_id.as_deref(), Some("cus_expanded"));
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let body = serde_json::to_vec(&json!({
            "type": "customer.created",
            "data": { "object": { "id": "cus_new" } }
        }))
        .unwrap();
        let n = parse_notification(&body).unwrap();
        assert_eq!(n.kind, NotificationKind::Ignored);
    }

    #[test]
    fn test_missing_payment_status_is_malformed() {
        let body = serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_123" } }
        }))
        .unwrap();
        let err = parse_notification(&body).unwrap_err();
        assert!(matches!(err, PayError::MalformedPayload(_)));
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        assert!(matches!(
            parse_notification(b"not json").unwrap_err(),
            PayError::MalformedPayload(_)
        ));
    }

    #[tokio::test]
    async fn test_mock_client_artifact_shape() {
        let client = MockStripeClient::new("http://localhost:3000");
        let artifact = client
            .create_checkout_session(&CheckoutSessionRequest {
                plan_id: "monthly_tier_1".into(),
                plan_name: "Monthly Basic Plan".into(),
                amount: 500,
                currency: "usd".into(),
                subscription: true,
                customer_email: None,
                client_reference_id: "usr_1".into(),
                success_url: "http://localhost:3000/payment/success".into(),
                cancel_url: "http://localhost:3000/payment/cancel".into(),
            })
            .await
            .unwrap();
        assert!(artifact.session_id.starts_with("cs_test_monthly_tier_1_"));
        assert!(artifact.checkout_url.contains(&artifact.session_id));
    }
}
