//! PIX Gateway
//!
//! Brazilian instant-payment charges: "copia e cola" QR payloads with a
//! bounded expiry, settled in BRL only. Notification statuses map 1:1
//! onto the internal state machine.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use pay_core::{Notification, NotificationKind, PayError, PaymentProvider, Result};

/// Settlement currency PIX charges require
pub const PIX_CURRENCY: &str = "brl";

/// Minutes until a mock charge expires
const MOCK_EXPIRY_MINUTES: i64 = 30;

/// Charge creation input
#[derive(Clone, Debug)]
pub struct PixChargeRequest {
    /// Amount in BRL cents
    pub amount: i64,
    pub description: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

/// Provider artifact for a created charge
#[derive(Clone, Debug)]
pub struct PixArtifact {
    /// Provider transaction id; reconciliation join key
    pub charge_id: String,
    /// EMV "copia e cola" payload the user pays with
    pub qr_code: String,
    pub expires_at: DateTime<Utc>,
}

/// PIX provider capability
#[async_trait]
pub trait PixApi: Send + Sync {
    async fn create_charge(&self, request: &PixChargeRequest) -> Result<PixArtifact>;
}

/// REST client for a PIX charge provider
pub struct HttpPixClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPixClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PayError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct HttpChargeResponse {
    id: String,
    qr_code_emv: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl PixApi for HttpPixClient {
    async fn create_charge(&self, request: &PixChargeRequest) -> Result<PixArtifact> {
        let body = serde_json::json!({
            "amount": request.amount,
            "description": request.description,
            "customer": {
                "name": request.customer_name,
                "email": request.customer_email,
            },
        });
        let response = self
            .http
            .post(format!("{}/charges", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PayError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| PayError::Provider(e.to_string()))?;

        let charge: HttpChargeResponse = response
            .json()
            .await
            .map_err(|e| PayError::Provider(e.to_string()))?;
        Ok(PixArtifact {
            charge_id: charge.id,
            qr_code: charge.qr_code_emv,
            expires_at: charge.expires_at,
        })
    }
}

/// Mock client synthesizing EMV-shaped payloads
pub struct MockPixClient;

#[async_trait]
impl PixApi for MockPixClient {
    async fn create_charge(&self, request: &PixChargeRequest) -> Result<PixArtifact> {
        let charge_id = format!("pix_mock_{}", uuid::Uuid::new_v4().simple());
        // Simplified "copia e cola" string; real payloads carry more EMV fields
        let qr_code = format!(
            "00020126580014BR.GOV.BCB.PIX0136{}520400005303986540{}5802BR5913{}6009SAO PAULO62070503***6304ABCD",
            charge_id,
            rust_decimal::Decimal::new(request.amount, 2),
            request.customer_name.as_deref().unwrap_or("Mock User Name"),
        );
        tracing::debug!(charge_id = %charge_id, "synthesized mock PIX charge");
        Ok(PixArtifact {
            charge_id,
            qr_code,
            expires_at: Utc::now() + Duration::minutes(MOCK_EXPIRY_MINUTES),
        })
    }
}

// ============================================================================
// Webhook parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPixNotification {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    data: Option<RawPixData>,
    // Some providers flatten id/status to the top level
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPixData {
    #[serde(default)]
    pix_transaction_id: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Parse a verified PIX notification body
pub fn parse_notification(payload: &[u8]) -> Result<Notification> {
    let raw: RawPixNotification = serde_json::from_slice(payload)
        .map_err(|e| PayError::MalformedPayload(e.to_string()))?;

    let external_id = raw
        .data
        .as_ref()
        .and_then(|d| d.pix_transaction_id.clone().or_else(|| d.transaction_id.clone()))
        .or(raw.id)
        .ok_or_else(|| PayError::MalformedPayload("missing transaction id".into()))?;
    let status = raw
        .data
        .as_ref()
        .and_then(|d| d.status.clone())
        .or(raw.status)
        .ok_or_else(|| PayError::MalformedPayload("missing status".into()))?;

    let kind = map_status(&status);
    let event_type = raw
        .event_type
        .unwrap_or_else(|| format!("pix.{}", status.to_lowercase()));
    Ok(Notification::new(
        PaymentProvider::Pix,
        external_id,
        kind,
        event_type,
    ))
}

/// Provider status table: completion synonyms collapse to success,
/// terminations map 1:1
fn map_status(status: &str) -> NotificationKind {
    match status {
        "COMPLETED" | "CONFIRMED" | "PAID" => NotificationKind::Succeeded,
        "FAILED" => NotificationKind::Failed,
        "EXPIRED" | "CANCELED" => NotificationKind::Canceled,
        "PENDING" | "PROCESSING" => NotificationKind::Pending,
        _ => NotificationKind::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(status: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event_type": "pix.payment.update",
            "data": {
                "pix_transaction_id": "E12345678202301011200abcdef123",
                "amount": 2500,
                "status": status,
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_completion_synonyms_map_to_succeeded() {
        for status in ["COMPLETED", "CONFIRMED", "PAID"] {
            let n = parse_notification(&notification(status)).unwrap();
            assert_eq!(n.kind, NotificationKind::Succeeded, "status {}", status);
            assert_eq!(n.external_id, "E12345678202301011200abcdef123");
        }
    }

    #[test]
    fn test_terminations_map_one_to_one() {
        assert_eq!(
            parse_notification(&notification("FAILED")).unwrap().kind,
            NotificationKind::Failed
        );
        for status in ["EXPIRED", "CANCELED"] {
            assert_eq!(
                parse_notification(&notification(status)).unwrap().kind,
                NotificationKind::Canceled
            );
        }
    }

    #[test]
    fn test_top_level_fallback_fields() {
        let body = serde_json::to_vec(&json!({
            "id": "pix_mock_abc",
            "status": "PAID"
        }))
        .unwrap();
        let n = parse_notification(&body).unwrap();
        assert_eq!(n.external_id, "pix_mock_abc");
        assert_eq!(n.kind, NotificationKind::Succeeded);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let no_status = serde_json::to_vec(&json!({
            "data": { "pix_transaction_id": "E123" }
        }))
        .unwrap();
        assert!(matches!(
            parse_notification(&no_status).unwrap_err(),
            PayError::MalformedPayload(_)
        ));

        let no_id = serde_json::to_vec(&json!({
            "data": { "status": "PAID" }
        }))
        .unwrap();
        assert!(matches!(
            parse_notification(&no_id).unwrap_err(),
            PayError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_unknown_status_is_ignored() {
        let n = parse_notification(&notification("UNDER_REVIEW")).unwrap();
        assert_eq!(n.kind, NotificationKind::Ignored);
    }

    #[tokio::test]
    async fn test_mock_charge_artifact() {
        let client = MockPixClient;
        let artifact = client
            .create_charge(&PixChargeRequest {
                amount: 2500,
                description: "Plano Mensal Básico".into(),
                customer_name: None,
                customer_email: None,
            })
            .await
            .unwrap();
        assert!(artifact.charge_id.starts_with("pix_mock_"));
        assert!(artifact.qr_code.contains("BR.GOV.BCB.PIX"));
        assert!(artifact.expires_at > Utc::now());
    }
}
