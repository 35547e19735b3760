//! Crypto Gateway
//!
//! Processor-hosted crypto charges: a deposit address and an exact
//! asset amount derived from the plan's USD reference price. Event
//! envelopes follow the processor's `event.type` / `event.data.code`
//! shape.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pay_core::{Notification, NotificationKind, PayError, PaymentProvider, Result};

/// Assets the catalog can be paid in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CryptoAsset {
    /// Ether
    #[serde(rename = "ETH")]
    Eth,
    /// USDC on Ethereum (ERC-20)
    #[serde(rename = "USDC_ETH")]
    UsdcEth,
    /// Bitcoin
    #[serde(rename = "BTC")]
    Btc,
    /// USDC on Solana (SPL token)
    #[serde(rename = "SOL_USDC")]
    SolUsdc,
}

impl CryptoAsset {
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoAsset::Eth => "ETH",
            CryptoAsset::UsdcEth => "USDC_ETH",
            CryptoAsset::Btc => "BTC",
            CryptoAsset::SolUsdc => "SOL_USDC",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ETH" => Ok(CryptoAsset::Eth),
            "USDC_ETH" => Ok(CryptoAsset::UsdcEth),
            "BTC" => Ok(CryptoAsset::Btc),
            "SOL_USDC" => Ok(CryptoAsset::SolUsdc),
            other => Err(PayError::UnsupportedAsset(other.to_string())),
        }
    }
}

impl std::fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charge creation input
#[derive(Clone, Debug)]
pub struct CryptoChargeRequest {
    pub name: String,
    pub description: String,
    /// Fixed price in USD the processor quotes against
    pub price_usd: Decimal,
    pub asset: CryptoAsset,
    /// Exact asset amount due, already rate-converted
    pub amount_due: Decimal,
    pub user_id: String,
    pub plan_id: String,
}

/// Provider artifact for a created charge
#[derive(Clone, Debug)]
pub struct CryptoArtifact {
    /// Processor charge code; reconciliation join key
    pub charge_code: String,
    pub pay_address: String,
    /// Processor-hosted payment page, when offered
    pub hosted_url: Option<String>,
}

/// Crypto payment processor capability
#[async_trait]
pub trait CryptoProcessorApi: Send + Sync {
    async fn create_charge(&self, request: &CryptoChargeRequest) -> Result<CryptoArtifact>;
}

/// REST client for a hosted crypto processor
pub struct HttpCryptoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCryptoClient {
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
    code: String,
    address: String,
    hosted_url: Option<String>,
}

#[async_trait]
impl CryptoProcessorApi for HttpCryptoClient {
    async fn create_charge(&self, request: &CryptoChargeRequest) -> Result<CryptoArtifact> {
        let body = serde_json::json!({
            "name": request.name,
            "description": request.description,
            "pricing_type": "fixed_price",
            "local_price": { "amount": request.price_usd.to_string(), "currency": "USD" },
            "requested_asset": request.asset.as_str(),
            "metadata": { "user_id": request.user_id, "plan_id": request.plan_id },
        });
        let response = self
            .http
            .post(format!("{}/charges", self.base_url))
            .header("X-CC-Api-Key", &self.api_key)
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
        Ok(CryptoArtifact {
            charge_code: charge.code,
            pay_address: charge.address,
            hosted_url: charge.hosted_url,
        })
    }
}

/// Mock processor synthesizing deposit addresses
pub struct MockCryptoClient;

#[async_trait]
impl CryptoProcessorApi for MockCryptoClient {
    async fn create_charge(&self, request: &CryptoChargeRequest) -> Result<CryptoArtifact> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let charge_code = format!("crypto_mock_{}_{}", request.plan_id, &nonce[..12]);
        let pay_address = match request.asset {
            CryptoAsset::Btc => format!("mock_btc_address_{}", &nonce[..8]),
            asset => format!("0xMock{}Addr{}", asset.as_str().replace('_', ""), &nonce[..8]),
        };
        tracing::debug!(charge_code = %charge_code, "synthesized mock crypto charge");
        Ok(CryptoArtifact {
            charge_code,
            pay_address,
            hosted_url: None,
        })
    }
}

// ============================================================================
// Webhook parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawCryptoNotification {
    event: RawCryptoEvent,
}

#[derive(Debug, Deserialize)]
struct RawCryptoEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawCryptoCharge,
}

#[derive(Debug, Deserialize)]
struct RawCryptoCharge {
    code: String,
}

/// Parse a verified crypto processor notification body
pub fn parse_notification(payload: &[u8]) -> Result<Notification> {
    let raw: RawCryptoNotification = serde_json::from_slice(payload)
        .map_err(|e| PayError::MalformedPayload(e.to_string()))?;

    let kind = match raw.event.event_type.as_str() {
        "charge:confirmed" | "transaction:confirmed" => NotificationKind::Succeeded,
        "charge:failed" | "charge:pending_failure" => NotificationKind::Failed,
        "charge:pending" | "charge:created" => NotificationKind::Pending,
        _ => NotificationKind::Ignored,
    };
    Ok(Notification::new(
        PaymentProvider::Crypto,
        raw.event.data.code,
        kind,
        raw.event.event_type,
    ))
}
