//! Webhook Signature Verification
//!
//! HMAC-SHA256 over the raw request body, verified before anything in
//! the payload is parsed or acted on. Fails closed: a missing secret,
//! a missing header, or a mismatch all reject the delivery.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use pay_core::{PayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew for timestamped signatures (Stripe scheme)
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Shared-secret webhook verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }

    /// A verifier with no secret rejects every delivery
    pub fn unconfigured() -> Self {
        Self { secret: None }
    }

    pub fn from_optional(secret: Option<String>) -> Self {
        Self { secret }
    }

    fn secret(&self) -> Result<&str> {
        self.secret.as_deref().ok_or_else(|| {
            PayError::AuthenticationFailed("webhook secret not configured".into())
        })
    }

    /// Verify a plain hex HMAC of the raw body (PIX / crypto scheme)
    pub fn verify_raw(&self, payload: &[u8], signature_hex: &str) -> Result<()> {
        let expected = self.sign_raw(payload)?;
        if !constant_time_eq(signature_hex.as_bytes(), expected.as_bytes()) {
            warn!("webhook signature mismatch");
            return Err(PayError::AuthenticationFailed(
                "signature mismatch".into(),
            ));
        }
        Ok(())
    }

    /// Verify a Stripe-style `t=<ts>,v1=<hex>` header over `"<ts>.<body>"`
    pub fn verify_timestamped(&self, payload: &[u8], header: &str) -> Result<()> {
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;
        for part in header.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }
        let timestamp = timestamp.ok_or_else(|| {
            PayError::AuthenticationFailed("missing timestamp in signature header".into())
        })?;
        let sig_v1 = sig_v1.ok_or_else(|| {
            PayError::AuthenticationFailed("missing v1 signature in header".into())
        })?;

        let expected = self.sign_timestamped(payload, timestamp)?;
        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            warn!("webhook signature mismatch");
            return Err(PayError::AuthenticationFailed(
                "signature mismatch".into(),
            ));
        }

        let ts: i64 = timestamp.parse().map_err(|_| {
            PayError::AuthenticationFailed("invalid timestamp format".into())
        })?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
            warn!(timestamp = ts, now, "webhook timestamp outside tolerance");
            return Err(PayError::AuthenticationFailed("timestamp too old".into()));
        }
        Ok(())
    }

    /// Hex HMAC of the raw body; also used by tests to build deliveries
    pub fn sign_raw(&self, payload: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret()?.as_bytes())
            .map_err(|_| PayError::Config("HMAC key error".into()))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Hex HMAC of `"<ts>.<body>"` for the timestamped scheme
    pub fn sign_timestamped(&self, payload: &[u8], timestamp: &str) -> Result<String> {
        let body = std::str::from_utf8(payload)
            .map_err(|_| PayError::AuthenticationFailed("payload is not UTF-8".into()))?;
        let signed_payload = format!("{}.{}", timestamp, body);
        let mut mac = HmacSha256::new_from_slice(self.secret()?.as_bytes())
            .map_err(|_| PayError::Config("HMAC key error".into()))?;
        mac.update(signed_payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Full `t=…,v1=…` header value for a body (test helper)
    pub fn timestamped_header(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let sig = self.sign_timestamped(payload, &timestamp.to_string())?;
        Ok(format!("t={},v1={}", timestamp, sig))
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
