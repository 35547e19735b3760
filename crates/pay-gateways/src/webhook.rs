//! Webhook Gateways
//!
//! One gateway per provider, binding its signature scheme to its payload
//! parser. Verification always runs before the body is parsed.

use pay_core::{Notification, PaymentProvider, PayError, Result};

use crate::signature::WebhookVerifier;
use crate::{crypto, pix, stripe};

/// How the provider signs deliveries
#[derive(Clone, Copy, Debug)]
enum SignatureScheme {
    /// `t=…,v1=…` over `"<ts>.<body>"` (Stripe)
    Timestamped,
    /// Hex HMAC of the raw body (PIX, crypto processor)
    RawBody,
}

/// Authenticated webhook entry point for one provider
#[derive(Clone)]
pub struct WebhookGateway {
    provider: PaymentProvider,
    verifier: WebhookVerifier,
    scheme: SignatureScheme,
    signature_header: &'static str,
}

impl WebhookGateway {
    pub fn stripe(verifier: WebhookVerifier) -> Self {
        Self {
            provider: PaymentProvider::Stripe,
            verifier,
            scheme: SignatureScheme::Timestamped,
            signature_header: "stripe-signature",
        }
    }

    pub fn pix(verifier: WebhookVerifier) -> Self {
        Self {
            provider: PaymentProvider::Pix,
            verifier,
            scheme: SignatureScheme::RawBody,
            signature_header: "x-pix-signature",
        }
    }

    pub fn crypto(verifier: WebhookVerifier) -> Self {
        Self {
            provider: PaymentProvider::Crypto,
            verifier,
            scheme: SignatureScheme::RawBody,
            signature_header: "x-cc-webhook-signature",
        }
    }

    pub fn provider(&self) -> PaymentProvider {
        self.provider
    }

    /// Header the provider carries its signature in
    pub fn signature_header(&self) -> &'static str {
        self.signature_header
    }

    /// Authenticate the delivery, then parse it
    ///
    /// A missing header fails closed before any payload inspection.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<Notification> {
        let signature = signature.ok_or_else(|| {
            PayError::AuthenticationFailed(format!("missing {} header", self.signature_header))
        })?;
        match self.scheme {
            SignatureScheme::Timestamped => self.verifier.verify_timestamped(payload, signature)?,
            SignatureScheme::RawBody => self.verifier.verify_raw(payload, signature)?,
        }
        match self.provider {
            PaymentProvider::Stripe => stripe::parse_notification(payload),
            PaymentProvider::Pix => pix::parse_notification(payload),
            PaymentProvider::Crypto => crypto::parse_notification(payload),
            PaymentProvider::Mock => Err(PayError::Config(
                "mock provider has no webhook gateway".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pay_core::NotificationKind;
    use serde_json::json;

    const SECRET: &str = "whsec_gateway_secret";

    #[test]
    fn test_stripe_gateway_verifies_then_parses() {
        let gateway = WebhookGateway::stripe(WebhookVerifier::new(SECRET));
        let body = serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_1", "payment_status": "paid" } }
        }))
        .unwrap();
        let header = WebhookVerifier::new(SECRET)
            .timestamped_header(&body, Utc::now().timestamp())
            .unwrap();

        let n = gateway.verify_and_parse(&body, Some(&header)).unwrap();
        assert_eq!(n.kind, NotificationKind::Succeeded);
    }

    #[test]
    fn test_missing_signature_rejected_before_parse() {
        let gateway = WebhookGateway::pix(WebhookVerifier::new(SECRET));
        // Body is garbage; the authentication failure must come first
        let err = gateway.verify_and_parse(b"not json", None).unwrap_err();
        assert!(matches!(err, PayError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let gateway = WebhookGateway::crypto(WebhookVerifier::new(SECRET));
        let body = serde_json::to_vec(&json!({
            "event": { "type": "charge:confirmed", "data": { "code": "C1" } }
        }))
        .unwrap();
        let sig = WebhookVerifier::new("whsec_wrong").sign_raw(&body).unwrap();
        let err = gateway.verify_and_parse(&body, Some(&sig)).unwrap_err();
        assert!(matches!(err, PayError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_valid_signature_with_malformed_body() {
        let gateway = WebhookGateway::pix(WebhookVerifier::new(SECRET));
        let body = b"{\"unexpected\":true}";
        let sig = WebhookVerifier::new(SECRET).sign_raw(body).unwrap();
        let err = gateway.verify_and_parse(body, Some(&sig)).unwrap_err();
        assert!(matches!(err, PayError::MalformedPayload(_)));
    }
}
