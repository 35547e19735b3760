//! # pay-gateways
//!
//! Provider gateways for the payment subsystem: Stripe hosted checkout,
//! PIX charges, and processor-hosted crypto charges.
//!
//! ## Two directions per provider
//!
//! ```text
//! outbound (intent):   IntentService ──▶ StripeApi / PixApi / CryptoProcessorApi
//!                                        live client (SDK/REST) or mock, injected
//!
//! inbound (webhook):   raw body ──▶ WebhookGateway ──▶ Notification
//!                                  verify HMAC first, parse second
//! ```
//!
//! Live and mock clients implement the same capability traits and are
//! selected by configuration; nothing here switches on compile-time
//! flags or commented-out code paths.

pub mod crypto;
pub mod intent;
pub mod pix;
pub mod rates;
pub mod signature;
pub mod stripe;
pub mod webhook;

pub use crypto::{
    CryptoAsset, CryptoChargeRequest, CryptoProcessorApi, HttpCryptoClient, MockCryptoClient,
};
pub use intent::{CryptoIntent, IntentService, PixOrder, StripeCheckout};
pub use pix::{HttpPixClient, MockPixClient, PixApi, PixChargeRequest, PIX_CURRENCY};
pub use rates::{crypto_amount, FixedRateTable, RateSource};
pub use signature::WebhookVerifier;
pub use stripe::{CheckoutSessionRequest, LiveStripeClient, MockStripeClient, StripeApi};
pub use webhook::WebhookGateway;
