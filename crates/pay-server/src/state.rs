//! Application State

use std::sync::Arc;

use pay_core::{
    LogOnboardingHook, MemoryStore, PaymentStore, PlanCatalog, Reconciler, Result,
    TracingAuditSink, UserStore,
};
use pay_gateways::{
    FixedRateTable, HttpCryptoClient, HttpPixClient, IntentService, LiveStripeClient,
    MockCryptoClient, MockPixClient, MockStripeClient, WebhookGateway, WebhookVerifier,
};

use crate::auth::{IdentityResolver, MockIdentityResolver};
use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,

    pub payments: Arc<dyn PaymentStore>,

    pub intents: Arc<IntentService>,

    pub reconciler: Arc<Reconciler>,

    /// Per-provider webhook entry points
    pub stripe_webhook: WebhookGateway,
    pub pix_webhook: WebhookGateway,
    pub crypto_webhook: WebhookGateway,

    pub identity: Arc<dyn IdentityResolver>,

    /// Which providers run live clients (health reporting)
    pub live_providers: LiveProviders,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LiveProviders {
    pub stripe: bool,
    pub pix: bool,
    pub crypto: bool,
}

impl AppState {
    /// Wire the full state from configuration
    ///
    /// Each provider independently selects its live or mock client;
    /// webhook verifiers are built from whatever secrets exist and fail
    /// closed when one is missing.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(match &config.plan_catalog_path {
            Some(path) => PlanCatalog::from_json_file(path)?,
            None => PlanCatalog::builtin(),
        });

        let stripe: Arc<dyn pay_gateways::StripeApi> = match &config.stripe.api_key {
            Some(key) => Arc::new(LiveStripeClient::new(key)),
            None => Arc::new(MockStripeClient::new(config.app_url.clone())),
        };
        let pix: Arc<dyn pay_gateways::PixApi> =
            match (&config.pix.api_url, &config.pix.api_key) {
                (Some(url), Some(key)) => Arc::new(HttpPixClient::new(url, key)?),
                _ => Arc::new(MockPixClient),
            };
        let crypto: Arc<dyn pay_gateways::CryptoProcessorApi> =
            match (&config.crypto.api_url, &config.crypto.api_key) {
                (Some(url), Some(key)) => Arc::new(HttpCryptoClient::new(url, key)?),
                _ => Arc::new(MockCryptoClient),
            };

        let intents = Arc::new(IntentService::new(
            catalog.clone(),
            store.clone(),
            stripe,
            pix,
            crypto,
            Arc::new(FixedRateTable::builtin()),
            config.app_url.clone(),
        ));

        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            store.clone(),
            catalog,
            Arc::new(TracingAuditSink),
            Arc::new(LogOnboardingHook),
        ));

        Ok(Self {
            users: store.clone(),
            payments: store,
            intents,
            reconciler,
            stripe_webhook: WebhookGateway::stripe(WebhookVerifier::from_optional(
                config.stripe.webhook_secret.clone(),
            )),
            pix_webhook: WebhookGateway::pix(WebhookVerifier::from_optional(
                config.pix.webhook_secret.clone(),
            )),
            crypto_webhook: WebhookGateway::crypto(WebhookVerifier::from_optional(
                config.crypto.webhook_secret.clone(),
            )),
            identity: Arc::new(MockIdentityResolver),
            live_providers: LiveProviders {
                stripe: config.stripe.is_live(),
                pix: config.pix.is_live(),
                crypto: config.crypto.is_live(),
            },
        })
    }
}
