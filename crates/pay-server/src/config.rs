//! Server Configuration
//!
//! Everything comes from the environment. A provider with no API key
//! runs against its mock client; a provider with no webhook secret
//! rejects every delivery (verification fails closed, never open).

use pay_core::{PayError, Result};

/// One provider's credentials
#[derive(Clone, Debug, Default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl ProviderConfig {
    /// Live client configured?
    pub fn is_live(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Base URL the checkout redirects return to
    pub app_url: String,

    pub stripe: ProviderConfig,
    pub pix: ProviderConfig,
    pub crypto: ProviderConfig,

    /// Optional JSON file replacing the builtin plan catalog
    pub plan_catalog_path: Option<std::path::PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("PAY_BIND_ADDR", "0.0.0.0:3000");
        let app_url = env_or("APP_URL", "http://localhost:3000");

        let stripe = ProviderConfig {
            api_key: env_opt("STRIPE_SECRET_KEY"),
            api_url: None,
            webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
        };
        let pix = ProviderConfig {
            api_key: env_opt("PIX_API_KEY"),
            api_url: env_opt("PIX_API_URL"),
            webhook_secret: env_opt("PIX_WEBHOOK_SECRET"),
        };
        let crypto = ProviderConfig {
            api_key: env_opt("CRYPTO_API_KEY"),
            api_url: env_opt("CRYPTO_API_URL"),
            webhook_secret: env_opt("CRYPTO_WEBHOOK_SECRET"),
        };

        if pix.api_key.is_some() && pix.api_url.is_none() {
            return Err(PayError::Config(
                "PIX_API_KEY set without PIX_API_URL".into(),
            ));
        }
        if crypto.api_key.is_some() && crypto.api_url.is_none() {
            return Err(PayError::Config(
                "CRYPTO_API_KEY set without CRYPTO_API_URL".into(),
            ));
        }

        Ok(Self {
            bind_addr,
            app_url,
            stripe,
            pix,
            crypto,
            plan_catalog_path: env_opt("PLAN_CATALOG_PATH").map(Into::into),
        })
    }

    /// Mock-everything config (for tests)
    pub fn mock(webhook_secret: &str) -> Self {
        let provider = ProviderConfig {
            api_key: None,
            api_url: None,
            webhook_secret: Some(webhook_secret.to_string()),
        };
        Self {
            bind_addr: "127.0.0.1:0".into(),
            app_url: "http://localhost:3000".into(),
            stripe: provider.clone(),
            pix: provider.clone(),
            crypto: provider,
            plan_catalog_path: None,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_config_is_not_live() {
        let config = ServerConfig::mock("whsec_test");
        assert!(!config.stripe.is_live());
        assert_eq!(config.stripe.webhook_secret.as_deref(), Some("whsec_test"));
    }
}
