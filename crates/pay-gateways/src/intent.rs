//! Payment Intent Service
//!
//! Turns `(user, plan)` into a provider artifact and a durable pending
//! payment row. The row is what the webhook reconciler later joins on,
//! so creation is not optional: no artifact leaves this service without
//! its payment record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::info;

use pay_core::{
    Payment, PaymentProvider, PaymentStore, Plan, PlanCatalog, PlanKind, PayError, Result, User,
};

use crate::crypto::{CryptoAsset, CryptoChargeRequest, CryptoProcessorApi};
use crate::pix::{PixApi, PixChargeRequest, PIX_CURRENCY};
use crate::rates::{crypto_amount, RateSource};
use crate::stripe::{CheckoutSessionRequest, StripeApi};

/// Stripe checkout artifact returned to the caller
#[derive(Clone, Debug, Serialize)]
pub struct StripeCheckout {
    pub checkout_url: String,
    pub session_id: String,
}

/// PIX order artifact returned to the caller
#[derive(Clone, Debug, Serialize)]
pub struct PixOrder {
    pub qr_code: String,
    pub payment_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Crypto intent artifact returned to the caller
#[derive(Clone, Debug, Serialize)]
pub struct CryptoIntent {
    pub payment_id: String,
    pub pay_address: String,
    pub amount_due: Decimal,
    pub currency: &'static str,
    pub hosted_url: Option<String>,
}

/// Intent creation across the configured providers
pub struct IntentService {
    catalog: Arc<PlanCatalog>,
    payments: Arc<dyn PaymentStore>,
    stripe: Arc<dyn StripeApi>,
    pix: Arc<dyn PixApi>,
    crypto: Arc<dyn CryptoProcessorApi>,
    rates: Arc<dyn RateSource>,
    app_url: String,
}

impl IntentService {
    pub fn new(
        catalog: Arc<PlanCatalog>,
        payments: Arc<dyn PaymentStore>,
        stripe: Arc<dyn StripeApi>,
        pix: Arc<dyn PixApi>,
        crypto: Arc<dyn CryptoProcessorApi>,
        rates: Arc<dyn RateSource>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            payments,
            stripe,
            pix,
            crypto,
            rates,
            app_url: app_url.into(),
        }
    }

    /// Open a Stripe checkout session for a plan
    pub async fn create_stripe_checkout(
        &self,
        user: &User,
        plan_id: &str,
    ) -> Result<StripeCheckout> {
        let plan = self.catalog.lookup(plan_id)?;

        let artifact = self
            .stripe
            .create_checkout_session(&CheckoutSessionRequest {
                plan_id: plan.id.clone(),
                plan_name: plan.name.clone(),
                amount: plan.price_amount,
                currency: plan.currency.clone(),
                subscription: plan.kind == PlanKind::Subscription,
                customer_email: user.email.clone(),
                client_reference_id: user.id.to_string(),
                success_url: format!(
                    "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.app_url
                ),
                cancel_url: format!("{}/payment/cancel", self.app_url),
            })
            .await?;

        self.insert_pending(user, plan, PaymentProvider::Stripe, &artifact.session_id, None)?;
        info!(
            user_id = %user.id,
            plan_id = %plan.id,
            session_id = %artifact.session_id,
            "created stripe checkout session"
        );
        Ok(StripeCheckout {
            checkout_url: artifact.checkout_url,
            session_id: artifact.session_id,
        })
    }

    /// Create a PIX charge for a BRL plan
    pub async fn create_pix_order(&self, user: &User, plan_id: &str) -> Result<PixOrder> {
        let plan = self.catalog.lookup(plan_id)?;
        if !plan.currency.eq_ignore_ascii_case(PIX_CURRENCY) {
            return Err(PayError::CurrencyMismatch {
                plan_id: plan.id.clone(),
                currency: plan.currency.clone(),
                expected: PIX_CURRENCY.into(),
            });
        }

        let artifact = self
            .pix
            .create_charge(&PixChargeRequest {
                amount: plan.price_amount,
                description: format!("Pagamento para {}", plan.name),
                customer_name: user.name.clone(),
                customer_email: user.email.clone(),
            })
            .await?;

        self.insert_pending(user, plan, PaymentProvider::Pix, &artifact.charge_id, None)?;
        info!(
            user_id = %user.id,
            plan_id = %plan.id,
            charge_id = %artifact.charge_id,
            "created pix charge"
        );
        Ok(PixOrder {
            qr_code: artifact.qr_code,
            payment_id: artifact.charge_id,
            expires_at: artifact.expires_at,
        })
    }

    /// Create a crypto charge for a plan, priced at a point-in-time rate
    pub async fn create_crypto_intent(
        &self,
        user: &User,
        plan_id: &str,
        asset: CryptoAsset,
    ) -> Result<CryptoIntent> {
        let plan = self.catalog.lookup(plan_id)?;
        let rate = self.rates.rate_usd(asset).await?;
        let amount_due = crypto_amount(plan.price_usd, rate)?;

        let artifact = self
            .crypto
            .create_charge(&CryptoChargeRequest {
                name: plan.name.clone(),
                description: format!("Payment for {}", plan.name),
                price_usd: plan.price_usd,
                asset,
                amount_due,
                user_id: user.id.to_string(),
                plan_id: plan.id.clone(),
            })
            .await?;

        // Persist in 1e-8 smallest units so the row stays integral
        let amount_scaled = (amount_due * dec!(100_000_000))
            .trunc()
            .to_i64()
            .ok_or_else(|| PayError::Provider(format!("amount out of range: {}", amount_due)))?;
        self.insert_pending(
            user,
            plan,
            PaymentProvider::Crypto,
            &artifact.charge_code,
            Some((amount_scaled, asset.as_str())),
        )?;
        info!(
            user_id = %user.id,
            plan_id = %plan.id,
            charge_code = %artifact.charge_code,
            asset = %asset,
            %amount_due,
            "created crypto charge"
        );
        Ok(CryptoIntent {
            payment_id: artifact.charge_code,
            pay_address: artifact.pay_address,
            amount_due,
            currency: asset.as_str(),
            hosted_url: artifact.hosted_url,
        })
    }

    fn insert_pending(
        &self,
        user: &User,
        plan: &Plan,
        provider: PaymentProvider,
        external_id: &str,
        crypto_denomination: Option<(i64, &str)>,
    ) -> Result<()> {
        let (amount, currency) = match crypto_denomination {
            Some((amount, asset)) => (amount, asset.to_string()),
            None => (plan.price_amount, plan.currency.clone()),
        };
        self.payments.insert(
            Payment::pending(user.id.clone(), provider, external_id, amount, currency)
                .with_plan(plan.id.clone(), plan.name.clone()),
        )
    }
}
