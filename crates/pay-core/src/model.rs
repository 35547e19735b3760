//! Domain Models
//!
//! Payment and user records shared by intent creation and reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment record id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn generate() -> Self {
        Self(format!("pay_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User record id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        Self(format!("usr_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment providers that can confirm a purchase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Pix,
    Crypto,
    Mock,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Pix => "pix",
            PaymentProvider::Crypto => "crypto",
            PaymentProvider::Mock => "mock",
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle status
///
/// Transitions are monotonic once a terminal state is reached:
/// `Succeeded` is never left, and `Failed`/`Canceled` are only followed
/// by a fresh payment attempt, never resurrected in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    RequiresAction,
    Canceled,
}

impl PaymentStatus {
    /// Terminal states accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Failed | PaymentStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchase attempt
///
/// Created by the intent service in `Pending`; mutated only by the
/// reconciler; never deleted. `(provider, external_payment_id)` is the
/// join key for webhook notifications.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    /// Owning user (immutable after creation)
    pub user_id: UserId,

    /// Plan purchased, when the payment maps to a catalog plan
    pub plan_id: Option<String>,

    /// Human-readable description (plan display name)
    pub description: Option<String>,

    /// Amount in the smallest unit of `currency`, snapshotted at
    /// creation time and never re-derived
    pub amount: i64,

    /// Currency code ("usd", "brl") or crypto asset code ("BTC")
    pub currency: String,

    pub provider: PaymentProvider,

    /// The provider's identifier for this transaction
    pub external_payment_id: String,

    pub status: PaymentStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new pending payment for a provider-issued external id
    pub fn pending(
        user_id: UserId,
        provider: PaymentProvider,
        external_payment_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::generate(),
            user_id,
            plan_id: None,
            description: None,
            amount,
            currency: currency.into(),
            provider,
            external_payment_id: external_payment_id.into(),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_plan(mut self, plan_id: impl Into<String>, description: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self.description = Some(description.into());
        self
    }
}

/// Subscription lifecycle on the user record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    FreeTrial,
    Active,
    PastDue,
    Canceled,
    Ended,
    Incomplete,
}

/// Long-lived user aggregate
///
/// Entitlement fields are the target of every successful
/// reconciliation and are mutated only by the reconciler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    /// External identity join key (issuer-prefixed subject)
    pub token_identifier: String,

    pub email: Option<String>,
    pub name: Option<String>,

    // Subscription & credits
    pub subscription_status: Option<SubscriptionStatus>,
    pub active_plan_id: Option<String>,
    pub subscription_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,

    /// Consumable balance for one-time credit packs
    pub available_credits: i64,

    // Payment provider specific
    pub stripe_customer_id: Option<String>,

    // Journey markers, also read as idempotence guards
    pub onboarding_workflow_triggered: bool,
    pub journey_payment_completed: bool,
    pub last_checkout_session_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh user linked to an external identity
    pub fn new(token_identifier: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            token_identifier: token_identifier.into(),
            email: None,
            name: None,
            subscription_status: None,
            active_plan_id: None,
            subscription_id: None,
            current_period_start: None,
            current_period_end: None,
            available_credits: 0,
            stripe_customer_id: None,
            onboarding_workflow_triggered: false,
            journey_payment_completed: false,
            last_checkout_session_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, email: Option<String>, name: Option<String>) -> Self {
        self.email = email;
        self.name = name;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Canceled.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        assert!(!PaymentStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn test_pending_payment_snapshot() {
        let payment = Payment::pending(
            UserId::generate(),
            PaymentProvider::Stripe,
            "cs_test_abc",
            500,
            "usd",
        )
        .with_plan("monthly_tier_1", "Monthly Basic Plan");

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 500);
        assert_eq!(payment.external_payment_id, "cs_test_abc");
        assert_eq!(payment.plan_id.as_deref(), Some("monthly_tier_1"));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&PaymentStatus::RequiresAction).unwrap();
        assert_eq!(json, "\"requires_action\"");
    }
}
