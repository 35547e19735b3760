//! Provider-Agnostic Notifications
//!
//! Gateways authenticate and parse raw webhook bodies into this shape;
//! the reconciler consumes it without knowing provider field paths.

use serde::{Deserialize, Serialize};

use crate::model::{PaymentProvider, PaymentStatus};

/// What a provider notification reports about a payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Funds confirmed; fulfill the purchase
    Succeeded,
    /// The attempt failed
    Failed,
    /// The charge expired or was canceled before completion
    Canceled,
    /// Still in flight (e.g. checkout completed but unpaid)
    Pending,
    /// Event type carries no reconciliation action
    Ignored,
}

impl NotificationKind {
    /// Internal status this notification targets, when it targets one
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            NotificationKind::Succeeded => Some(PaymentStatus::Succeeded),
            NotificationKind::Failed => Some(PaymentStatus::Failed),
            NotificationKind::Canceled => Some(PaymentStatus::Canceled),
            NotificationKind::Pending => Some(PaymentStatus::Processing),
            NotificationKind::Ignored => None,
        }
    }
}

/// A parsed, authenticated webhook notification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub provider: PaymentProvider,

    /// The provider's transaction id; reconciliation join key together
    /// with `provider`
    pub external_id: String,

    pub kind: NotificationKind,

    /// Provider event name, kept for audit trails ("checkout.session.completed")
    pub event_type: String,

    /// Provider-side customer id, when the envelope carries one; used
    /// to lazily populate the user's customer join key
    #[serde(default)]
    pub customer_id: Option<String>,

    /// Provider-side subscription id, for subscription checkouts
    #[serde(default)]
    pub subscription_id: Option<String>,
}

impl Notification {
    pub fn new(
        provider: PaymentProvider,
        external_id: impl Into<String>,
        kind: NotificationKind,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
            kind,
            event_type: event_type.into(),
            customer_id: None,
            subscription_id: None,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }
}
