//! Audit Trail & Onboarding Hooks
//!
//! Fire-and-forget collaborators: a sink failure must never fail the
//! reconciliation that emitted the event.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::model::{User, UserId};

/// A structured audit event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event name ("payment.succeeded", "entitlement.credits_granted")
    pub name: String,

    pub user_id: Option<UserId>,

    /// Payload summary, never the raw provider body
    pub detail: serde_json::Value,

    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(name: impl Into<String>, user_id: Option<UserId>, detail: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            user_id,
            detail,
            at: Utc::now(),
        }
    }
}

/// External audit log boundary
pub trait AuditSink: Send + Sync {
    /// Record an event; implementations swallow their own failures
    fn emit(&self, event: AuditEvent);
}

/// Sink that forwards events to the tracing pipeline
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        tracing::info!(
            audit = %event.name,
            user_id = event.user_id.as_ref().map(UserId::as_str),
            detail = %event.detail,
            "audit event"
        );
    }
}

/// In-memory sink (for tests)
#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap().clone()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.name == name)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.write().unwrap().push(event);
    }
}

/// Post-payment onboarding workflow boundary
///
/// The reconciler calls this at most once per user, guarded by
/// `User::onboarding_workflow_triggered`.
pub trait OnboardingHook: Send + Sync {
    fn trigger(&self, user: &User);
}

/// Hook that only records the trigger in the log stream
#[derive(Default)]
pub struct LogOnboardingHook;

impl OnboardingHook for LogOnboardingHook {
    fn trigger(&self, user: &User) {
        tracing::info!(user_id = %user.id, "onboarding workflow triggered");
    }
}

/// Convenience constructor for payment lifecycle events
pub fn payment_event(
    name: &str,
    user_id: &UserId,
    provider: &str,
    external_id: &str,
) -> AuditEvent {
    AuditEvent::new(
        name,
        Some(user_id.clone()),
        json!({ "provider": provider, "external_id": external_id }),
    )
}
