//! Webhook Reconciler
//!
//! Applies authenticated, parsed provider notifications to payment rows
//! and user entitlements. Safe under duplicate, out-of-order, and
//! concurrent delivery: the status transition is a compare-and-set and
//! `Succeeded` is never left once reached.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{payment_event, AuditEvent, AuditSink, OnboardingHook};
use crate::catalog::{Plan, PlanCatalog, PlanKind};
use crate::error::{PayError, Result};
use crate::model::{Payment, PaymentStatus, SubscriptionStatus, User};
use crate::notification::{Notification, NotificationKind};
use crate::store::{PaymentStore, Transition, UserStore};

/// What a delivery amounted to
///
/// Every variant is acknowledged to the provider; only store errors
/// propagate (so the provider retries).
#[derive(Clone, Debug)]
pub enum ReconcileOutcome {
    /// The transition was applied; entitlements updated on success
    Applied { payment: Payment },
    /// Re-delivery of an already-applied confirmation; no-op
    AlreadyProcessed { external_id: String },
    /// No payment row matches the external id (test fixture, or a race
    /// with intent creation)
    NotFound { external_id: String },
    /// The event carries no action, or arrived after a terminal state
    Ignored { reason: String },
}

/// Reconciliation engine
pub struct Reconciler {
    payments: Arc<dyn PaymentStore>,
    users: Arc<dyn UserStore>,
    catalog: Arc<PlanCatalog>,
    audit: Arc<dyn AuditSink>,
    onboarding: Arc<dyn OnboardingHook>,
}

impl Reconciler {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        users: Arc<dyn UserStore>,
        catalog: Arc<PlanCatalog>,
        audit: Arc<dyn AuditSink>,
        onboarding: Arc<dyn OnboardingHook>,
    ) -> Self {
        Self {
            payments,
            users,
            catalog,
            audit,
            onboarding,
        }
    }

    /// Process one authenticated notification
    pub fn reconcile(&self, notification: &Notification) -> Result<ReconcileOutcome> {
        let Some(target) = notification.kind.target_status() else {
            debug!(
                provider = %notification.provider,
                event_type = %notification.event_type,
                "no action configured for event"
            );
            return Ok(ReconcileOutcome::Ignored {
                reason: format!("unhandled event type {}", notification.event_type),
            });
        };

        let Some(payment) = self
            .payments
            .find_by_external_id(notification.provider, &notification.external_id)?
        else {
            warn!(
                provider = %notification.provider,
                external_id = %notification.external_id,
                "no payment record for notification; may need manual reconciliation"
            );
            return Ok(ReconcileOutcome::NotFound {
                external_id: notification.external_id.clone(),
            });
        };

        // Fast path for redeliveries that already landed; the CAS below
        // still catches the concurrent ones
        if payment.status == target && payment.status.is_terminal() {
            info!(
                payment_id = %payment.id,
                status = %payment.status,
                "notification re-delivered; already processed"
            );
            return Ok(ReconcileOutcome::AlreadyProcessed {
                external_id: notification.external_id.clone(),
            });
        }

        // Patch iff the current status is still in flight; the CAS
        // winner alone applies entitlement effects
        let from = match target {
            PaymentStatus::Processing => &[PaymentStatus::Pending][..],
            _ => &[
                PaymentStatus::Pending,
                PaymentStatus::Processing,
                PaymentStatus::RequiresAction,
            ][..],
        };

        match self.payments.transition(
            notification.provider,
            &notification.external_id,
            from,
            target,
        )? {
            Transition::AlreadyInTarget(p) => {
                info!(
                    payment_id = %p.id,
                    status = %p.status,
                    "notification re-delivered; already processed"
                );
                Ok(ReconcileOutcome::AlreadyProcessed {
                    external_id: notification.external_id.clone(),
                })
            }
            Transition::Superseded(p) => {
                debug!(
                    payment_id = %p.id,
                    current = %p.status,
                    target = %target,
                    "out-of-order delivery ignored"
                );
                Ok(ReconcileOutcome::Ignored {
                    reason: format!("payment already {}", p.status),
                })
            }
            Transition::Applied(p) => {
                info!(
                    payment_id = %p.id,
                    provider = %p.provider,
                    external_id = %p.external_payment_id,
                    status = %p.status,
                    "payment transitioned"
                );
                if target == PaymentStatus::Succeeded {
                    self.fulfill(&p, notification)?;
                } else {
                    self.audit.emit(payment_event(
                        &format!("payment.{}", target),
                        &p.user_id,
                        p.provider.as_str(),
                        &p.external_payment_id,
                    ));
                }
                Ok(ReconcileOutcome::Applied { payment: p })
            }
        }
    }

    /// Apply entitlement effects for a payment that just succeeded
    ///
    /// Runs only for the CAS winner, so effects apply exactly once per
    /// external payment id.
    fn fulfill(&self, payment: &Payment, notification: &Notification) -> Result<()> {
        let plan = payment
            .plan_id
            .as_deref()
            .and_then(|id| self.catalog.lookup(id).ok());
        if payment.plan_id.is_some() && plan.is_none() {
            // Catalog changed since intent creation; credits/periods
            // cannot be derived, journey flags still apply
            warn!(
                payment_id = %payment.id,
                plan_id = ?payment.plan_id,
                "plan missing from catalog at fulfillment time"
            );
        }

        let mut first_success = false;
        let user = self
            .users
            .apply(&payment.user_id, &mut |u| {
                apply_entitlements(u, plan, payment, notification);
                if !u.onboarding_workflow_triggered {
                    u.onboarding_workflow_triggered = true;
                    first_success = true;
                }
            })
            .map_err(|e| match e {
                // Losing the owning user row mid-fulfillment is a store
                // fault worth a retry, not a benign miss
                PayError::RecordNotFound(id) => {
                    PayError::Store(format!("payment {} owned by missing user {}", payment.id, id))
                }
                other => other,
            })?;

        self.audit.emit(payment_event(
            "payment.succeeded",
            &payment.user_id,
            payment.provider.as_str(),
            &payment.external_payment_id,
        ));
        if let Some(plan) = plan {
            let event_name = match plan.kind {
                PlanKind::Subscription => "entitlement.subscription_activated",
                PlanKind::OneTime => "entitlement.credits_granted",
            };
            self.audit.emit(AuditEvent::new(
                event_name,
                Some(user.id.clone()),
                json!({ "plan_id": plan.id, "credit_grant": plan.credit_grant }),
            ));
        }
        if first_success {
            self.onboarding.trigger(&user);
            self.audit.emit(AuditEvent::new(
                "onboarding.triggered",
                Some(user.id.clone()),
                json!({ "external_id": payment.external_payment_id }),
            ));
        }
        Ok(())
    }
}

/// Patch the user's entitlement fields for a fulfilled payment
fn apply_entitlements(
    user: &mut User,
    plan: Option<&Plan>,
    payment: &Payment,
    notification: &Notification,
) {
    match plan.map(|p| p.kind) {
        Some(PlanKind::Subscription) => {
            let now = Utc::now();
            user.subscription_status = Some(SubscriptionStatus::Active);
            user.active_plan_id = payment.plan_id.clone();
            if let Some(subscription_id) = &notification.subscription_id {
                user.subscription_id = Some(subscription_id.clone());
            }
            user.current_period_start = Some(now);
            user.current_period_end = Some(now + Duration::days(Plan::PERIOD_DAYS));
        }
        Some(PlanKind::OneTime) => {
            if let Some(grant) = plan.and_then(|p| p.credit_grant) {
                user.available_credits += grant;
            }
        }
        None => {}
    }

    if user.stripe_customer_id.is_none() {
        user.stripe_customer_id = notification.customer_id.clone();
    }
    user.journey_payment_completed = true;
    user.last_checkout_session_id = Some(payment.external_payment_id.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{LogOnboardingHook, MemoryAuditSink};
    use crate::model::{PaymentProvider, UserId};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditSink>,
        recon: Reconciler,
        user_id: UserId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let user = User::new("https://issuer|subject-1");
        let user_id = user.id.clone();
        UserStore::insert(store.as_ref(), user).unwrap();

        let recon = Reconciler::new(
            store.clone(),
            store.clone(),
            Arc::new(PlanCatalog::builtin()),
            audit.clone(),
            Arc::new(LogOnboardingHook),
        );
        Fixture {
            store,
            audit,
            recon,
            user_id,
        }
    }

    fn insert_pending(fx: &Fixture, plan_id: &str, external_id: &str) {
        let catalog = PlanCatalog::builtin();
        let plan = catalog.lookup(plan_id).unwrap();
        PaymentStore::insert(
            fx.store.as_ref(),
            Payment::pending(
                fx.user_id.clone(),
                PaymentProvider::Stripe,
                external_id,
                plan.price_amount,
                plan.currency.clone(),
            )
            .with_plan(plan.id.clone(), plan.name.clone()),
        )
        .unwrap();
    }

    fn succeeded(external_id: &str) -> Notification {
        Notification::new(
            PaymentProvider::Stripe,
            external_id,
            NotificationKind::Succeeded,
            "checkout.session.completed",
        )
    }

    #[test]
    fn test_success_activates_subscription() {
        let fx = fixture();
        insert_pending(&fx, "monthly_tier_1", "cs_test_sub");

        let outcome = fx.recon.reconcile(&succeeded("cs_test_sub")).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));

        let user = UserStore::get(fx.store.as_ref(), &fx.user_id).unwrap().unwrap();
        assert_eq!(user.subscription_status, Some(SubscriptionStatus::Active));
        assert_eq!(user.active_plan_id.as_deref(), Some("monthly_tier_1"));
        assert!(user.current_period_end > user.current_period_start);
        assert!(user.journey_payment_completed);
        assert!(user.onboarding_workflow_triggered);
    }

    #[test]
    fn test_duplicate_delivery_grants_once() {
        let fx = fixture();
        insert_pending(&fx, "one_time_credits_pack_1", "cs_test_credits");

        for _ in 0..3 {
            fx.recon.reconcile(&succeeded("cs_test_credits")).unwrap();
        }

        let user = UserStore::get(fx.store.as_ref(), &fx.user_id).unwrap().unwrap();
        assert_eq!(user.available_credits, 100);
        assert_eq!(fx.audit.count_named("entitlement.credits_granted"), 1);
        assert_eq!(fx.audit.count_named("onboarding.triggered"), 1);
    }

    #[test]
    fn test_pending_after_succeeded_is_ignored() {
        let fx = fixture();
        insert_pending(&fx, "monthly_tier_1", "cs_test_ooo");
        fx.recon.reconcile(&succeeded("cs_test_ooo")).unwrap();

        let late = Notification::new(
            PaymentProvider::Stripe,
            "cs_test_ooo",
            NotificationKind::Pending,
            "checkout.session.completed",
        );
        let outcome = fx.recon.reconcile(&late).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Ignored { .. }));

        let payment = fx
            .store
            .find_by_external_id(PaymentProvider::Stripe, "cs_test_ooo")
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn test_unknown_external_id_acknowledged() {
        let fx = fixture();
        let outcome = fx.recon.reconcile(&succeeded("cs_test_ghost")).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::NotFound { .. }));
        assert_eq!(fx.audit.count_named("payment.succeeded"), 0);
    }

    #[test]
    fn test_failure_does_not_touch_entitlements() {
        let fx = fixture();
        insert_pending(&fx, "monthly_tier_1", "cs_test_fail");

        let failed = Notification::new(
            PaymentProvider::Stripe,
            "cs_test_fail",
            NotificationKind::Failed,
            "invoice.payment_failed",
        );
        fx.recon.reconcile(&failed).unwrap();

        let user = UserStore::get(fx.store.as_ref(), &fx.user_id).unwrap().unwrap();
        assert_eq!(user.subscription_status, None);
        assert!(!user.journey_payment_completed);
        let payment = fx
            .store
            .find_by_external_id(PaymentProvider::Stripe, "cs_test_fail")
            .unwrap()
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn test_onboarding_triggered_once_across_payments() {
        let fx = fixture();
        insert_pending(&fx, "monthly_tier_1", "cs_test_first");
        insert_pending(&fx, "one_time_credits_pack_1", "cs_test_second");

        fx.recon.reconcile(&succeeded("cs_test_first")).unwrap();
        fx.recon.reconcile(&succeeded("cs_test_second")).unwrap();

        assert_eq!(fx.audit.count_named("onboarding.triggered"), 1);
        let user = UserStore::get(fx.store.as_ref(), &fx.user_id).unwrap().unwrap();
        // Second success still granted its credits
        assert_eq!(user.available_credits, 100);
    }

    #[test]
    fn test_customer_id_lazily_populated() {
        let fx = fixture();
        insert_pending(&fx, "monthly_tier_1", "cs_test_cust");

        let mut n = succeeded("cs_test_cust");
        n.customer_id = Some("cus_test_1".into());
        fx.recon.reconcile(&n).unwrap();

        let user = UserStore::get(fx.store.as_ref(), &fx.user_id).unwrap().unwrap();
        assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_test_1"));
    }
}
