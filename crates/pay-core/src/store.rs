//! Persistent Store Traits
//!
//! Payment and user rows with the index set reconciliation depends on:
//! payments by `(provider, external_payment_id)` and by owner, users by
//! `token_identifier` and by `stripe_customer_id`.
//!
//! The in-memory implementation backs tests and mock deployments; a
//! database-backed implementation must keep the same contract, in
//! particular the compare-and-set semantics of [`PaymentStore::transition`].

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::{PayError, Result};
use crate::model::{Payment, PaymentId, PaymentProvider, PaymentStatus, User, UserId};

/// Outcome of a compare-and-set status transition
#[derive(Clone, Debug)]
pub enum Transition {
    /// This caller won the transition; the payment is now in the target state
    Applied(Payment),
    /// The payment was already in the target state; nothing changed
    AlreadyInTarget(Payment),
    /// The payment sits in a state outside the allowed `from` set
    /// (typically a terminal state reached by an earlier delivery)
    Superseded(Payment),
}

/// Payment row storage
pub trait PaymentStore: Send + Sync {
    /// Insert a new payment; `(provider, external_payment_id)` must be unique
    fn insert(&self, payment: Payment) -> Result<()>;

    fn get(&self, id: &PaymentId) -> Result<Option<Payment>>;

    /// Reconciliation join: locate by provider-scoped external id
    fn find_by_external_id(
        &self,
        provider: PaymentProvider,
        external_id: &str,
    ) -> Result<Option<Payment>>;

    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Payment>>;

    /// Atomically patch the status iff the current status is in `from`.
    ///
    /// This is the single-writer-per-key discipline: when the same
    /// confirmation is redelivered concurrently, exactly one caller
    /// observes [`Transition::Applied`].
    fn transition(
        &self,
        provider: PaymentProvider,
        external_id: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
    ) -> Result<Transition>;
}

/// User row storage
pub trait UserStore: Send + Sync {
    fn insert(&self, user: User) -> Result<()>;

    fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Identity linking: locate by external identity join key
    fn find_by_token(&self, token_identifier: &str) -> Result<Option<User>>;

    /// Provider-side lookup by lazily assigned customer id
    fn find_by_stripe_customer(&self, customer_id: &str) -> Result<Option<User>>;

    /// Atomic read-modify-write of a single user row
    fn apply(&self, id: &UserId, mutate: &mut dyn FnMut(&mut User)) -> Result<User>;
}

#[derive(Default)]
struct Inner {
    payments: HashMap<PaymentId, Payment>,
    payments_by_external: HashMap<(PaymentProvider, String), PaymentId>,
    users: HashMap<UserId, User>,
    users_by_token: HashMap<String, UserId>,
    users_by_customer: HashMap<String, UserId>,
}

/// In-memory store (for development and tests)
///
/// A single lock over both tables serializes every read-then-patch
/// sequence, which is what gives `transition` its CAS guarantee here.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentStore for MemoryStore {
    fn insert(&self, payment: Payment) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (payment.provider, payment.external_payment_id.clone());
        if inner.payments_by_external.contains_key(&key) {
            return Err(PayError::Store(format!(
                "duplicate external payment id {} for provider {}",
                payment.external_payment_id, payment.provider
            )));
        }
        inner.payments_by_external.insert(key, payment.id.clone());
        inner.payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    fn get(&self, id: &PaymentId) -> Result<Option<Payment>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.payments.get(id).cloned())
    }

    fn find_by_external_id(
        &self,
        provider: PaymentProvider,
        external_id: &str,
    ) -> Result<Option<Payment>> {
        let inner = self.inner.read().unwrap();
        let key = (provider, external_id.to_string());
        Ok(inner
            .payments_by_external
            .get(&key)
            .and_then(|id| inner.payments.get(id))
            .cloned())
    }

    fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Payment>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    fn transition(
        &self,
        provider: PaymentProvider,
        external_id: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
    ) -> Result<Transition> {
        let mut inner = self.inner.write().unwrap();
        let key = (provider, external_id.to_string());
        let Some(id) = inner.payments_by_external.get(&key).cloned() else {
            return Err(PayError::RecordNotFound(external_id.to_string()));
        };
        let payment = inner
            .payments
            .get_mut(&id)
            .ok_or_else(|| PayError::Store(format!("index points at missing payment {}", id)))?;

        if payment.status == to {
            return Ok(Transition::AlreadyInTarget(payment.clone()));
        }
        if !from.contains(&payment.status) {
            return Ok(Transition::Superseded(payment.clone()));
        }
        payment.status = to;
        payment.updated_at = Utc::now();
        Ok(Transition::Applied(payment.clone()))
    }
}

impl UserStore for MemoryStore {
    fn insert(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.users_by_token.contains_key(&user.token_identifier) {
            return Err(PayError::Store(format!(
                "duplicate token identifier {}",
                user.token_identifier
            )));
        }
        inner
            .users_by_token
            .insert(user.token_identifier.clone(), user.id.clone());
        if let Some(customer) = &user.stripe_customer_id {
            inner.users_by_customer.insert(customer.clone(), user.id.clone());
        }
        inner.users.insert(user.id.clone(), user);
        Ok(())
    }

    fn get(&self, id: &UserId) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(id).cloned())
    }

    fn find_by_token(&self, token_identifier: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .users_by_token
            .get(token_identifier)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    fn find_by_stripe_customer(&self, customer_id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .users_by_customer
            .get(customer_id)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    fn apply(&self, id: &UserId, mutate: &mut dyn FnMut(&mut User)) -> Result<User> {
        let mut inner = self.inner.write().unwrap();
        let user = inner
            .users
            .get_mut(id)
            .ok_or_else(|| PayError::RecordNotFound(id.to_string()))?;
        mutate(user);
        let updated = user.clone();
        if let Some(customer) = &updated.stripe_customer_id {
            inner
                .users_by_customer
                .insert(customer.clone(), updated.id.clone());
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        let user = User::new("https://issuer|subject-1");
        let user_id = user.id.clone();
        UserStore::insert(&store, user).unwrap();
        PaymentStore::insert(
            &store,
            Payment::pending(
                user_id.clone(),
                PaymentProvider::Stripe,
                "cs_test_1",
                500,
                "usd",
            ),
        )
        .unwrap();
        (store, user_id)
    }

    #[test]
    fn test_duplicate_external_id_rejected() {
        let (store, user_id) = seeded_store();
        let dup = Payment::pending(user_id, PaymentProvider::Stripe, "cs_test_1", 500, "usd");
        assert!(PaymentStore::insert(&store, dup).is_err());
    }

    #[test]
    fn test_cross_provider_ids_do_not_collide() {
        let (store, user_id) = seeded_store();
        let pix = Payment::pending(user_id, PaymentProvider::Pix, "cs_test_1", 2500, "brl");
        PaymentStore::insert(&store, pix).unwrap();

        let found = store
            .find_by_external_id(PaymentProvider::Pix, "cs_test_1")
            .unwrap()
            .unwrap();
        assert_eq!(found.provider, PaymentProvider::Pix);
        assert_eq!(found.currency, "brl");
    }

    #[test]
    fn test_transition_cas_single_winner() {
        let (store, _) = seeded_store();
        let from = [PaymentStatus::Pending, PaymentStatus::Processing];

        let first = store
            .transition(
                PaymentProvider::Stripe,
                "cs_test_1",
                &from,
                PaymentStatus::Succeeded,
            )
            .unwrap();
        assert!(matches!(first, Transition::Applied(_)));

        let second = store
            .transition(
                PaymentProvider::Stripe,
                "cs_test_1",
                &from,
                PaymentStatus::Succeeded,
            )
            .unwrap();
        assert!(matches!(second, Transition::AlreadyInTarget(_)));
    }

    #[test]
    fn test_transition_never_regresses_from_terminal() {
        let (store, _) = seeded_store();
        let from = [PaymentStatus::Pending, PaymentStatus::Processing];
        store
            .transition(
                PaymentProvider::Stripe,
                "cs_test_1",
                &from,
                PaymentStatus::Succeeded,
            )
            .unwrap();

        // A late "pending"-ish delivery must not win
        let late = store
            .transition(
                PaymentProvider::Stripe,
                "cs_test_1",
                &from,
                PaymentStatus::Processing,
            )
            .unwrap();
        assert!(matches!(late, Transition::Superseded(p) if p.status == PaymentStatus::Succeeded));
    }

    #[test]
    fn test_transition_unknown_external_id() {
        let (store, _) = seeded_store();
        let err = store
            .transition(
                PaymentProvider::Stripe,
                "cs_test_missing",
                &[PaymentStatus::Pending],
                PaymentStatus::Succeeded,
            )
            .unwrap_err();
        assert!(matches!(err, PayError::RecordNotFound(_)));
    }

    #[test]
    fn test_user_apply_is_read_modify_write() {
        let (store, user_id) = seeded_store();
        let updated = store
            .apply(&user_id, &mut |u| {
                u.available_credits += 100;
                u.stripe_customer_id = Some("cus_test_9".into());
            })
            .unwrap();
        assert_eq!(updated.available_credits, 100);

        // Customer index picks up the lazily assigned id
        let by_customer = store.find_by_stripe_customer("cus_test_9").unwrap().unwrap();
        assert_eq!(by_customer.id, user_id);
    }
}
