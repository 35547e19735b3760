//! # pay-core
//!
//! Payment reconciliation core: plan catalog, payment/user records, and
//! the webhook reconciler that turns provider notifications into
//! entitlements.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐    pending row     ┌──────────────┐
//! │ Intent       │───────────────────▶│ PaymentStore │
//! │ (gateway)    │                    └──────┬───────┘
//! └──────────────┘                           │ join on
//!                                            │ (provider, external id)
//! ┌──────────────┐   Notification     ┌──────▼───────┐   entitlements
//! │ Webhook      │───────────────────▶│  Reconciler  │──────────────────▶ User
//! │ (gateway)    │                    └──────────────┘   (CAS winner only)
//! └──────────────┘
//! ```
//!
//! Providers redeliver at-least-once and out of order; correctness
//! rests on the compare-and-set transition in [`store::PaymentStore`]
//! plus monotonic terminal states, not on any denormalized flag.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pay_core::{MemoryStore, PlanCatalog, Reconciler, TracingAuditSink};
//!
//! let store = Arc::new(MemoryStore::new());
//! let recon = Reconciler::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(PlanCatalog::builtin()),
//!     Arc::new(TracingAuditSink),
//!     Arc::new(LogOnboardingHook),
//! );
//! let outcome = recon.reconcile(&notification)?;
//! ```

pub mod audit;
pub mod catalog;
pub mod error;
pub mod model;
pub mod notification;
pub mod recon;
pub mod store;

pub use audit::{AuditEvent, AuditSink, LogOnboardingHook, MemoryAuditSink, OnboardingHook, TracingAuditSink};
pub use catalog::{Plan, PlanCatalog, PlanKind};
pub use error::{PayError, Result};
pub use model::{
    Payment, PaymentId, PaymentProvider, PaymentStatus, SubscriptionStatus, User, UserId,
};
pub use notification::{Notification, NotificationKind};
pub use recon::{ReconcileOutcome, Reconciler};
pub use store::{MemoryStore, PaymentStore, Transition, UserStore};
