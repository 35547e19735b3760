//! Plan Catalog
//!
//! Immutable pricing table, loaded once at startup and injected into
//! the intent service and the reconciler.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{PayError, Result};

/// How a plan is fulfilled after a successful payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Subscription,
    OneTime,
}

/// A purchasable plan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,

    /// Display name
    pub name: String,

    /// Price in the smallest unit of `currency` (cents)
    pub price_amount: i64,

    /// ISO-like currency code ("usd", "brl")
    pub currency: String,

    pub kind: PlanKind,

    /// Credits granted on fulfillment, for one-time packs
    #[serde(default)]
    pub credit_grant: Option<i64>,

    /// USD reference price used for crypto conversion
    pub price_usd: Decimal,
}

impl Plan {
    /// Days a subscription period covers once activated
    pub const PERIOD_DAYS: i64 = 30;
}

/// Immutable plan lookup table
#[derive(Clone, Debug, Default)]
pub struct PlanCatalog {
    plans: HashMap<String, Plan>,
}

impl PlanCatalog {
    /// Build a catalog from explicit plans
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// The deploy-time plan table
    pub fn builtin() -> Self {
        Self::new([
            Plan {
                id: "monthly_tier_1".into(),
                name: "Monthly Basic Plan".into(),
                price_amount: 500,
                currency: "usd".into(),
                kind: PlanKind::Subscription,
                credit_grant: None,
                price_usd: dec!(5.00),
            },
            Plan {
                id: "one_time_credits_pack_1".into(),
                name: "100 Credits Pack".into(),
                price_amount: 1000,
                currency: "usd".into(),
                kind: PlanKind::OneTime,
                credit_grant: Some(100),
                price_usd: dec!(10.00),
            },
            Plan {
                id: "monthly_tier_1_brl".into(),
                name: "Plano Mensal Básico".into(),
                price_amount: 2500,
                currency: "brl".into(),
                kind: PlanKind::Subscription,
                credit_grant: None,
                price_usd: dec!(5.00),
            },
            Plan {
                id: "one_time_credits_pack_1_brl".into(),
                name: "Pacote 50 Créditos".into(),
                price_amount: 1000,
                currency: "brl".into(),
                kind: PlanKind::OneTime,
                credit_grant: Some(50),
                price_usd: dec!(2.00),
            },
        ])
    }

    /// Load a catalog from a JSON array of plans
    pub fn from_json(json: &str) -> Result<Self> {
        let plans: Vec<Plan> = serde_json::from_str(json)?;
        if plans.is_empty() {
            return Err(PayError::Config("plan catalog is empty".into()));
        }
        Ok(Self::new(plans))
    }

    /// Load a catalog from a JSON file at startup
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Resolve a plan id
    ///
    /// An unknown id is a caller input error, not a system fault.
    pub fn lookup(&self, plan_id: &str) -> Result<&Plan> {
        self.plans
            .get(plan_id)
            .ok_or_else(|| PayError::UnknownPlan(plan_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = PlanCatalog::builtin();
        let plan = catalog.lookup("monthly_tier_1").unwrap();
        assert_eq!(plan.price_amount, 500);
        assert_eq!(plan.currency, "usd");
        assert_eq!(plan.kind, PlanKind::Subscription);
    }

    #[test]
    fn test_unknown_plan() {
        let catalog = PlanCatalog::builtin();
        let err = catalog.lookup("yearly_tier_9").unwrap_err();
        assert!(matches!(err, PayError::UnknownPlan(id) if id == "yearly_tier_9"));
    }

    #[test]
    fn test_credit_grants() {
        let catalog = PlanCatalog::builtin();
        assert_eq!(
            catalog.lookup("one_time_credits_pack_1").unwrap().credit_grant,
            Some(100)
        );
        assert_eq!(
            catalog
                .lookup("one_time_credits_pack_1_brl")
                .unwrap()
                .credit_grant,
            Some(50)
        );
        assert_eq!(catalog.lookup("monthly_tier_1").unwrap().credit_grant, None);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[{
            "id": "monthly_tier_2",
            "name": "Monthly Plus",
            "price_amount": 1500,
            "currency": "usd",
            "kind": "subscription",
            "price_usd": "15.00"
        }]"#;
        let catalog = PlanCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("monthly_tier_2").unwrap().price_amount, 1500);
    }

    #[test]
    fn test_empty_json_rejected() {
        assert!(PlanCatalog::from_json("[]").is_err());
    }
}
