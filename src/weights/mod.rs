//! Per-period weight building.
//!
//! Weights are two-stage: a product's share of its product-type's total
//! (stage 1) times the type's share of the store total (stage 2), computed
//! within each period from the raw weight basis (expenditure for the price
//! index, quantity for the quantity index). Across all products present in a
//! period the combined weights sum to 1.
//!
//! Products absent from a period contribute zero weight and are excluded from
//! normalization; entrants get full normalized weight from their first
//! observed period, and exits are simply dropped from later periods. A period
//! whose total raw weight is not positive is flagged degenerate and excluded
//! from the engine's input rather than dividing by zero.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{IndexKind, Observation, Period, RunSpec};

/// Stage-1 share of one product within one period.
#[derive(Debug, Clone)]
pub struct ProductShare {
    /// Product-type group the share was normalized within.
    pub type_key: String,
    /// Share of the type total, in [0, 1].
    pub within_type: f64,
}

/// Normalized weights for every product present in one period.
#[derive(Debug, Clone)]
pub struct PeriodWeights {
    pub period: Period,
    /// Stage-2 shares: type total over store total, across included types.
    pub type_shares: BTreeMap<String, f64>,
    pub product_shares: BTreeMap<String, ProductShare>,
}

impl PeriodWeights {
    /// Fully normalized weight of one product (stage-1 × stage-2).
    pub fn product_weight(&self, product_id: &str) -> Option<f64> {
        let share = self.product_shares.get(product_id)?;
        let type_share = self.type_shares.get(&share.type_key)?;
        Some(share.within_type * type_share)
    }
}

/// A period excluded from weighting, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct DegeneratePeriod {
    pub period: Period,
    pub reason: String,
}

/// All weight sets for one store, keyed by period.
#[derive(Debug, Clone, Default)]
pub struct StoreWeights {
    pub by_period: BTreeMap<Period, PeriodWeights>,
    pub degenerate: Vec<DegeneratePeriod>,
}

impl StoreWeights {
    pub fn for_period(&self, period: Period) -> Option<&PeriodWeights> {
        self.by_period.get(&period)
    }
}

/// Build normalized per-period weights for a single store.
pub fn build_weights(observations: &[Observation], spec: &RunSpec) -> StoreWeights {
    // Group raw weights by period, then by product type within the period.
    let mut raw: BTreeMap<Period, BTreeMap<String, Vec<(&str, f64)>>> = BTreeMap::new();
    for obs in observations {
        let w = obs.raw_weight(spec.kind);
        raw.entry(obs.period)
            .or_default()
            .entry(obs.type_key().to_string())
            .or_default()
            .push((obs.product_id.as_str(), w));
    }

    let mut weights = StoreWeights::default();

    for (period, types) in raw {
        // Types with a non-positive total cannot be normalized within; they
        // drop out of the period's weighted set.
        let mut type_totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (type_key, products) in &types {
            let total: f64 = products.iter().map(|(_, w)| w.max(0.0)).sum();
            if total.is_finite() && total > 0.0 {
                type_totals.insert(type_key.as_str(), total);
            }
        }

        let store_total: f64 = type_totals.values().sum();
        if !store_total.is_finite() || store_total <= 0.0 {
            weights.degenerate.push(DegeneratePeriod {
                period,
                reason: format!(
                    "zero total {} weight across all products",
                    match spec.kind {
                        IndexKind::Price => "expenditure",
                        IndexKind::Qty => "quantity",
                    }
                ),
            });
            continue;
        }

        let mut period_weights = PeriodWeights {
            period,
            type_shares: BTreeMap::new(),
            product_shares: BTreeMap::new(),
        };

        for (type_key, products) in &types {
            let Some(&type_total) = type_totals.get(type_key.as_str()) else {
                continue;
            };
            period_weights
                .type_shares
                .insert(type_key.clone(), type_total / store_total);
            for (product, w) in products {
                period_weights.product_shares.insert(
                    (*product).to_string(),
                    ProductShare {
                        type_key: type_key.clone(),
                        within_type: w.max(0.0) / type_total,
                    },
                );
            }
        }

        weights.by_period.insert(period, period_weights);
    }

    weights
}
