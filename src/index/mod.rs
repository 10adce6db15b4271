//! Chained Young index engine.
//!
//! For each period after the base, per-product relatives value(t)/value(t−1)
//! are combined with the weights established in period t−1 (prior-period
//! weights avoid simultaneity bias) via a weighted arithmetic mean, then
//! chained onto the running level: index[t] = index[t−1] × relative[t].
//!
//! The combination is two-stage, mirroring the weight structure: matched
//! product relatives are averaged within each product type with stage-1
//! weights, and the resulting type relatives are averaged with stage-2
//! weights. At each stage the prior-period weights are renormalized over the
//! matched set, so entry/exit excludes products rather than imputing them.
//!
//! The chain is an explicit fold over the ordered period sequence: memory
//! stays bounded and each link is testable in isolation.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{DegeneratePolicy, IndexRecord, Observation, Period, RunSpec};
use crate::weights::{PeriodWeights, StoreWeights};

/// Why a chain stopped advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The next observed period is not the immediate successor month.
    MissingPeriod,
    /// No positively weighted product present in both periods of the link.
    NoMatchedProducts,
    /// The link needed weights from a degenerate period (gap policy).
    DegenerateWeights,
}

/// A structured marker for an unresolvable chain boundary.
///
/// No ratio of 1 is fabricated and no record is emitted for the breaking
/// period; the marker is the series' missing-value sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct ChainBreak {
    /// First period the chain could not reach.
    pub period: Period,
    pub kind: BreakKind,
    pub detail: String,
}

/// Output of one store's chaining: records up to the first break, plus the
/// break marker when one occurred.
#[derive(Debug, Clone, Default)]
pub struct IndexSeries {
    pub records: Vec<IndexRecord>,
    pub breaks: Vec<ChainBreak>,
}

/// A store whose series cannot be chained at all.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("store {store_id}: series unresolvable: {reason}")]
    Unresolvable { store_id: String, reason: String },
}

/// Compute the chained index series for a single store.
///
/// Returns the base record plus one record per resolved period. A store with
/// fewer than two observed periods is unresolvable and yields an error (empty
/// output with a reason), never a crash.
pub fn compute_index(
    store_id: &str,
    observations: &[Observation],
    weights: &StoreWeights,
    spec: &RunSpec,
) -> Result<IndexSeries, EngineError> {
    // product -> (type key, value) for each observed period, in period order.
    let mut by_period: BTreeMap<Period, BTreeMap<&str, (&str, f64)>> = BTreeMap::new();
    for obs in observations {
        by_period
            .entry(obs.period)
            .or_default()
            .insert(obs.product_id.as_str(), (obs.type_key(), obs.value(spec.kind)));
    }

    let periods: Vec<Period> = by_period.keys().copied().collect();
    let base = match periods.as_slice() {
        [] => {
            return Err(EngineError::Unresolvable {
                store_id: store_id.to_string(),
                reason: "no observations".into(),
            });
        }
        [only] => {
            return Err(EngineError::Unresolvable {
                store_id: store_id.to_string(),
                reason: format!("single observed period {only}; nothing to chain"),
            });
        }
        [base, ..] => *base,
    };
    let mut level = spec.scale.factor();

    let mut series = IndexSeries::default();
    series.records.push(make_record(store_id, base, base, level, spec));

    // Most recent non-degenerate weights, for the carry policy.
    let mut carried: Option<&PeriodWeights> = None;

    for pair in periods.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);

        if cur.months_since(prev) != 1 {
            series.breaks.push(ChainBreak {
                period: prev.next(),
                kind: BreakKind::MissingPeriod,
                detail: format!("no observations between {prev} and {cur}"),
            });
            break;
        }

        let prev_weights = match weights.for_period(prev) {
            Some(w) => {
                carried = Some(w);
                w
            }
            None => match spec.degenerate_policy {
                DegeneratePolicy::Gap => {
                    series.breaks.push(ChainBreak {
                        period: cur,
                        kind: BreakKind::DegenerateWeights,
                        detail: format!("weights for {prev} are degenerate"),
                    });
                    break;
                }
                DegeneratePolicy::Carry => match carried {
                    Some(w) => w,
                    None => {
                        series.breaks.push(ChainBreak {
                            period: cur,
                            kind: BreakKind::DegenerateWeights,
                            detail: format!("weights for {prev} are degenerate and none precede it"),
                        });
                        break;
                    }
                },
            },
        };

        let prev_values = &by_period[&prev];
        let cur_values = &by_period[&cur];
        match period_relative(prev_values, cur_values, prev_weights) {
            Some(relative) => {
                level *= relative;
                series.records.push(make_record(store_id, cur, base, level, spec));
            }
            None => {
                series.breaks.push(ChainBreak {
                    period: cur,
                    kind: BreakKind::NoMatchedProducts,
                    detail: format!("no positively weighted product present in both {prev} and {cur}"),
                });
                break;
            }
        }
    }

    Ok(series)
}

/// One link of the chain: the weighted arithmetic mean of matched-product
/// relatives, combined in two stages with prior-period weights.
///
/// Returns `None` when no positively weighted matched pair survives the
/// guards (division by zero and non-positive relatives are excluded, not
/// treated as infinite).
fn period_relative(
    prev: &BTreeMap<&str, (&str, f64)>,
    cur: &BTreeMap<&str, (&str, f64)>,
    weights: &PeriodWeights,
) -> Option<f64> {
    struct TypeAcc {
        weight_sum: f64,
        relative_sum: f64,
    }

    // Stage 1: weighted relatives within each product type, over the matched
    // set only.
    let mut by_type: BTreeMap<&str, TypeAcc> = BTreeMap::new();
    for (product, (_, prev_value)) in prev {
        let Some((_, cur_value)) = cur.get(product) else {
            continue;
        };
        let Some(share) = weights.product_shares.get(*product) else {
            continue;
        };
        let relative = cur_value / prev_value;
        if !relative.is_finite() || relative <= 0.0 {
            continue;
        }
        let acc = by_type.entry(share.type_key.as_str()).or_insert(TypeAcc {
            weight_sum: 0.0,
            relative_sum: 0.0,
        });
        acc.weight_sum += share.within_type;
        acc.relative_sum += share.within_type * relative;
    }

    // Stage 2: type relatives combined with stage-2 shares, renormalized over
    // types that matched.
    let mut type_weight_sum = 0.0;
    let mut weighted_relatives = 0.0;
    for (type_key, acc) in &by_type {
        if acc.weight_sum <= 0.0 {
            continue;
        }
        let Some(&type_share) = weights.type_shares.get(*type_key) else {
            continue;
        };
        type_weight_sum += type_share;
        weighted_relatives += type_share * (acc.relative_sum / acc.weight_sum);
    }

    if !(type_weight_sum.is_finite() && type_weight_sum > 0.0) {
        return None;
    }
    let relative = weighted_relatives / type_weight_sum;
    if relative.is_finite() && relative > 0.0 {
        Some(relative)
    } else {
        None
    }
}

fn make_record(store_id: &str, period: Period, base: Period, level: f64, spec: &RunSpec) -> IndexRecord {
    IndexRecord {
        store_id: store_id.to_string(),
        period,
        kind: spec.kind,
        basis: spec.basis,
        base_period: base,
        value: level,
        log_value: level.ln(),
    }
}
