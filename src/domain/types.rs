//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during weighting and chaining
//! - exported to CSV/JSON
//! - reloaded later for panel assembly

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

/// Which month grid periods live on.
///
/// `Calendar` buckets observations by standard month boundaries.
/// `Fiscal` buckets them by retailer fiscal months: explicit
/// `fiscal_year`/`fiscal_month` columns when the input carries them, otherwise
/// derived from the calendar month via the July–June fiscal map (see
/// [`crate::domain::fiscal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightBasis {
    Calendar,
    Fiscal,
}

impl WeightBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightBasis::Calendar => "calendar",
            WeightBasis::Fiscal => "fiscal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "calendar" => Some(WeightBasis::Calendar),
            "fiscal" => Some(WeightBasis::Fiscal),
            _ => None,
        }
    }
}

/// Which index to construct.
///
/// `Price` follows unit values; `Qty` follows quantities. The choice also
/// selects the raw weight basis: expenditure shares for the price index,
/// quantity shares for the quantity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Price,
    Qty,
}

impl IndexKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Price => "price",
            IndexKind::Qty => "qty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "price" => Some(IndexKind::Price),
            "qty" => Some(IndexKind::Qty),
            _ => None,
        }
    }
}

/// Chain handling when a period's weights are degenerate (zero total raw weight).
///
/// The first link that would need such a period's weights either breaks the
/// chain (`Gap`) or re-uses the most recent non-degenerate period's weights
/// (`Carry`). Nothing is interpolated in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Report a break and halt the chain at that link.
    Gap,
    /// Carry the last non-degenerate weights forward and continue.
    Carry,
}

/// Index value at the base period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum BaseScale {
    #[serde(rename = "1")]
    #[value(name = "1")]
    One,
    #[serde(rename = "100")]
    #[value(name = "100")]
    Hundred,
}

impl BaseScale {
    pub fn factor(self) -> f64 {
        match self {
            BaseScale::One => 1.0,
            BaseScale::Hundred => 100.0,
        }
    }
}

/// An ordered, gap-tolerant monthly period.
///
/// Under the fiscal basis `year`/`month` are fiscal labels (fiscal month 1 =
/// July); ordering and succession work identically on either grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Construct a period, rejecting out-of-range months and implausible years.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1000..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The immediately following period.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Signed month distance from `earlier` to `self`.
    pub fn months_since(self, earlier: Period) -> i64 {
        (self.year as i64 - earlier.year as i64) * 12 + self.month as i64 - earlier.month as i64
    }

    /// First day of the labeled month.
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || format!("Invalid period '{s}'. Expected YYYY-MM.");
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        let year: i32 = y.trim().parse().map_err(|_| err())?;
        let month: u32 = m.trim().parse().map_err(|_| err())?;
        Period::new(year, month).ok_or_else(err)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One product, one store, one period.
#[derive(Debug, Clone)]
pub struct Observation {
    pub store_id: String,
    /// Product identifier (GTIN).
    pub product_id: String,
    /// Optional product-type grouping for the two-stage weights.
    pub product_type: Option<String>,
    /// Period under the run's weight basis.
    pub period: Period,
    /// Unit value for the month.
    pub price: f64,
    pub quantity: f64,
    /// Recorded revenue for the month, when the input carries it.
    pub revenue: Option<f64>,
}

impl Observation {
    /// Expenditure for weighting: recorded revenue when present, else
    /// price × quantity.
    pub fn expenditure(&self) -> f64 {
        self.revenue.unwrap_or(self.price * self.quantity)
    }

    /// The value whose relatives the index follows.
    pub fn value(&self, kind: IndexKind) -> f64 {
        match kind {
            IndexKind::Price => self.price,
            IndexKind::Qty => self.quantity,
        }
    }

    /// Raw (un-normalized) weight contribution.
    pub fn raw_weight(&self, kind: IndexKind) -> f64 {
        match kind {
            IndexKind::Price => self.expenditure(),
            IndexKind::Qty => self.quantity,
        }
    }

    /// Grouping key for stage-1 weighting; observations without a product
    /// type share a single implicit group.
    pub fn type_key(&self) -> &str {
        self.product_type.as_deref().unwrap_or("")
    }
}

/// One store, one period, one chained index value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRecord {
    pub store_id: String,
    pub period: Period,
    pub kind: IndexKind,
    pub basis: WeightBasis,
    pub base_period: Period,
    /// Chained level: exactly the configured scale at the base period.
    pub value: f64,
    /// Natural log of the level.
    pub log_value: f64,
}

/// Immutable per-run computation settings.
///
/// Passed explicitly into each component call so per-store computations stay
/// independently testable and parallel-safe.
#[derive(Debug, Clone, Copy)]
pub struct RunSpec {
    pub basis: WeightBasis,
    pub kind: IndexKind,
    pub degenerate_policy: DegeneratePolicy,
    pub scale: BaseScale,
}

/// A full batch run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub store_path: PathBuf,
    pub outpath: PathBuf,
    pub panel_output_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    /// Restrict observations to one subcategory when set.
    pub subcategory: Option<String>,
    /// Cap on the number of stores processed (sampling/dry runs).
    pub limit: Option<usize>,
    pub spec: RunSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parse_and_display_round_trip() {
        let p: Period = "2023-04".parse().unwrap();
        assert_eq!(p, Period::new(2023, 4).unwrap());
        assert_eq!(p.to_string(), "2023-04");
    }

    #[test]
    fn period_rejects_bad_months() {
        assert!(Period::new(2023, 0).is_none());
        assert!(Period::new(2023, 13).is_none());
        assert!("2023-13".parse::<Period>().is_err());
        assert!("garbage".parse::<Period>().is_err());
    }

    #[test]
    fn period_succession_crosses_year_end() {
        let dec = Period::new(2022, 12).unwrap();
        assert_eq!(dec.next(), Period::new(2023, 1).unwrap());
        assert_eq!(dec.next().months_since(dec), 1);
    }

    #[test]
    fn period_ordering_is_chronological() {
        let a = Period::new(2022, 12).unwrap();
        let b = Period::new(2023, 1).unwrap();
        assert!(a < b);
        assert_eq!(b.months_since(a), 1);
        assert_eq!(a.months_since(b), -1);
    }

    #[test]
    fn expenditure_prefers_recorded_revenue() {
        let mut obs = Observation {
            store_id: "1".into(),
            product_id: "A".into(),
            product_type: None,
            period: Period::new(2023, 1).unwrap(),
            price: 2.0,
            quantity: 10.0,
            revenue: Some(18.5),
        };
        assert_eq!(obs.expenditure(), 18.5);
        obs.revenue = None;
        assert_eq!(obs.expenditure(), 20.0);
    }

    #[test]
    fn base_scale_factors() {
        assert_eq!(BaseScale::One.factor(), 1.0);
        assert_eq!(BaseScale::Hundred.factor(), 100.0);
    }
}
