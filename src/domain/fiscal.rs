//! Retailer fiscal calendar: fiscal year N runs July N−1 through June N,
//! so fiscal month 1 is July and fiscal month 12 is June.

use chrono::NaiveDate;

use crate::domain::{Period, WeightBasis};

/// Fiscal year containing a calendar month.
pub fn fiscal_year(calendar: Period) -> i32 {
    if calendar.month >= 7 {
        calendar.year + 1
    } else {
        calendar.year
    }
}

/// Fiscal month (1 = July … 12 = June) of a calendar month.
pub fn fiscal_month(calendar: Period) -> u32 {
    if calendar.month >= 7 {
        calendar.month - 6
    } else {
        calendar.month + 6
    }
}

/// Map a calendar period onto the fiscal month grid.
pub fn to_fiscal(calendar: Period) -> Period {
    Period {
        year: fiscal_year(calendar),
        month: fiscal_month(calendar),
    }
}

/// Map a fiscal period back to its nominal calendar month.
///
/// When the input carried explicit week-aligned fiscal columns this is the
/// nominal (map-derived) month, not the exact retailer boundary.
pub fn to_calendar(fiscal: Period) -> Period {
    if fiscal.month <= 6 {
        Period {
            year: fiscal.year - 1,
            month: fiscal.month + 6,
        }
    } else {
        Period {
            year: fiscal.year,
            month: fiscal.month - 6,
        }
    }
}

/// First calendar day a period labels, under the given basis.
pub fn nominal_first_day(period: Period, basis: WeightBasis) -> Option<NaiveDate> {
    match basis {
        WeightBasis::Calendar => period.first_day(),
        WeightBasis::Fiscal => to_calendar(period).first_day(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn july_starts_the_next_fiscal_year() {
        assert_eq!(fiscal_year(p(2022, 7)), 2023);
        assert_eq!(fiscal_month(p(2022, 7)), 1);
        assert_eq!(fiscal_year(p(2023, 6)), 2023);
        assert_eq!(fiscal_month(p(2023, 6)), 12);
    }

    #[test]
    fn first_half_keeps_its_calendar_fiscal_year() {
        assert_eq!(fiscal_year(p(2022, 1)), 2022);
        assert_eq!(fiscal_month(p(2022, 1)), 7);
    }

    #[test]
    fn fiscal_mapping_round_trips() {
        for month in 1..=12 {
            let cal = p(2023, month);
            assert_eq!(to_calendar(to_fiscal(cal)), cal);
        }
    }

    #[test]
    fn consecutive_calendar_months_stay_consecutive_in_fiscal() {
        let jun = to_fiscal(p(2023, 6));
        let jul = to_fiscal(p(2023, 7));
        assert_eq!(jul.months_since(jun), 1);
    }

    #[test]
    fn nominal_first_day_uses_the_calendar_month() {
        let fiscal = to_fiscal(p(2022, 7));
        let day = nominal_first_day(fiscal, WeightBasis::Fiscal).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2022, 7, 1).unwrap());
    }
}
