//! Age, period and cost bucketing.
//!
//! Ages are whole years evaluated against an explicit reference date and
//! bucketed numerically; nothing here reads the system clock.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::types::CustomerSegment;

/// Inclusive integer-year age band. `max = None` means open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBand {
    pub label: String,
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl AgeBand {
    pub fn new(label: impl Into<String>, min: u32, max: Option<u32>) -> Self {
        Self {
            label: label.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, age: u32) -> bool {
        age >= self.min && self.max.is_none_or(|max| age <= max)
    }

    fn overlaps(&self, other: &AgeBand) -> bool {
        let self_max = self.max.unwrap_or(u32::MAX);
        let other_max = other.max.unwrap_or(u32::MAX);
        self.min <= other_max && other.min <= self_max
    }
}

/// Default bands: under 20, 20-30, 31-40, and everything older as 40+.
pub fn default_age_bands() -> Vec<AgeBand> {
    vec![
        AgeBand::new("under 20", 0, Some(19)),
        AgeBand::new("20-30", 20, Some(30)),
        AgeBand::new("31-40", 31, Some(40)),
        AgeBand::new("40+", 41, None),
    ]
}

/// Check that bands are well formed and pairwise disjoint.
pub fn check_age_bands(bands: &[AgeBand]) -> Result<(), String> {
    for (i, band) in bands.iter().enumerate() {
        if band.label.trim().is_empty() {
            return Err(format!("age band #{i} has an empty label"));
        }
        if band.max.is_some_and(|max| max < band.min) {
            return Err(format!(
                "age band '{}' has max below min ({} > {:?})",
                band.label, band.min, band.max
            ));
        }
        if let Some(other) = bands[..i].iter().find(|o| o.overlaps(band)) {
            return Err(format!(
                "age bands '{}' and '{}' overlap",
                other.label, band.label
            ));
        }
    }
    Ok(())
}

/// Index of the first band containing `age`.
pub fn band_index(age: u32, bands: &[AgeBand]) -> Option<usize> {
    bands.iter().position(|b| b.contains(age))
}

/// Whole years from `birthdate` until `as_of`, birthday-aware.
///
/// Returns `None` when `birthdate` is after `as_of`.
pub fn age_in_years(birthdate: NaiveDate, as_of: NaiveDate) -> Option<u32> {
    as_of.years_since(birthdate)
}

/// Months between two dates as `year_diff * 12 + month_diff`.
///
/// Day-of-month is ignored, so 2010-12-29 → 2011-01-01 counts as one month.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    i64::from(end.year() - start.year()) * 12 + i64::from(end.month()) - i64::from(start.month())
}

/// Minimum order history, in months, for a customer to leave the `New` segment.
pub const SEGMENT_MIN_LIFESPAN_MONTHS: i64 = 12;

/// Spend above which an established customer counts as VIP.
pub const VIP_SPEND_THRESHOLD: i64 = 5000;

/// Segment a customer by order lifespan (months) and total spend.
pub fn classify_customer(lifespan_months: i64, spend: i64) -> CustomerSegment {
    if lifespan_months < SEGMENT_MIN_LIFESPAN_MONTHS {
        CustomerSegment::New
    } else if spend > VIP_SPEND_THRESHOLD {
        CustomerSegment::Vip
    } else {
        CustomerSegment::Regular
    }
}

/// Format a year + month as `YYYY-MM`.
pub fn period_label(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Format a bare month as `MM`.
pub fn month_label(month: u32) -> String {
    format!("{month:02}")
}

/// Cost band labels in report order.
pub const COST_RANGES: [&str; 5] = ["below 100", "100-500", "500-1000", "above 1000", "unknown"];

/// Bucket a unit cost. Boundaries are inclusive on the lower band:
/// 100 and 500 land in `100-500`, 1000 lands in `500-1000`.
pub fn cost_range(cost: Option<i64>) -> &'static str {
    match cost {
        None => "unknown",
        Some(c) if c < 100 => "below 100",
        Some(c) if c <= 500 => "100-500",
        Some(c) if c <= 1000 => "500-1000",
        Some(_) => "above 1000",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_respects_birthday() {
        let birth = date(1980, 6, 15);
        assert_eq!(age_in_years(birth, date(2010, 6, 14)), Some(29));
        assert_eq!(age_in_years(birth, date(2010, 6, 15)), Some(30));
        assert_eq!(age_in_years(birth, date(1979, 1, 1)), None);
    }

    #[test]
    fn bands_compare_numerically() {
        // "9 years" sorts after "10 years" as a string; numeric bucketing must not.
        let bands = vec![
            AgeBand::new("0-9", 0, Some(9)),
            AgeBand::new("10-19", 10, Some(19)),
        ];
        assert_eq!(band_index(9, &bands), Some(0));
        assert_eq!(band_index(10, &bands), Some(1));
        assert_eq!(band_index(20, &bands), None);
    }

    #[test]
    fn default_bands_cover_every_age() {
        let bands = default_age_bands();
        assert!(check_age_bands(&bands).is_ok());
        for age in 0..120 {
            assert!(band_index(age, &bands).is_some(), "age {age} unbanded");
        }
        assert_eq!(bands[band_index(30, &bands).unwrap()].label, "20-30");
        assert_eq!(bands[band_index(31, &bands).unwrap()].label, "31-40");
        assert_eq!(bands[band_index(41, &bands).unwrap()].label, "40+");
    }

    #[test]
    fn overlapping_bands_rejected() {
        let bands = vec![
            AgeBand::new("a", 20, Some(30)),
            AgeBand::new("b", 30, Some(40)),
        ];
        let err = check_age_bands(&bands).unwrap_err();
        assert!(err.contains("overlap"));
    }

    #[test]
    fn inverted_band_rejected() {
        let bands = vec![AgeBand::new("bad", 40, Some(30))];
        assert!(check_age_bands(&bands).is_err());
    }

    #[test]
    fn months_between_ignores_days() {
        assert_eq!(months_between(date(2010, 12, 29), date(2014, 1, 28)), 37);
        assert_eq!(months_between(date(2010, 12, 29), date(2011, 1, 1)), 1);
        assert_eq!(months_between(date(2013, 5, 1), date(2013, 5, 31)), 0);
    }

    #[test]
    fn segment_thresholds() {
        assert_eq!(classify_customer(11, 100_000), CustomerSegment::New);
        assert_eq!(classify_customer(12, 5000), CustomerSegment::Regular);
        assert_eq!(classify_customer(12, 5001), CustomerSegment::Vip);
        assert_eq!(classify_customer(40, 0), CustomerSegment::Regular);
    }

    #[test]
    fn period_labels_are_zero_padded() {
        assert_eq!(period_label(2013, 3), "2013-03");
        assert_eq!(month_label(11), "11");
        assert_eq!(month_label(1), "01");
    }

    #[test]
    fn cost_range_boundaries() {
        assert_eq!(cost_range(Some(99)), "below 100");
        assert_eq!(cost_range(Some(100)), "100-500");
        assert_eq!(cost_range(Some(500)), "100-500");
        assert_eq!(cost_range(Some(1000)), "500-1000");
        assert_eq!(cost_range(Some(1001)), "above 1000");
        assert_eq!(cost_range(None), "unknown");
    }
}
