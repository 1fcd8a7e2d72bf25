//! Shared data model for indicator tables.
//!
//! The types here describe what the store holds without touching it:
//! a country's identity within one indicator table ([`CountryKeyTuple`]),
//! the per-table collection of those tuples ([`KeySets`]), and the
//! configured span of year columns ([`YearRange`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// First year (inclusive) of the default World Bank year range.
pub const DEFAULT_START_YEAR: i32 = 1960;

/// Last year (exclusive) of the default World Bank year range.
pub const DEFAULT_END_YEAR: i32 = 2026;

/// Identity of one country's entry in one indicator table.
///
/// Ordered by country code first, so sets of tuples iterate in country
/// order.
///
/// # Examples
///
/// ```
/// use crossborder_core::CountryKeyTuple;
///
/// let key = CountryKeyTuple::new("DEU", "Germany", "NY.GDP.MKTP.CD");
/// assert_eq!(key.country_code, "DEU");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountryKeyTuple {
    /// ISO-style country or aggregate code (`"Country Code"` column).
    pub country_code: String,
    /// Human-readable country name (`"Country Name"` column).
    pub country_name: String,
    /// Source indicator code (`"Indicator Code"` column).
    pub indicator_code: String,
}

impl CountryKeyTuple {
    pub fn new(
        country_code: impl Into<String>,
        country_name: impl Into<String>,
        indicator_code: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            country_name: country_name.into(),
            indicator_code: indicator_code.into(),
        }
    }
}

/// Table name → distinct country-key tuples found in that table.
pub type KeySets = BTreeMap<String, BTreeSet<CountryKeyTuple>>;

/// Half-open range of years (`start..end`) that appear as columns in wide
/// tables.
///
/// # Examples
///
/// ```
/// use crossborder_core::YearRange;
///
/// let years = YearRange::new(2020, 2022);
/// assert_eq!(years.years().collect::<Vec<_>>(), vec![2020, 2021]);
/// assert_eq!(years.quoted_columns(), r#""2020", "2021""#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    /// First year, inclusive.
    pub start: i32,
    /// Last year, exclusive.
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Iterates the years in ascending order.
    pub fn years(&self) -> std::ops::Range<i32> {
        self.start..self.end
    }

    /// Number of years in the range (zero when `start >= end`).
    pub fn len(&self) -> usize {
        if self.end > self.start {
            (self.end - self.start) as usize
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `year` falls inside the range.
    pub fn contains(&self, year: i32) -> bool {
        (self.start..self.end).contains(&year)
    }

    /// Renders every year as a double-quoted column reference, joined by
    /// `", "`. Used for the `{year_columns}` template placeholder.
    pub fn quoted_columns(&self) -> String {
        self.years()
            .map(|year| format!("\"{year}\""))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::new(DEFAULT_START_YEAR, DEFAULT_END_YEAR)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
