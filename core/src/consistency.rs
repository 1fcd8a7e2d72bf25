//! Country-set consistency check across indicator tables.
//!
//! Every indicator file from the same World Bank export lists the same
//! countries and aggregates. A table whose distinct country count is not
//! shared by any other table is treated as deviant and dropped before
//! pivoting or partitioning.
//!
//! The rule is a frequency heuristic, not a set comparison: when every
//! table has a different count, every table is deviant, and a lone table is
//! always deviant.
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use crossborder_core::{CountryKeyTuple, KeySets, check_consistency};
//!
//! fn keys(codes: &[&str]) -> BTreeSet<CountryKeyTuple> {
//!     codes.iter().map(|c| CountryKeyTuple::new(*c, *c, "X")).collect()
//! }
//!
//! let mut sets = KeySets::new();
//! sets.insert("a_wide".into(), keys(&["AAA", "BBB"]));
//! sets.insert("b_wide".into(), keys(&["AAA", "BBB"]));
//! sets.insert("c_wide".into(), keys(&["AAA"]));
//!
//! let report = check_consistency(sets);
//! assert_eq!(report.excluded, vec!["c_wide".to_string()]);
//! assert_eq!(report.retained.len(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{CountryKeyTuple, KeySets};

/// Outcome of [`check_consistency`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    /// Tables that passed, with their key tuples.
    pub retained: KeySets,
    /// Deviant tables, in name order.
    pub excluded: Vec<String>,
    /// Distinct country count per input table.
    pub cardinalities: BTreeMap<String, usize>,
}

impl ConsistencyReport {
    /// Country codes of the first retained table in name order.
    ///
    /// After filtering, the retained tables are expected to agree, so any
    /// one of them stands in for the whole set.
    pub fn universal_country_codes(&self) -> BTreeSet<String> {
        self.retained
            .values()
            .next()
            .map(|tuples| country_codes(tuples).into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Projects key tuples down to their distinct country codes.
pub fn country_codes(tuples: &BTreeSet<CountryKeyTuple>) -> BTreeSet<&str> {
    tuples.iter().map(|t| t.country_code.as_str()).collect()
}

/// Returns every key whose count occurs exactly once across all values.
pub fn find_deviants(cardinalities: &BTreeMap<String, usize>) -> Vec<String> {
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for count in cardinalities.values() {
        *histogram.entry(*count).or_default() += 1;
    }

    cardinalities
        .iter()
        .filter(|(_, count)| histogram.get(*count) == Some(&1))
        .map(|(table, _)| table.clone())
        .collect()
}

/// Splits tables into retained and deviant sets by country count.
pub fn check_consistency(key_sets: KeySets) -> ConsistencyReport {
    let cardinalities: BTreeMap<String, usize> = key_sets
        .iter()
        .map(|(table, tuples)| (table.clone(), country_codes(tuples).len()))
        .collect();

    let excluded = find_deviants(&cardinalities);
    if excluded.is_empty() {
        debug!(tables = key_sets.len(), "All tables share a country count");
    } else {
        warn!(
            excluded = ?excluded,
            "Tables with inconsistent country sets dropped"
        );
    }

    let retained = key_sets
        .into_iter()
        .filter(|(table, _)| !excluded.contains(table))
        .collect();

    ConsistencyReport {
        retained,
        excluded,
        cardinalities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a key set with `count` distinct countries.
    fn tuples(count: usize, indicator: &str) -> BTreeSet<CountryKeyTuple> {
        (0..count)
            .map(|i| CountryKeyTuple::new(format!("C{i:02}"), format!("Country {i}"), indicator))
            .collect()
    }

    fn sets(counts: &[usize]) -> KeySets {
        counts
            .iter()
            .enumerate()
            .map(|(i, n)| (format!("t{i}_wide"), tuples(*n, &format!("IND{i}"))))
            .collect()
    }

    #[test]
    fn test_single_outlier_is_excluded() {
        let report = check_consistency(sets(&[10, 10, 10, 7]));
        assert_eq!(report.excluded, vec!["t3_wide"]);
        assert_eq!(report.retained.len(), 3);
        assert!(!report.retained.contains_key("t3_wide"));
    }

    #[test]
    fn test_uniform_counts_exclude_nothing() {
        let report = check_consistency(sets(&[10, 10, 10]));
        assert!(report.excluded.is_empty());
        assert_eq!(report.retained.len(), 3);
    }

    #[test]
    fn test_all_distinct_counts_exclude_everything() {
        let report = check_consistency(sets(&[5, 6, 7]));
        assert_eq!(report.excluded, vec!["t0_wide", "t1_wide", "t2_wide"]);
        assert!(report.retained.is_empty());
    }

    #[test]
    fn test_two_groups_both_survive() {
        let report = check_consistency(sets(&[10, 10, 7, 7, 3]));
        assert_eq!(report.excluded, vec!["t4_wide"]);
        assert_eq!(report.retained.len(), 4);
    }

    #[test]
    fn test_lone_table_is_excluded() {
        let report = check_consistency(sets(&[10]));
        assert_eq!(report.excluded, vec!["t0_wide"]);
    }

    #[test]
    fn test_empty_input() {
        let report = check_consistency(KeySets::new());
        assert!(report.excluded.is_empty());
        assert!(report.retained.is_empty());
        assert!(report.universal_country_codes().is_empty());
    }

    #[test]
    fn test_names_do_not_inflate_country_count() {
        // Same code under two spellings still counts once.
        let mut a = tuples(3, "A");
        a.insert(CountryKeyTuple::new("C00", "Country zero (alt)", "A"));
        let mut key_sets = KeySets::new();
        key_sets.insert("a_wide".into(), a);
        key_sets.insert("b_wide".into(), tuples(3, "B"));

        let report = check_consistency(key_sets);
        assert_eq!(report.cardinalities["a_wide"], 3);
        assert!(report.excluded.is_empty());
    }

    #[test]
    fn test_universal_country_codes_uses_first_retained_table() {
        let mut key_sets = sets(&[2, 2]);
        key_sets
            .get_mut("t1_wide")
            .unwrap()
            .insert(CountryKeyTuple::new("ZZZ", "Other", "IND1"));
        key_sets
            .get_mut("t1_wide")
            .unwrap()
            .retain(|t| t.country_code != "C01");

        let report = check_consistency(key_sets);
        let codes: Vec<_> = report.universal_country_codes().into_iter().collect();
        assert_eq!(codes, vec!["C00", "C01"]);
    }

    #[test]
    fn test_find_deviants_directly() {
        let counts: BTreeMap<String, usize> =
            [("a".to_string(), 1), ("b".to_string(), 1), ("c".to_string(), 2)]
                .into_iter()
                .collect();
        assert_eq!(find_deviants(&counts), vec!["c"]);
    }
}
