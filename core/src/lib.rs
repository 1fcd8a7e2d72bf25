//! Core naming rules and consistency checks for World Bank indicator tables.
//!
//! This crate holds the store-independent half of the pivot pipeline:
//!
//! - [`derive_table_name`], [`long_table_name`], [`country_table_name`] and
//!   [`NamingConvention`]: how wide, long, and per-country tables are
//!   named, and how an indicator code is recovered from a table name.
//! - [`CountryKeyTuple`], [`KeySets`], [`YearRange`]: the shared data model.
//! - [`check_consistency`]: drops tables whose country population differs
//!   from the rest of the corpus.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use crossborder_core::*;
//!
//! let naming = NamingConvention::default();
//! let table = naming.table_name("NY.GDP.MKTP.CD");
//! assert_eq!(table, "API_NY_GDP_MKTP_CD_wide");
//! assert_eq!(long_table_name(&table).unwrap(), "API_NY_GDP_MKTP_CD_long");
//!
//! let mut sets = KeySets::new();
//! let keys: BTreeSet<_> = [CountryKeyTuple::new("DEU", "Germany", "NY.GDP.MKTP.CD")].into();
//! sets.insert(table.clone(), keys.clone());
//! sets.insert("API_SP_POP_TOTL_wide".into(), keys);
//! assert!(check_consistency(sets).excluded.is_empty());
//! ```

mod consistency;
mod naming;
mod types;

pub use consistency::{ConsistencyReport, check_consistency, country_codes, find_deviants};
pub use naming::{
    COUNTRY_TABLE_PREFIX, LONG_SUFFIX, NamingConvention, NamingError, WIDE_SUFFIX,
    clean_identifier, country_table_name, derive_table_name, is_clean_identifier,
    is_country_table, is_wide_table, long_table_name, table_name_for_path, validate_identifier,
};
pub use types::*;
