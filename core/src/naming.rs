//! Table naming rules.
//!
//! Every table this workspace reads or writes is named through the rules
//! in this module, so the names are always safe to splice into query
//! templates:
//!
//! - `<stem>_wide`: one indicator, loaded from `<stem>.csv`
//! - `<stem>_long`: the same indicator pivoted to one row per country-year
//! - `country_<code>_wide`: every indicator for one country
//!
//! Names are cleaned by replacing any character that is not alphanumeric
//! or `_` with `_`. Cleaning is not injective: `a.b.csv` and `a-b.csv`
//! both map to `a_b_wide`, and such collisions are not detected.
//!
//! # Examples
//!
//! ```
//! use crossborder_core::{NamingConvention, derive_table_name, long_table_name};
//!
//! assert_eq!(derive_table_name("API.AG.LND.ZS", "wide"), "API_AG_LND_ZS_wide");
//! assert_eq!(long_table_name("GDP_wide").unwrap(), "GDP_long");
//!
//! let naming = NamingConvention::new("API_", "_wide");
//! let table = naming.table_name("SP.POP.TOTL");
//! assert_eq!(table, "API_SP_POP_TOTL_wide");
//! assert_eq!(naming.extract_indicator(&table).unwrap(), "SP_POP_TOTL");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix token for tables loaded straight from indicator CSVs.
pub const WIDE_SUFFIX: &str = "wide";

/// Suffix token for pivoted one-row-per-country-year tables.
pub const LONG_SUFFIX: &str = "long";

/// Prefix shared by every per-country output table.
pub const COUNTRY_TABLE_PREFIX: &str = "country_";

const WIDE_MARKER: &str = "_wide";
const LONG_MARKER: &str = "_long";

/// Errors raised when a name does not follow the naming rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// The table name is missing a required marker or contains characters
    /// outside the allow-list.
    #[error("invalid table name '{name}': {reason}")]
    InvalidTableName { name: String, reason: String },

    /// A value meant for substitution into a query is not a clean identifier.
    #[error("invalid identifier '{0}': must contain only alphanumeric characters and underscores")]
    InvalidIdentifier(String),
}

impl NamingError {
    fn table(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTableName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Replaces every character that is not alphanumeric or `_` with `_`.
pub fn clean_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Returns `true` if `name` is non-empty and only contains alphanumerics
/// and underscores.
pub fn is_clean_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Checks `name` against the identifier allow-list.
///
/// # Errors
///
/// Returns [`NamingError::InvalidIdentifier`] for empty names or names with
/// characters other than alphanumerics and underscores.
pub fn validate_identifier(name: &str) -> Result<(), NamingError> {
    if is_clean_identifier(name) {
        Ok(())
    } else {
        Err(NamingError::InvalidIdentifier(name.to_string()))
    }
}

/// Builds `<stem>_<suffix>` and cleans it.
pub fn derive_table_name(stem: &str, suffix: &str) -> String {
    clean_identifier(&format!("{stem}_{suffix}"))
}

/// Derives a table name from a source file's stem (`GDP.csv` → `GDP_wide`).
///
/// Returns `None` when the path has no file name.
pub fn table_name_for_path(path: impl AsRef<Path>, suffix: &str) -> Option<String> {
    let stem = path.as_ref().file_stem()?;
    Some(derive_table_name(&stem.to_string_lossy(), suffix))
}

/// Maps a wide table name to its long counterpart (`GDP_wide` → `GDP_long`).
///
/// # Errors
///
/// Returns [`NamingError::InvalidTableName`] if the name does not end with
/// `_wide`, has nothing before the marker, or fails the identifier
/// allow-list.
pub fn long_table_name(wide_table: &str) -> Result<String, NamingError> {
    if !is_clean_identifier(wide_table) {
        return Err(NamingError::table(
            wide_table,
            "must contain only alphanumeric characters and underscores",
        ));
    }
    match wide_table.strip_suffix(WIDE_MARKER) {
        Some(base) if !base.is_empty() => Ok(format!("{base}{LONG_MARKER}")),
        _ => Err(NamingError::table(
            wide_table,
            format!("expected a name ending in '{WIDE_MARKER}'"),
        )),
    }
}

/// Name of the per-country output table (`DEU` → `country_DEU_wide`).
///
/// # Errors
///
/// Returns [`NamingError::InvalidIdentifier`] if the country code is not a
/// clean identifier; codes are never cleaned silently because they are
/// also substituted as literals into queries.
pub fn country_table_name(country_code: &str) -> Result<String, NamingError> {
    validate_identifier(country_code)?;
    Ok(derive_table_name(
        &format!("{COUNTRY_TABLE_PREFIX}{country_code}"),
        WIDE_SUFFIX,
    ))
}

/// Returns `true` for names produced by [`country_table_name`].
pub fn is_country_table(name: &str) -> bool {
    name.starts_with(COUNTRY_TABLE_PREFIX) && name.ends_with(WIDE_MARKER)
}

/// Returns `true` for names that qualify as wide indicator tables: the
/// `_wide` marker at the end, and not a per-country output table.
pub fn is_wide_table(name: &str) -> bool {
    name.len() > WIDE_MARKER.len() && name.ends_with(WIDE_MARKER) && !is_country_table(name)
}

/// Prefix/suffix markers wrapped around an indicator code in a table name.
///
/// The forward direction ([`table_name`](Self::table_name)) produces
/// `clean(prefix + code + suffix)`; the inverse
/// ([`extract_indicator`](Self::extract_indicator)) strips the prefix from
/// the front and removes the suffix wherever it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    /// Marker at the start of every indicator table name (e.g. `API_`).
    pub prefix: String,
    /// Marker removed to recover the code (e.g. `_wide`).
    pub suffix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::new("API_", WIDE_MARKER)
    }
}

impl NamingConvention {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Table name for an indicator code under this convention.
    pub fn table_name(&self, indicator_code: &str) -> String {
        clean_identifier(&format!("{}{indicator_code}{}", self.prefix, self.suffix))
    }

    /// Recovers the (cleaned) indicator code from a table name.
    ///
    /// A code that itself contains the suffix marker does not round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidTableName`] if the prefix is not at the
    /// front, the suffix does not occur, or nothing remains after removal.
    pub fn extract_indicator(&self, table: &str) -> Result<String, NamingError> {
        let rest = table
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| NamingError::table(table, format!("missing prefix '{}'", self.prefix)))?;
        if self.suffix.is_empty() || !rest.contains(self.suffix.as_str()) {
            return Err(NamingError::table(
                table,
                format!("missing suffix '{}'", self.suffix),
            ));
        }
        let code = rest.replace(self.suffix.as_str(), "");
        if code.is_empty() {
            return Err(NamingError::table(table, "no indicator code between markers"));
        }
        Ok(code)
    }

    /// Cleaned form of a catalog code, comparable with
    /// [`extract_indicator`](Self::extract_indicator) output.
    pub fn comparable_code(&self, indicator_code: &str) -> String {
        clean_identifier(indicator_code)
    }
}
