//! Indicator catalog: human-readable names mapped to World Bank codes.
//!
//! # Example YAML
//!
//! ```yaml
//! INDICATORS:
//!   GDP: NY.GDP.MKTP.CD
//!   Population: SP.POP.TOTL
//!   CO2 emissions: EN.ATM.CO2E.KT
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crossborder_core::NamingConvention;
use serde::Serialize;
use serde_yaml::Value;

use crate::error::{ConfigError, Result};

/// Top-level key holding the name → code mapping.
pub const INDICATORS_KEY: &str = "INDICATORS";

/// Read-only mapping of indicator names to source codes.
///
/// # Examples
///
/// ```
/// use crossborder_config::IndicatorCatalog;
///
/// let catalog = IndicatorCatalog::from_yaml_str("INDICATORS:\n  GDP: NY.GDP.MKTP.CD\n").unwrap();
/// assert_eq!(catalog.get("GDP"), Some("NY.GDP.MKTP.CD"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorCatalog {
    indicators: BTreeMap<String, String>,
}

impl IndicatorCatalog {
    /// Loads the catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read,
    /// [`ConfigError::YamlError`] if it is not valid YAML, or
    /// [`ConfigError::InvalidCatalog`] if the `INDICATORS` section is
    /// missing or is not a mapping of strings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw).map_err(|err| match err {
            ConfigError::InvalidCatalog(msg) => {
                ConfigError::InvalidCatalog(format!("{msg} in {}", path.display()))
            }
            other => other,
        })
    }

    /// Parses catalog YAML held in memory.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(raw)?;
        let section = doc
            .get(INDICATORS_KEY)
            .and_then(Value::as_mapping)
            .ok_or_else(|| {
                ConfigError::InvalidCatalog(format!("{INDICATORS_KEY} section missing or not a mapping"))
            })?;

        let mut indicators = BTreeMap::new();
        for (name, code) in section {
            let (Some(name), Some(code)) = (name.as_str(), code.as_str()) else {
                return Err(ConfigError::InvalidCatalog(format!(
                    "entry {name:?}: {code:?} is not a string pair"
                )));
            };
            indicators.insert(name.to_string(), code.to_string());
        }
        Ok(Self { indicators })
    }

    /// Code for an indicator name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.indicators.get(name).map(String::as_str)
    }

    /// Name registered for a code, if any.
    pub fn name_for_code(&self, code: &str) -> Option<&str> {
        self.indicators
            .iter()
            .find(|(_, c)| c.as_str() == code)
            .map(|(name, _)| name.as_str())
    }

    /// All codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.indicators.values().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// `(name, code)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indicators.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Compares the catalog with the wide tables present in the store.
    ///
    /// Table names are mapped back to codes with
    /// [`NamingConvention::extract_indicator`]; catalog codes are cleaned
    /// the same way before comparison. Tables that do not follow the
    /// convention, or whose code is not in the catalog, are listed as
    /// unexpected.
    pub fn coverage<S: AsRef<str>>(&self, naming: &NamingConvention, tables: &[S]) -> CoverageReport {
        let mut by_code: BTreeMap<String, String> = BTreeMap::new();
        let mut unexpected = Vec::new();
        for table in tables {
            let table = table.as_ref();
            match naming.extract_indicator(table) {
                Ok(code) => {
                    by_code.insert(code, table.to_string());
                }
                Err(_) => unexpected.push(table.to_string()),
            }
        }

        let mut report = CoverageReport::default();
        for (name, code) in self.iter() {
            match by_code.remove(&naming.comparable_code(code)) {
                Some(table) => {
                    report.present.insert(name.to_string(), table);
                }
                None => {
                    report.missing.insert(name.to_string(), code.to_string());
                }
            }
        }
        unexpected.extend(by_code.into_values());
        unexpected.sort();
        report.unexpected = unexpected;
        report
    }
}

/// Result of [`IndicatorCatalog::coverage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// Indicator name → table holding it.
    pub present: BTreeMap<String, String>,
    /// Indicator name → code with no table in the store.
    pub missing: BTreeMap<String, String>,
    /// Tables that map to no catalog entry.
    pub unexpected: Vec<String>,
}

impl CoverageReport {
    /// Returns `true` when every catalog entry has a table.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
