//! Pipeline configuration.
//!
//! One YAML file describes where the store and resources live, which years
//! are pivoted, how indicator codes are embedded in table names, and which
//! template files drive each step. Every field has a default, so an empty
//! document is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! database: data/worldbank.db
//! templates_dir: sql/queries
//! indicators: conf/indicators.yaml
//! years:
//!   start: 1960
//!   end: 2026
//! naming:
//!   prefix: API_
//!   suffix: _wide
//! templates:
//!   per_year_select: per_year_select
//!   country_keys: countries_name
//!   country_indicator: country_indicator
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crossborder_core::{NamingConvention, YearRange};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::template::TemplateDir;

/// Template names used by the pivot and partition steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateNames {
    /// One year's projection of a wide table (`{year}`, `{wide_table}`).
    pub per_year_select: String,
    /// Distinct country-key tuples of one table (`{table}`).
    pub country_keys: String,
    /// One indicator's year series for one country (`{indicator}`,
    /// `{year_columns}`, `{wide_table}`, `{country_code}`).
    pub country_indicator: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            per_year_select: "per_year_select".to_string(),
            country_keys: "countries_name".to_string(),
            country_indicator: "country_indicator".to_string(),
        }
    }
}

/// Top-level pipeline configuration.
///
/// # Examples
///
/// ```
/// use crossborder_config::PipelineConfig;
///
/// let config: PipelineConfig = serde_yaml::from_str("years: { start: 2000, end: 2005 }").unwrap();
/// assert_eq!(config.years.len(), 5);
/// assert_eq!(config.naming.prefix, "API_");
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Configuration format version.
    pub version: String,
    /// SQLite database file.
    pub database: PathBuf,
    /// Directory holding the query templates.
    pub templates_dir: PathBuf,
    /// Indicator catalog YAML.
    pub indicators: PathBuf,
    /// Year columns to pivot.
    pub years: YearRange,
    /// Markers wrapped around indicator codes in table names.
    pub naming: NamingConvention,
    /// Template file names inside `templates_dir`.
    pub templates: TemplateNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: PathBuf::from("data/worldbank.db"),
            templates_dir: PathBuf::from("sql/queries"),
            indicators: PathBuf::from("conf/indicators.yaml"),
            years: YearRange::default(),
            naming: NamingConvention::default(),
            templates: TemplateNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// [`YamlError`](ConfigError::YamlError) if parsing fails, or
    /// [`InvalidConfig`](ConfigError::InvalidConfig) if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut config: Self = serde_yaml::from_reader(reader)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Joins every relative path onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.database, &mut self.templates_dir, &mut self.indicators] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Checks the year range and naming markers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] for an empty year range or an
    /// empty naming suffix.
    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "year range {} is empty (end is exclusive)",
                self.years
            )));
        }
        if self.naming.suffix.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "naming suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Template directory handle for `templates_dir`.
    pub fn template_dir(&self) -> TemplateDir {
        TemplateDir::new(&self.templates_dir)
    }
}
