//! Static configuration for the crossborder pivot engine.
//!
//! This crate loads everything the engine reads but never writes:
//!
//! - [`PipelineConfig`]: store location, year range, naming markers, and
//!   template names, from one YAML file.
//! - [`IndicatorCatalog`]: the `INDICATORS` name → code mapping, plus a
//!   [coverage](IndicatorCatalog::coverage) comparison against the tables
//!   actually present in the store.
//! - [`QueryTemplate`] / [`TemplateDir`]: placeholder SQL fragments and
//!   their rendering.
//!
//! # Quick start
//!
//! ```no_run
//! use crossborder_config::{IndicatorCatalog, PipelineConfig, TemplateParams};
//!
//! let config = PipelineConfig::load("conf/pipeline.yaml").unwrap();
//! let catalog = IndicatorCatalog::load(&config.indicators).unwrap();
//! println!("{} indicators configured", catalog.len());
//!
//! let per_year = config
//!     .template_dir()
//!     .load(&config.templates.per_year_select)
//!     .unwrap();
//! let sql = per_year
//!     .render(&TemplateParams::new().with("year", 1960).with("wide_table", "GDP_wide"))
//!     .unwrap();
//! println!("{sql}");
//! ```

mod catalog;
mod config;
mod error;
mod template;

pub use catalog::{CoverageReport, INDICATORS_KEY, IndicatorCatalog};
pub use config::{PipelineConfig, TemplateNames};
pub use error::{ConfigError, Result};
pub use template::{QueryTemplate, TemplateDir, TemplateParams};
