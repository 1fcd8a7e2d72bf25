//! SQLite backend for the crossborder pivot engine.
//!
//! Indicator data arrives as one wide table per World Bank indicator (one
//! row per country, one column per year). This crate turns those tables
//! into:
//!
//! - `<base>_long` tables with one row per `(country, year)`, and
//! - `country_<code>_wide` tables with one row per indicator for a single
//!   country.
//!
//! # Architecture
//!
//! - **`discovery`**: the [`SchemaCatalog`] capability and its SQLite
//!   implementation, listing wide tables and reading country keys
//! - **`pivot`**: the [`Pivot`] typestate for one wide-to-long rebuild
//! - **`partition`**: the [`Partitioner`] for per-country tables
//! - **`pipeline`**: [`Pipeline`] running all steps and producing a
//!   [`RunReport`]
//! - **`fingerprint`**: ordered SHA-256 content hashes of tables
//!
//! Every table rebuild drops and recreates its output inside a single
//! transaction; a failure leaves the previous output untouched.
//!
//! # Quick start
//!
//! ```no_run
//! use crossborder_config::PipelineConfig;
//! use crossborder_sqlite::{Pipeline, table_fingerprint};
//! use rusqlite::Connection;
//!
//! let config = PipelineConfig::load("conf/pipeline.yaml").unwrap();
//! let conn = Connection::open(&config.database).unwrap();
//! let pipeline = Pipeline::new(&conn, &config).unwrap();
//!
//! let tables = pipeline.discover().unwrap();
//! let check = pipeline.check(&tables).unwrap();
//! println!("excluded: {:?}", check.report.excluded);
//!
//! for outcome in pipeline.pivot_all(&tables).unwrap() {
//!     println!("{outcome:?}");
//! }
//! println!("{}", table_fingerprint(&conn, "API_NY_GDP_MKTP_CD_long").unwrap());
//! ```

mod discovery;
mod error;
mod fingerprint;
mod partition;
mod pipeline;
mod pivot;
mod schema;

pub use discovery::{SchemaCatalog, SqliteCatalog};
pub use error::{Result, StoreError};
pub use fingerprint::table_fingerprint;
pub use partition::{CountryOutcome, CountryPlan, PartitionPlan, Partitioner};
pub use pipeline::{
    CheckOutcome, OutcomeStatus, Pipeline, PipelineTemplates, RunReport, TableOutcome,
};
pub use pivot::{ClausesBuilt, Initialized, Pivot, PivotOutcome, QueryAssembled, pivot_table};
pub use schema::{count_rows, strict_quoted_identifiers};
