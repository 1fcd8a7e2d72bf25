//! Runtime discovery of indicator tables and their country keys.
//!
//! Nothing about the set of tables is known at compile time: the wide
//! tables are whatever the load stage created. [`SchemaCatalog`] is the
//! capability the rest of the engine needs from a store, and
//! [`SqliteCatalog`] implements it over a `rusqlite` connection.
//!
//! # Example
//!
//! ```no_run
//! use crossborder_config::QueryTemplate;
//! use crossborder_sqlite::{SchemaCatalog, SqliteCatalog};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("worldbank.db").unwrap();
//! let catalog = SqliteCatalog::new(&conn);
//! let keys = QueryTemplate::new(
//!     "countries_name",
//!     r#"SELECT DISTINCT "Country Code", "Country Name", "Indicator Code" FROM {table}"#,
//! );
//!
//! for table in catalog.list_wide_tables().unwrap() {
//!     let tuples = catalog.key_tuples(&table, &keys).unwrap();
//!     println!("{table}: {} countries", tuples.len());
//! }
//! ```

use std::collections::BTreeSet;

use crossborder_config::{QueryTemplate, TemplateParams};
use crossborder_core::{CountryKeyTuple, KeySets, is_wide_table, validate_identifier};
use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError};
use crate::schema::strict_quoted_identifiers;

/// Read-only view of the store's indicator tables.
pub trait SchemaCatalog {
    /// Names of all wide indicator tables (`*_wide`, excluding per-country
    /// output tables). Order is not part of the contract.
    fn list_wide_tables(&self) -> Result<Vec<String>>;

    /// Distinct `(country code, country name, indicator code)` tuples of
    /// one table, produced by running `template` with `{table}` bound.
    fn key_tuples(&self, table: &str, template: &QueryTemplate)
    -> Result<BTreeSet<CountryKeyTuple>>;

    /// Runs [`key_tuples`](Self::key_tuples) for every table.
    ///
    /// Per-table query failures are collected and returned next to the
    /// successful sets; errors that abort the run are returned directly.
    fn collect_key_sets(
        &self,
        tables: &[String],
        template: &QueryTemplate,
    ) -> Result<(KeySets, Vec<(String, StoreError)>)> {
        let mut key_sets = KeySets::new();
        let mut failures = Vec::new();
        for table in tables {
            match self.key_tuples(table, template) {
                Ok(tuples) => {
                    key_sets.insert(table.clone(), tuples);
                }
                Err(err) if err.aborts_run() => return Err(err),
                Err(err) => {
                    error!(table = %table, error = %err, "Failed to read country keys");
                    failures.push((table.clone(), err));
                }
            }
        }
        Ok((key_sets, failures))
    }
}

/// [`SchemaCatalog`] over a SQLite connection.
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

impl SchemaCatalog for SqliteCatalog<'_> {
    fn list_wide_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tables: Vec<String> = names.into_iter().filter(|n| is_wide_table(n)).collect();
        debug!(count = tables.len(), "Discovered wide tables");
        Ok(tables)
    }

    fn key_tuples(
        &self,
        table: &str,
        template: &QueryTemplate,
    ) -> Result<BTreeSet<CountryKeyTuple>> {
        validate_identifier(table)?;
        let sql = template.render(&TemplateParams::new().with("table", table))?;
        strict_quoted_identifiers(self.conn).map_err(|e| query_context(table, e))?;

        let mut stmt = self.conn.prepare(&sql).map_err(|e| StoreError::query(table, e))?;
        let rows = stmt
            .query_map([], |row| {
                let Some(country_code) = row.get::<_, Option<String>>(0)? else {
                    return Ok(None);
                };
                Ok(Some(CountryKeyTuple::new(
                    country_code,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                )))
            })
            .map_err(|e| StoreError::query(table, e))?;

        let mut tuples = BTreeSet::new();
        let mut without_code = 0usize;
        for row in rows {
            match row.map_err(|e| StoreError::query(table, e))? {
                Some(tuple) => {
                    tuples.insert(tuple);
                }
                None => without_code += 1,
            }
        }
        if without_code > 0 {
            warn!(table = %table, rows = without_code, "Skipped key rows without a country code");
        }
        debug!(table = %table, tuples = tuples.len(), "Read country keys");
        Ok(tuples)
    }
}

/// Labels a connection-level failure with the table being read.
fn query_context(table: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::DatabaseError(source) => StoreError::query(table, source),
        other => other,
    }
}
