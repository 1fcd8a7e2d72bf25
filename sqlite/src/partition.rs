//! Per-country cross-indicator tables.
//!
//! For every country in the consistency-checked set the partitioner builds
//! `country_<code>_wide`: one row per indicator table, one column per
//! configured year. Each row comes from the per-country template,
//! rendered with `{indicator}`, `{year_columns}`, `{wide_table}` and
//! `{country_code}`, and the rows are unioned into the country table.
//!
//! Work is split in two phases. [`Partitioner::plan`] reads the store's
//! columns and renders every fragment without writing anything;
//! [`Partitioner::execute`] then rebuilds each country table in its own
//! transaction.

use crossborder_config::{QueryTemplate, TemplateParams};
use crossborder_core::{
    ConsistencyReport, NamingConvention, NamingError, YearRange, country_table_name,
};
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::error::{Result, StoreError};
use crate::schema::{
    create_table_as_union_sql, describe_years, missing_year_columns, replace_table,
    strict_quoted_identifiers, table_columns,
};

/// Everything needed to rebuild one country table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryPlan {
    pub country_code: String,
    /// Output table, `country_<code>_wide`.
    pub table: String,
    /// One rendered select per contributing indicator table.
    pub fragments: Vec<String>,
}

/// Rendered work for one partition run.
#[derive(Debug, Default)]
pub struct PartitionPlan {
    /// Countries to build, in code order.
    pub countries: Vec<CountryPlan>,
    /// Country codes that cannot be used as identifiers.
    pub rejected_countries: Vec<(String, NamingError)>,
    /// Retained tables left out of every country table, with the reason.
    pub skipped_tables: Vec<(String, StoreError)>,
    /// Indicator tables feeding every country table, with their codes.
    pub sources: Vec<(String, String)>,
}

/// Result of rebuilding one country table.
#[derive(Debug)]
pub struct CountryOutcome {
    pub country_code: String,
    pub table: String,
    /// Rows written, or why the table was not rebuilt.
    pub result: Result<usize>,
}

/// Builds and executes per-country partitions.
#[derive(Debug)]
pub struct Partitioner<'t> {
    years: YearRange,
    naming: NamingConvention,
    template: &'t QueryTemplate,
}

impl<'t> Partitioner<'t> {
    pub fn new(years: YearRange, naming: NamingConvention, template: &'t QueryTemplate) -> Self {
        Self {
            years,
            naming,
            template,
        }
    }

    /// Renders every country's fragments.
    ///
    /// The universal country set is taken from the first retained table.
    /// A retained table is skipped (and reported in
    /// [`PartitionPlan::skipped_tables`]) when its name does not carry an
    /// indicator code under the naming convention, or when it lacks one of
    /// the configured year columns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Template`] if the template needs a placeholder
    /// that is not supplied, or a fatal store error from reading columns.
    pub fn plan(&self, conn: &Connection, report: &ConsistencyReport) -> Result<PartitionPlan> {
        let mut plan = PartitionPlan::default();

        for table in report.retained.keys() {
            let indicator = match self.naming.extract_indicator(table) {
                Ok(indicator) => indicator,
                Err(err) => {
                    warn!(table = %table, error = %err, "Skipping table without indicator code");
                    plan.skipped_tables.push((table.clone(), err.into()));
                    continue;
                }
            };
            let columns = match table_columns(conn, table) {
                Ok(columns) => columns,
                Err(err) if err.aborts_run() => return Err(err),
                Err(err) => {
                    plan.skipped_tables.push((table.clone(), err));
                    continue;
                }
            };
            let missing = missing_year_columns(&columns, self.years);
            if !missing.is_empty() {
                let err = StoreError::partition(
                    table,
                    format!("missing year columns: {}", describe_years(&missing)),
                    None,
                );
                warn!(table = %table, error = %err, "Skipping table in partition");
                plan.skipped_tables.push((table.clone(), err));
                continue;
            }
            plan.sources.push((table.clone(), indicator));
        }

        let year_columns = self.years.quoted_columns();
        for code in report.universal_country_codes() {
            let table = match country_table_name(&code) {
                Ok(table) => table,
                Err(err) => {
                    warn!(country = %code, error = %err, "Rejecting country code");
                    plan.rejected_countries.push((code, err));
                    continue;
                }
            };

            let mut params = TemplateParams::new()
                .with("country_code", &code)
                .with("year_columns", &year_columns);
            let mut fragments = Vec::with_capacity(plan.sources.len());
            for (wide_table, indicator) in &plan.sources {
                params.set("wide_table", wide_table);
                params.set("indicator", indicator);
                fragments.push(self.template.render(&params)?);
            }

            plan.countries.push(CountryPlan {
                country_code: code,
                table,
                fragments,
            });
        }

        debug!(
            countries = plan.countries.len(),
            sources = plan.sources.len(),
            rejected = plan.rejected_countries.len(),
            skipped = plan.skipped_tables.len(),
            "Planned partition"
        );
        Ok(plan)
    }

    /// Rebuilds one country table atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PartitionExecutionError`] naming the country
    /// table; the previous version of the table is left in place.
    pub fn execute_country(&self, conn: &Connection, country: &CountryPlan) -> Result<usize> {
        if country.fragments.is_empty() {
            return Err(StoreError::partition(
                &country.table,
                "no indicator tables contribute to this country",
                None,
            ));
        }
        let create_sql = create_table_as_union_sql(&country.table, &country.fragments)?;
        let table = country.table.as_str();
        let wrap = |e: rusqlite::Error| StoreError::partition(table, e.to_string(), Some(e));
        strict_quoted_identifiers(conn).map_err(|e| match e {
            StoreError::DatabaseError(source) => wrap(source),
            other => other,
        })?;
        replace_table(conn, table, &create_sql, wrap)
    }

    /// Rebuilds every planned country table, continuing past per-country
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns the first error that makes the connection unusable; outcomes
    /// gathered up to that point are discarded.
    pub fn execute(&self, conn: &Connection, plan: &PartitionPlan) -> Result<Vec<CountryOutcome>> {
        let mut outcomes = Vec::with_capacity(plan.countries.len());
        for country in &plan.countries {
            let result = match self.execute_country(conn, country) {
                Err(err) if err.aborts_run() => return Err(err),
                Err(err) => {
                    error!(table = %country.table, error = %err, "Failed to build country table");
                    Err(err)
                }
                Ok(rows) => {
                    debug!(table = %country.table, rows, "Built country table");
                    Ok(rows)
                }
            };
            outcomes.push(CountryOutcome {
                country_code: country.country_code.clone(),
                table: country.table.clone(),
                result,
            });
        }

        let built = outcomes.iter().filter(|o| o.result.is_ok()).count();
        info!(built, failed = outcomes.len() - built, "Partitioned countries");
        Ok(outcomes)
    }
}
