//! Wide-to-long pivot of one indicator table.
//!
//! A wide table has one row per country and one column per year. The pivot
//! produces `<base>_long` with one row per `(country, year)` pair, built as
//! a `UNION ALL` of one projection per configured year.
//!
//! The steps are encoded as a typestate so a query cannot be executed
//! before it is assembled:
//!
//! ```text
//! Pivot<Initialized> --build_clauses--> Pivot<ClausesBuilt>
//!                    --assemble------> Pivot<QueryAssembled>
//!                    --execute-------> PivotOutcome
//! ```
//!
//! # Example
//!
//! ```no_run
//! use crossborder_config::QueryTemplate;
//! use crossborder_core::YearRange;
//! use crossborder_sqlite::Pivot;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("worldbank.db").unwrap();
//! let per_year = QueryTemplate::new(
//!     "per_year_select",
//!     r#"SELECT "Country Code" AS country, {year} AS year, "{year}" AS value FROM {wide_table}"#,
//! );
//!
//! let outcome = Pivot::new("API_GDP_wide", YearRange::new(2000, 2020), &per_year)
//!     .unwrap()
//!     .build_clauses()
//!     .unwrap()
//!     .assemble()
//!     .unwrap()
//!     .execute(&conn)
//!     .unwrap();
//! println!("{} -> {} rows", outcome.long_table, outcome.rows_written);
//! ```

use crossborder_config::{QueryTemplate, TemplateParams};
use crossborder_core::{YearRange, long_table_name};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::schema::{
    count_rows, create_table_as_union_sql, describe_years, missing_year_columns, replace_table,
    strict_quoted_identifiers, table_columns, table_exists,
};

/// Table names and inputs are captured; nothing rendered yet.
#[derive(Debug)]
pub struct Initialized;

/// One rendered projection per year, ascending.
#[derive(Debug)]
pub struct ClausesBuilt {
    clauses: Vec<String>,
}

/// The full `CREATE TABLE ... AS ... UNION ALL ...` statement.
#[derive(Debug)]
pub struct QueryAssembled {
    query: String,
}

/// A pivot of one wide table in state `S`.
#[derive(Debug)]
pub struct Pivot<'t, S> {
    wide_table: String,
    long_table: String,
    years: YearRange,
    template: &'t QueryTemplate,
    state: S,
}

/// Result of an executed pivot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotOutcome {
    pub wide_table: String,
    pub long_table: String,
    /// Rows in the wide table at execution time.
    pub source_rows: usize,
    /// Number of years pivoted.
    pub years: usize,
    /// Rows in the rebuilt long table.
    pub rows_written: usize,
}

impl<'t, S> Pivot<'t, S> {
    pub fn wide_table(&self) -> &str {
        &self.wide_table
    }

    pub fn long_table(&self) -> &str {
        &self.long_table
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    fn advance<T>(self, state: T) -> Pivot<'t, T> {
        Pivot {
            wide_table: self.wide_table,
            long_table: self.long_table,
            years: self.years,
            template: self.template,
            state,
        }
    }
}

impl<'t> Pivot<'t, Initialized> {
    /// Starts a pivot of `wide_table` over `years` using the per-year
    /// `template` (placeholders `{year}` and `{wide_table}`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTableName`] if the name does not end in
    /// `_wide`, or [`StoreError::PivotExecutionError`] for an empty year
    /// range.
    pub fn new(wide_table: &str, years: YearRange, template: &'t QueryTemplate) -> Result<Self> {
        let long_table = long_table_name(wide_table)?;
        if years.is_empty() {
            return Err(StoreError::pivot(
                wide_table,
                format!("year range {years} is empty"),
                None,
            ));
        }
        Ok(Self {
            wide_table: wide_table.to_string(),
            long_table,
            years,
            template,
            state: Initialized,
        })
    }

    /// Renders one projection per configured year.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Template`] if the template uses a placeholder
    /// other than `{year}` and `{wide_table}`.
    pub fn build_clauses(self) -> Result<Pivot<'t, ClausesBuilt>> {
        let mut params = TemplateParams::new().with("wide_table", &self.wide_table);
        let mut clauses = Vec::with_capacity(self.years.len());
        for year in self.years.years() {
            params.set("year", year);
            clauses.push(self.template.render(&params)?);
        }
        debug!(table = %self.wide_table, clauses = clauses.len(), "Built pivot clauses");
        Ok(self.advance(ClausesBuilt { clauses }))
    }
}

impl<'t> Pivot<'t, ClausesBuilt> {
    pub fn clauses(&self) -> &[String] {
        &self.state.clauses
    }

    /// Joins the clauses into the statement that creates the long table.
    pub fn assemble(self) -> Result<Pivot<'t, QueryAssembled>> {
        let query = create_table_as_union_sql(&self.long_table, &self.state.clauses)?;
        Ok(self.advance(QueryAssembled { query }))
    }
}

impl Pivot<'_, QueryAssembled> {
    pub fn query(&self) -> &str {
        &self.state.query
    }

    /// Rebuilds the long table atomically.
    ///
    /// The wide table must exist and have a column for every configured
    /// year; both are checked before any write. Double-quoted names in the
    /// template must resolve to real columns. The old long table is
    /// dropped and the new one created in a single transaction, so a
    /// failure leaves the previous long table as it was.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PivotExecutionError`] naming the wide table.
    pub fn execute(self, conn: &Connection) -> Result<PivotOutcome> {
        let wide = self.wide_table.as_str();
        let wrap = |e: rusqlite::Error| StoreError::pivot(wide, e.to_string(), Some(e));

        strict_quoted_identifiers(conn).map_err(|e| pivot_context(wide, e))?;
        if !table_exists(conn, wide).map_err(|e| pivot_context(wide, e))? {
            return Err(StoreError::pivot(wide, "table does not exist", None));
        }
        let columns = table_columns(conn, wide).map_err(|e| pivot_context(wide, e))?;
        let missing = missing_year_columns(&columns, self.years);
        if !missing.is_empty() {
            return Err(StoreError::pivot(
                wide,
                format!("missing year columns: {}", describe_years(&missing)),
                None,
            ));
        }
        let source_rows = count_rows(conn, wide).map_err(|e| pivot_context(wide, e))?;

        let rows_written = replace_table(conn, &self.long_table, &self.state.query, wrap)?;

        let expected = source_rows * self.years.len();
        if rows_written != expected {
            warn!(
                table = %wide,
                expected,
                actual = rows_written,
                "Long table row count differs from rows x years"
            );
        }
        info!(
            table = %wide,
            long_table = %self.long_table,
            rows = rows_written,
            "Pivoted table"
        );

        Ok(PivotOutcome {
            wide_table: self.wide_table,
            long_table: self.long_table,
            source_rows,
            years: self.years.len(),
            rows_written,
        })
    }
}

/// Runs every pivot step for one table.
pub fn pivot_table(
    conn: &Connection,
    wide_table: &str,
    years: YearRange,
    template: &QueryTemplate,
) -> Result<PivotOutcome> {
    Pivot::new(wide_table, years, template)?
        .build_clauses()?
        .assemble()?
        .execute(conn)
}

/// Re-labels a read failure during the pre-checks as a pivot failure of
/// `table`, keeping the SQLite cause.
fn pivot_context(table: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::QueryExecutionError { source, .. } | StoreError::DatabaseError(source) => {
            StoreError::pivot(table, source.to_string(), Some(source))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PER_YEAR_SQL: &str =
        r#"SELECT "Country Code" AS country, {year} AS year, "{year}" AS value FROM {wide_table}"#;

    fn per_year() -> QueryTemplate {
        QueryTemplate::new("per_year_select", PER_YEAR_SQL)
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
CREATE TABLE GDP_wide ("Country Code" TEXT, "2020" REAL, "2021" REAL);
INSERT INTO GDP_wide VALUES ('AAA', 10, 20), ('BBB', 30, 40);
"#,
        )
        .unwrap();
        conn
    }

    fn long_rows(conn: &Connection, table: &str) -> Vec<(String, i64, f64)> {
        let mut stmt = conn
            .prepare(&format!("SELECT country, year, value FROM {table} ORDER BY country, year"))
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_new_rejects_non_wide_name() {
        let template = per_year();
        let err = Pivot::new("GDP_long", YearRange::new(2020, 2022), &template).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTableName(_)));
    }

    #[test]
    fn test_new_rejects_empty_years() {
        let template = per_year();
        let err = Pivot::new("GDP_wide", YearRange::new(2020, 2020), &template).unwrap_err();
        assert!(matches!(err, StoreError::PivotExecutionError { .. }));
    }

    #[test]
    fn test_clauses_one_per_year_ascending() {
        let template = per_year();
        let built = Pivot::new("GDP_wide", YearRange::new(2019, 2022), &template)
            .unwrap()
            .build_clauses()
            .unwrap();
        assert_eq!(built.long_table(), "GDP_long");
        assert_eq!(built.clauses().len(), 3);
        assert!(built.clauses()[0].contains(r#"2019 AS year, "2019" AS value"#));
        assert!(built.clauses()[2].contains(r#""2021""#));
    }

    #[test]
    fn test_assembled_query_shape() {
        let template = per_year();
        let assembled = Pivot::new("GDP_wide", YearRange::new(2020, 2022), &template)
            .unwrap()
            .build_clauses()
            .unwrap()
            .assemble()
            .unwrap();
        let query = assembled.query();
        assert!(query.starts_with("CREATE TABLE GDP_long AS\n"));
        assert_eq!(query.matches("UNION ALL").count(), 1);
    }

    #[test]
    fn test_template_with_unknown_placeholder_fails_to_build() {
        let template = QueryTemplate::new("bad", "SELECT {year}, {nope} FROM {wide_table}");
        let err = Pivot::new("GDP_wide", YearRange::new(2020, 2021), &template)
            .unwrap()
            .build_clauses()
            .unwrap_err();
        assert!(err.aborts_run());
    }

    #[test]
    fn test_execute_pivots_rows() {
        let conn = setup();
        let outcome = pivot_table(&conn, "GDP_wide", YearRange::new(2020, 2022), &per_year()).unwrap();
        assert_eq!(outcome.source_rows, 2);
        assert_eq!(outcome.rows_written, 4);
        assert_eq!(
            long_rows(&conn, "GDP_long"),
            vec![
                ("AAA".to_string(), 2020, 10.0),
                ("AAA".to_string(), 2021, 20.0),
                ("BBB".to_string(), 2020, 30.0),
                ("BBB".to_string(), 2021, 40.0),
            ]
        );
    }

    #[test]
    fn test_execute_subset_of_years() {
        let conn = setup();
        let outcome = pivot_table(&conn, "GDP_wide", YearRange::new(2021, 2022), &per_year()).unwrap();
        assert_eq!(outcome.rows_written, 2);
    }

    #[test]
    fn test_execute_empty_wide_table() {
        let conn = setup();
        conn.execute_batch(r#"CREATE TABLE POP_wide ("Country Code" TEXT, "2020" REAL);"#)
            .unwrap();
        let outcome = pivot_table(&conn, "POP_wide", YearRange::new(2020, 2021), &per_year()).unwrap();
        assert_eq!(outcome.rows_written, 0);
        assert!(table_exists(&conn, "POP_long").unwrap());
    }

    #[test]
    fn test_missing_year_column_keeps_previous_long_table() {
        let conn = setup();
        pivot_table(&conn, "GDP_wide", YearRange::new(2020, 2022), &per_year()).unwrap();

        let err = pivot_table(&conn, "GDP_wide", YearRange::new(2020, 2023), &per_year()).unwrap_err();
        match &err {
            StoreError::PivotExecutionError { table, reason, .. } => {
                assert_eq!(table, "GDP_wide");
                assert!(reason.contains("2022"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.aborts_run());
        assert_eq!(count_rows(&conn, "GDP_long").unwrap(), 4);
    }

    #[test]
    fn test_missing_wide_table() {
        let conn = setup();
        let err = pivot_table(&conn, "NONE_wide", YearRange::new(2020, 2021), &per_year()).unwrap_err();
        assert!(matches!(err, StoreError::PivotExecutionError { ref table, .. } if table == "NONE_wide"));
    }

    #[test]
    fn test_pivot_missing_identity_column_fails() {
        let conn = setup();
        conn.execute_batch(
            r#"CREATE TABLE CODE_wide ("Code" TEXT, "2020" REAL);
               INSERT INTO CODE_wide VALUES ('AAA', 1.0);"#,
        )
        .unwrap();

        let err = pivot_table(&conn, "CODE_wide", YearRange::new(2020, 2021), &per_year()).unwrap_err();
        match &err {
            StoreError::PivotExecutionError { table, reason, source } => {
                assert_eq!(table, "CODE_wide");
                assert!(reason.contains("Country Code"));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.aborts_run());
        assert!(!table_exists(&conn, "CODE_long").unwrap());
    }

    #[test]
    fn test_failing_statement_rolls_back() {
        let conn = setup();
        pivot_table(&conn, "GDP_wide", YearRange::new(2020, 2022), &per_year()).unwrap();

        let broken = QueryTemplate::new("broken", "SELECT no_such_column, {year} FROM {wide_table}");
        let err = pivot_table(&conn, "GDP_wide", YearRange::new(2020, 2022), &broken).unwrap_err();
        assert!(matches!(err, StoreError::PivotExecutionError { source: Some(_), .. }));
        assert_eq!(long_rows(&conn, "GDP_long").len(), 4);
    }
}
