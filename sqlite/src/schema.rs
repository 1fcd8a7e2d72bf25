//! Statement generation and catalog lookups for derived tables.
//!
//! Every table name reaching these helpers is checked against the
//! identifier allow-list first, because names are spliced into SQL
//! unquoted.

use std::collections::BTreeSet;

use crossborder_core::{NamingError, YearRange, validate_identifier};
use rusqlite::Connection;
use rusqlite::config::DbConfig;

use crate::error::{Result, StoreError};

/// `DROP TABLE IF EXISTS <table>;`
pub(crate) fn drop_table_sql(table: &str) -> std::result::Result<String, NamingError> {
    validate_identifier(table)?;
    Ok(format!("DROP TABLE IF EXISTS {table};"))
}

/// `CREATE TABLE <table> AS <f1> UNION ALL <f2> ...`
///
/// Trailing semicolons on fragments are dropped so they can be joined.
pub(crate) fn create_table_as_union_sql(
    table: &str,
    fragments: &[String],
) -> std::result::Result<String, NamingError> {
    validate_identifier(table)?;
    let body = fragments
        .iter()
        .map(|f| f.trim().trim_end_matches(';').trim_end())
        .collect::<Vec<_>>()
        .join("\nUNION ALL\n");
    Ok(format!("CREATE TABLE {table} AS\n{body}"))
}

/// Turns off SQLite's double-quoted string literal fallback on `conn`.
///
/// Afterwards a double-quoted name that matches no column is an error
/// instead of a string literal. Idempotent.
pub fn strict_quoted_identifiers(conn: &Connection) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DML, false)?;
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DQS_DDL, false)?;
    Ok(())
}

/// Returns `true` if a table with this exact name exists.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let count: i64 = stmt.query_row([table], |row| row.get(0))?;
    Ok(count > 0)
}

/// Column names of a table, in declaration order.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    validate_identifier(table)?;
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|e| StoreError::query(table, e))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| StoreError::query(table, e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StoreError::query(table, e))?;
    Ok(columns)
}

/// Years in `years` with no matching column in `columns`.
pub(crate) fn missing_year_columns(columns: &[String], years: YearRange) -> Vec<i32> {
    let present: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    years
        .years()
        .filter(|year| !present.contains(year.to_string().as_str()))
        .collect()
}

/// Row count of a table.
pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    validate_identifier(table)?;
    let count: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|e| StoreError::query(table, e))?;
    Ok(count as usize)
}

/// Drops `table` and runs `create_sql` in one transaction, returning the
/// row count of the new table.
///
/// Any failure rolls the transaction back, leaving the previous table (if
/// any) in place. SQLite errors are wrapped with `on_error`.
pub(crate) fn replace_table(
    conn: &Connection,
    table: &str,
    create_sql: &str,
    on_error: impl Fn(rusqlite::Error) -> StoreError,
) -> Result<usize> {
    let drop_sql = drop_table_sql(table)?;

    let tx = conn.unchecked_transaction().map_err(&on_error)?;
    tx.execute_batch(&drop_sql).map_err(&on_error)?;
    tx.execute_batch(create_sql).map_err(&on_error)?;
    let rows: i64 = tx
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(&on_error)?;
    tx.commit().map_err(&on_error)?;
    Ok(rows as usize)
}

/// Formats a list of years compactly for messages (`1960, 1961, 2025`).
pub(crate) fn describe_years(years: &[i32]) -> String {
    years
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
