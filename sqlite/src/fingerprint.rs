//! Ordered content fingerprints of tables.
//!
//! The digest covers every row, sorted by all columns in declaration
//! order, so two tables with the same rows hash equal regardless of
//! insertion order. Each value is tagged with its storage class before
//! hashing, which keeps `1` (integer), `1.0` (real) and `'1'` (text)
//! distinct.

use crossborder_core::validate_identifier;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, StoreError};

/// SHA-256 hex digest of a table's ordered rows.
///
/// # Errors
///
/// Returns [`StoreError::QueryExecutionError`] if the table does not exist
/// or cannot be read.
pub fn table_fingerprint(conn: &Connection, table: &str) -> Result<String> {
    validate_identifier(table)?;
    let column_count = conn
        .prepare(&format!("SELECT * FROM {table}"))
        .map_err(|e| StoreError::query(table, e))?
        .column_count();

    let order_by = (1..=column_count)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("SELECT * FROM {table} ORDER BY {order_by}");

    let mut stmt = conn.prepare(&sql).map_err(|e| StoreError::query(table, e))?;
    let mut rows = stmt.query([]).map_err(|e| StoreError::query(table, e))?;

    let mut hasher = Sha256::new();
    let mut count = 0usize;
    while let Some(row) = rows.next().map_err(|e| StoreError::query(table, e))? {
        for i in 0..column_count {
            let value = row.get_ref(i).map_err(|e| StoreError::query(table, e))?;
            hash_value(&mut hasher, value);
        }
        hasher.update(b"\n");
        count += 1;
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!(table = %table, rows = count, digest = %digest, "Fingerprinted table");
    Ok(digest)
}

fn hash_value(hasher: &mut Sha256, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => hasher.update(b"N"),
        ValueRef::Integer(i) => {
            hasher.update(b"I");
            hasher.update(i.to_le_bytes());
        }
        ValueRef::Real(f) => {
            hasher.update(b"R");
            hasher.update(f.to_bits().to_le_bytes());
        }
        ValueRef::Text(bytes) => {
            hasher.update(b"T");
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        ValueRef::Blob(bytes) => {
            hasher.update(b"B");
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
    }
}
