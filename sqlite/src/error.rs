//! Error types for store operations.
//!
//! Store-level failures are scoped to one table: the caller rolls back,
//! records the failure, and moves on. [`StoreError::is_fatal`] picks out
//! the cases where the connection itself is unusable and the run must stop.

use crossborder_config::ConfigError;
use crossborder_core::NamingError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while discovering, pivoting, or partitioning.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure outside any specific table operation.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A table name or substituted value broke the naming rules.
    #[error(transparent)]
    InvalidTableName(#[from] NamingError),

    /// A template could not be loaded or rendered.
    #[error(transparent)]
    Template(#[from] ConfigError),

    /// A read query against one table failed.
    #[error("query on table '{table}' failed: {source}")]
    QueryExecutionError {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Building a long table failed; the previous long table is untouched.
    #[error("pivot of '{table}' failed: {reason}")]
    PivotExecutionError {
        table: String,
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Building a per-country table failed; the previous table is untouched.
    #[error("partition table '{table}' failed: {reason}")]
    PartitionExecutionError {
        table: String,
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },
}

impl StoreError {
    /// Returns `true` when the connection can no longer be used, so the
    /// remaining tables must not be attempted.
    pub fn is_fatal(&self) -> bool {
        let Some(err) = self.sqlite_error() else {
            return false;
        };
        matches!(
            err.sqlite_error_code(),
            Some(
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
                    | ErrorCode::OutOfMemory
            )
        )
    }

    /// Returns `true` for template and configuration defects, which abort
    /// a run instead of failing a single table.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Returns `true` if processing should stop rather than continue with
    /// the next table.
    pub fn aborts_run(&self) -> bool {
        self.is_fatal() || self.is_configuration()
    }

    fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::DatabaseError(err) | Self::QueryExecutionError { source: err, .. } => Some(err),
            Self::PivotExecutionError { source, .. } | Self::PartitionExecutionError { source, .. } => {
                source.as_ref()
            }
            Self::InvalidTableName(_) | Self::Template(_) => None,
        }
    }

    pub(crate) fn query(table: &str, source: rusqlite::Error) -> Self {
        Self::QueryExecutionError {
            table: table.to_string(),
            source,
        }
    }

    pub(crate) fn pivot(table: &str, reason: impl Into<String>, source: Option<rusqlite::Error>) -> Self {
        Self::PivotExecutionError {
            table: table.to_string(),
            reason: reason.into(),
            source,
        }
    }

    pub(crate) fn partition(
        table: &str,
        reason: impl Into<String>,
        source: Option<rusqlite::Error>,
    ) -> Self {
        Self::PartitionExecutionError {
            table: table.to_string(),
            reason: reason.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
