//! Error types for configuration, catalog, and template loading.
//!
//! Every variant here indicates a deployment defect rather than a data
//! problem, so callers surface them immediately instead of retrying.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration or rendering templates.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Template location does not resolve to readable text.
    #[error("template not found: {}", path.display())]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A placeholder in the template has no supplied value.
    #[error("template '{template}' has no value for placeholder '{{{parameter}}}'")]
    TemplateParameterMissing { template: String, parameter: String },

    /// Indicator catalog is missing its section or has non-string entries.
    #[error("invalid indicator catalog: {0}")]
    InvalidCatalog(String),

    /// Pipeline configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
