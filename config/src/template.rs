//! Placeholder-based SQL query templates.
//!
//! A template is plain SQL text with `{name}` placeholders, for example
//!
//! ```sql
//! SELECT "Country Code" AS country, {year} AS year, "{year}" AS value
//! FROM {wide_table}
//! ```
//!
//! Rendering is pure string substitution. No quoting or escaping is
//! applied, so every identifier passed in must already satisfy
//! [`crossborder_core::validate_identifier`].
//!
//! # Examples
//!
//! ```
//! use crossborder_config::{QueryTemplate, TemplateParams};
//!
//! let template = QueryTemplate::new("per_year", r#"SELECT "{year}" FROM {wide_table}"#);
//! let sql = template
//!     .render(&TemplateParams::new().with("year", 2020).with("wide_table", "GDP_wide"))
//!     .unwrap();
//! assert_eq!(sql, r#"SELECT "2020" FROM GDP_wide"#);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{ConfigError, Result};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex must compile")
});

/// Extension tried when a template name has no file of its own.
const TEMPLATE_EXTENSION: &str = "sql";

/// Named values substituted into a [`QueryTemplate`].
#[derive(Debug, Clone, Default)]
pub struct TemplateParams {
    values: BTreeMap<String, String>,
}

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value and returns `self`, for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.set(key, value);
        self
    }

    /// Adds or replaces a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Display) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// A loaded query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    name: String,
    text: String,
}

impl QueryTemplate {
    /// Wraps template text that is already in memory.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Reads a template file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateNotFound`] if the file is missing, is
    /// not UTF-8, or holds only whitespace.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::TemplateNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(ConfigError::TemplateNotFound {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "template is empty"),
            });
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(template = %name, path = %path.display(), "Loaded query template");
        Ok(Self::new(name, text))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder names used by this template.
    pub fn placeholders(&self) -> BTreeSet<&str> {
        PLACEHOLDER_RE
            .captures_iter(&self.text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitutes every placeholder with its value from `params`.
    ///
    /// Values in `params` that the template does not use are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateParameterMissing`] naming the first
    /// placeholder (in name order) that has no value.
    pub fn render(&self, params: &TemplateParams) -> Result<String> {
        if let Some(missing) = self.placeholders().into_iter().find(|p| params.get(p).is_none()) {
            return Err(ConfigError::TemplateParameterMissing {
                template: self.name.clone(),
                parameter: missing.to_string(),
            });
        }

        let rendered = PLACEHOLDER_RE.replace_all(&self.text, |caps: &Captures<'_>| {
            params.get(&caps[1]).unwrap_or_default().to_string()
        });
        Ok(rendered.trim().to_string())
    }
}

/// A directory of template files addressed by name.
///
/// `load("per_year_select")` reads `per_year_select` if that file exists,
/// otherwise `per_year_select.sql`.
#[derive(Debug, Clone)]
pub struct TemplateDir {
    root: PathBuf,
}

impl TemplateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a template name resolves to.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let exact = self.root.join(name);
        if exact.is_file() {
            return exact;
        }
        self.root.join(format!("{name}.{TEMPLATE_EXTENSION}"))
    }

    /// Loads a template by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateNotFound`] if neither candidate file
    /// can be read.
    pub fn load(&self, name: &str) -> Result<QueryTemplate> {
        let mut template = QueryTemplate::load(self.resolve(name))?;
        template.name = name.to_string();
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let template = QueryTemplate::new(
            "per_year",
            r#"SELECT "Country Code" AS country, {year} AS year, "{year}" AS value FROM {wide_table}"#,
        );
        let sql = template
            .render(&TemplateParams::new().with("year", 1999).with("wide_table", "GDP_wide"))
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "Country Code" AS country, 1999 AS year, "1999" AS value FROM GDP_wide"#
        );
    }

    #[test]
    fn test_render_reports_missing_parameter() {
        let template = QueryTemplate::new("keys", "SELECT * FROM {table} WHERE x = '{country_code}'");
        let err = template
            .render(&TemplateParams::new().with("table", "t_wide"))
            .unwrap_err();
        match err {
            ConfigError::TemplateParameterMissing { template, parameter } => {
                assert_eq!(template, "keys");
                assert_eq!(parameter, "country_code");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_ignores_extra_parameters() {
        let template = QueryTemplate::new("t", "SELECT 1 FROM {table}");
        let sql = template
            .render(&TemplateParams::new().with("table", "a_wide").with("year", 2000))
            .unwrap();
        assert_eq!(sql, "SELECT 1 FROM a_wide");
    }

    #[test]
    fn test_render_does_not_escape_values() {
        let template = QueryTemplate::new("t", "SELECT '{v}'");
        let sql = template.render(&TemplateParams::new().with("v", "it's")).unwrap();
        assert_eq!(sql, "SELECT 'it's'");
    }

    #[test]
    fn test_render_trims_trailing_whitespace() {
        let template = QueryTemplate::new("t", "SELECT {x}\n\n");
        assert_eq!(template.render(&TemplateParams::new().with("x", 1)).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_placeholders_ignore_non_identifier_braces() {
        let template = QueryTemplate::new("t", "SELECT '{}' , '{1x}', {year_columns}, {year_columns}");
        let names: Vec<_> = template.placeholders().into_iter().collect();
        assert_eq!(names, vec!["year_columns"]);
    }

    #[test]
    fn test_params_set_replaces_value() {
        let mut params = TemplateParams::new().with("table", "a");
        params.set("table", "b");
        assert_eq!(params.get("table"), Some("b"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_load_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateDir::new(dir.path()).load("nope").unwrap_err();
        assert!(matches!(err, ConfigError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_load_empty_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.sql"), "  \n").unwrap();
        let err = TemplateDir::new(dir.path()).load("blank").unwrap_err();
        assert!(matches!(err, ConfigError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_load_non_utf8_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.sql"), [0xff, 0xfe, 0x00]).unwrap();
        assert!(TemplateDir::new(dir.path()).load("bin").is_err());
    }

    #[test]
    fn test_load_prefers_exact_name_then_sql_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("countries_name"), "SELECT 'exact' FROM {table}").unwrap();
        std::fs::write(dir.path().join("tables.sql"), "SELECT 'ext'").unwrap();

        let templates = TemplateDir::new(dir.path());
        let exact = templates.load("countries_name").unwrap();
        assert_eq!(exact.name(), "countries_name");
        assert!(exact.text().contains("exact"));

        let ext = templates.load("tables").unwrap();
        assert_eq!(ext.name(), "tables");
        assert_eq!(ext.text(), "SELECT 'ext'");
    }
}
