//! End-to-end orchestration: discover, check, pivot, partition.
//!
//! [`Pipeline`] wires the configured templates, year range and naming
//! convention to one connection. Each step reports per-table outcomes
//! instead of stopping at the first failure; only errors for which
//! [`StoreError::aborts_run`] holds are returned as `Err`.
//!
//! # Example
//!
//! ```no_run
//! use crossborder_config::PipelineConfig;
//! use crossborder_sqlite::Pipeline;
//! use rusqlite::Connection;
//!
//! let config = PipelineConfig::load("conf/pipeline.yaml").unwrap();
//! let conn = Connection::open(&config.database).unwrap();
//! let pipeline = Pipeline::new(&conn, &config).unwrap();
//!
//! let report = pipeline.run().unwrap();
//! println!(
//!     "{} succeeded, {} failed",
//!     report.succeeded(),
//!     report.failed()
//! );
//! ```

use chrono::{DateTime, Utc};
use crossborder_config::{PipelineConfig, QueryTemplate};
use crossborder_core::{
    ConsistencyReport, NamingConvention, YearRange, check_consistency, long_table_name,
};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info};

use crate::discovery::{SchemaCatalog, SqliteCatalog};
use crate::error::{Result, StoreError};
use crate::partition::Partitioner;
use crate::pivot::{PivotOutcome, pivot_table};

/// The three templates a run needs, loaded up front.
#[derive(Debug, Clone)]
pub struct PipelineTemplates {
    /// `{year}`, `{wide_table}`
    pub per_year_select: QueryTemplate,
    /// `{table}`
    pub country_keys: QueryTemplate,
    /// `{indicator}`, `{year_columns}`, `{wide_table}`, `{country_code}`
    pub country_indicator: QueryTemplate,
}

impl PipelineTemplates {
    /// Loads every template named in `config` from its template directory.
    pub fn load(config: &PipelineConfig) -> crossborder_config::Result<Self> {
        let dir = config.template_dir();
        Ok(Self {
            per_year_select: dir.load(&config.templates.per_year_select)?,
            country_keys: dir.load(&config.templates.country_keys)?,
            country_indicator: dir.load(&config.templates.country_indicator)?,
        })
    }
}

/// Whether one table operation succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded { rows: usize },
    Failed { error: String },
}

/// Result of one table-level operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    /// Input table or country code.
    pub source: String,
    /// Table written, if one was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl TableOutcome {
    pub fn succeeded(source: impl Into<String>, target: impl Into<String>, rows: usize) -> Self {
        Self {
            source: source.into(),
            target: Some(target.into()),
            status: OutcomeStatus::Succeeded { rows },
        }
    }

    pub fn failed(source: impl Into<String>, target: Option<String>, error: &StoreError) -> Self {
        Self {
            source: source.into(),
            target,
            status: OutcomeStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

impl From<PivotOutcome> for TableOutcome {
    fn from(outcome: PivotOutcome) -> Self {
        Self::succeeded(outcome.wide_table, outcome.long_table, outcome.rows_written)
    }
}

/// Key-tuple collection plus consistency check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub report: ConsistencyReport,
    /// Tables whose key tuples could not be read.
    pub key_failures: Vec<TableOutcome>,
}

/// Summary of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wide tables found in the store.
    pub discovered: Vec<String>,
    /// Tables dropped before key-tuple comparison.
    pub key_failures: Vec<TableOutcome>,
    /// Deviant tables left out of pivot and partition.
    pub excluded: Vec<String>,
    pub pivots: Vec<TableOutcome>,
    pub partitions: Vec<TableOutcome>,
}

impl RunReport {
    fn outcomes(&self) -> impl Iterator<Item = &TableOutcome> {
        self.key_failures
            .iter()
            .chain(&self.pivots)
            .chain(&self.partitions)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes().filter(|o| !o.is_success()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Runs the pivot engine against one connection.
pub struct Pipeline<'a> {
    conn: &'a Connection,
    years: YearRange,
    naming: NamingConvention,
    templates: PipelineTemplates,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline from configuration, loading its templates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Template`] if a template cannot be loaded.
    pub fn new(conn: &'a Connection, config: &PipelineConfig) -> Result<Self> {
        let templates = PipelineTemplates::load(config)?;
        Ok(Self::from_templates(
            conn,
            config.years,
            config.naming.clone(),
            templates,
        ))
    }

    pub fn from_templates(
        conn: &'a Connection,
        years: YearRange,
        naming: NamingConvention,
        templates: PipelineTemplates,
    ) -> Self {
        Self {
            conn,
            years,
            naming,
            templates,
        }
    }

    pub fn catalog(&self) -> SqliteCatalog<'a> {
        SqliteCatalog::new(self.conn)
    }

    pub fn templates(&self) -> &PipelineTemplates {
        &self.templates
    }

    /// Lists the wide tables currently in the store.
    pub fn discover(&self) -> Result<Vec<String>> {
        self.catalog().list_wide_tables()
    }

    /// Reads every table's key tuples and drops deviant tables.
    pub fn check(&self, tables: &[String]) -> Result<CheckOutcome> {
        let (key_sets, failures) = self
            .catalog()
            .collect_key_sets(tables, &self.templates.country_keys)?;
        let key_failures = failures
            .iter()
            .map(|(table, err)| TableOutcome::failed(table, None, err))
            .collect();
        Ok(CheckOutcome {
            report: check_consistency(key_sets),
            key_failures,
        })
    }

    /// Pivots a single wide table.
    pub fn pivot_one(&self, table: &str) -> Result<PivotOutcome> {
        pivot_table(self.conn, table, self.years, &self.templates.per_year_select)
    }

    /// Pivots each table in turn, continuing past per-table failures.
    pub fn pivot_all(&self, tables: &[String]) -> Result<Vec<TableOutcome>> {
        let mut outcomes = Vec::with_capacity(tables.len());
        for table in tables {
            match self.pivot_one(table) {
                Ok(outcome) => outcomes.push(outcome.into()),
                Err(err) if err.aborts_run() => return Err(err),
                Err(err) => {
                    error!(table = %table, error = %err, "Pivot failed");
                    let target = long_table_name(table).ok();
                    outcomes.push(TableOutcome::failed(table, target, &err));
                }
            }
        }
        Ok(outcomes)
    }

    /// Builds every country table from the retained tables of `report`.
    pub fn partition(&self, report: &ConsistencyReport) -> Result<Vec<TableOutcome>> {
        let partitioner = Partitioner::new(
            self.years,
            self.naming.clone(),
            &self.templates.country_indicator,
        );
        let plan = partitioner.plan(self.conn, report)?;

        let mut outcomes: Vec<TableOutcome> = plan
            .skipped_tables
            .iter()
            .map(|(table, err)| TableOutcome::failed(table, None, err))
            .collect();
        outcomes.extend(plan.rejected_countries.iter().map(|(code, err)| {
            TableOutcome::failed(code, None, &StoreError::InvalidTableName(err.clone()))
        }));

        for country in partitioner.execute(self.conn, &plan)? {
            outcomes.push(match country.result {
                Ok(rows) => TableOutcome::succeeded(country.country_code, country.table, rows),
                Err(err) => TableOutcome::failed(country.country_code, Some(country.table), &err),
            });
        }
        Ok(outcomes)
    }

    /// Discovery, consistency check, pivot of every retained table, then
    /// partition.
    ///
    /// # Errors
    ///
    /// Returns an error only when the run cannot continue: a template
    /// defect or an unusable connection. Per-table failures are recorded
    /// in the report.
    pub fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();

        let discovered = self.discover()?;
        info!(tables = discovered.len(), "Discovery complete");

        let CheckOutcome {
            report,
            key_failures,
        } = self.check(&discovered)?;

        let retained: Vec<String> = report.retained.keys().cloned().collect();
        let pivots = self.pivot_all(&retained)?;
        let partitions = self.partition(&report)?;

        let run = RunReport {
            started_at,
            finished_at: Utc::now(),
            discovered,
            key_failures,
            excluded: report.excluded,
            pivots,
            partitions,
        };
        info!(
            succeeded = run.succeeded(),
            failed = run.failed(),
            excluded = run.excluded.len(),
            "Run complete"
        );
        Ok(run)
    }
}
