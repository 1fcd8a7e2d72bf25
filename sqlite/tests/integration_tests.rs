//! Integration tests for the crossborder-sqlite crate.
//!
//! These run against on-disk databases and the query templates shipped in
//! `sql/queries`.

use std::path::{Path, PathBuf};

use crossborder_config::{PipelineConfig, TemplateDir};
use crossborder_core::{NamingConvention, YearRange};
use crossborder_sqlite::{
    OutcomeStatus, Pipeline, PipelineTemplates, SchemaCatalog, StoreError, count_rows,
    pivot_table, table_fingerprint,
};
use rusqlite::Connection;
use tempfile::TempDir;

fn shipped_templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../sql/queries")
}

fn shipped_templates() -> PipelineTemplates {
    let dir = TemplateDir::new(shipped_templates_dir());
    PipelineTemplates {
        per_year_select: dir.load("per_year_select").unwrap(),
        country_keys: dir.load("countries_name").unwrap(),
        country_indicator: dir.load("country_indicator").unwrap(),
    }
}

/// Opens a fresh database file inside a temp directory.
fn open_store() -> (TempDir, PathBuf, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worldbank.db");
    let conn = Connection::open(&path).unwrap();
    (dir, path, conn)
}

/// Creates a World Bank shaped wide table with the given year columns and
/// one row per country; values are `country_index * 100 + year offset`.
fn create_wide(conn: &Connection, table: &str, indicator: &str, years: YearRange, codes: &[&str]) {
    let year_defs: Vec<String> = years.years().map(|y| format!("\"{y}\" REAL")).collect();
    conn.execute_batch(&format!(
        r#"CREATE TABLE {table} ("Country Name" TEXT, "Country Code" TEXT, "Indicator Name" TEXT, "Indicator Code" TEXT, {});"#,
        year_defs.join(", ")
    ))
    .unwrap();

    for (i, code) in codes.iter().enumerate() {
        let values: Vec<String> = years
            .years()
            .map(|y| ((i as i32) * 100 + (y - years.start)).to_string())
            .collect();
        conn.execute_batch(&format!(
            "INSERT INTO {table} VALUES ('{code} name', '{code}', '{indicator} name', '{indicator}', {});",
            values.join(", ")
        ))
        .unwrap();
    }
}

fn pipeline(conn: &Connection, years: YearRange) -> Pipeline<'_> {
    Pipeline::from_templates(conn, years, NamingConvention::default(), shipped_templates())
}

#[test]
fn test_gdp_example_produces_exact_long_rows() {
    let (_dir, _path, conn) = open_store();
    conn.execute_batch(
        r#"CREATE TABLE GDP_wide ("Country Code" TEXT, "2020" REAL, "2021" REAL);
           INSERT INTO GDP_wide VALUES ('AAA', 10, 20), ('BBB', 30, 40);"#,
    )
    .unwrap();

    let outcome = pivot_table(
        &conn,
        "GDP_wide",
        YearRange::new(2020, 2022),
        &shipped_templates().per_year_select,
    )
    .unwrap();
    assert_eq!(outcome.long_table, "GDP_long");
    assert_eq!(outcome.rows_written, 4);

    let mut stmt = conn
        .prepare("SELECT country, year, value FROM GDP_long ORDER BY country, year")
        .unwrap();
    let rows: Vec<(String, i64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            ("AAA".to_string(), 2020, 10.0),
            ("AAA".to_string(), 2021, 20.0),
            ("BBB".to_string(), 2020, 30.0),
            ("BBB".to_string(), 2021, 40.0),
        ]
    );
}

#[test]
fn test_row_count_is_rows_times_years() {
    let (_dir, _path, conn) = open_store();
    let years = YearRange::new(2000, 2010);
    create_wide(&conn, "API_EN_POP_wide", "EN.POP", years, &["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG"]);

    let outcome = pivot_table(&conn, "API_EN_POP_wide", years, &shipped_templates().per_year_select)
        .unwrap();
    assert_eq!(outcome.rows_written, 7 * 10);

    let distinct: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT country, year FROM API_EN_POP_long)",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(distinct, 70);
}

#[test]
fn test_rebuild_is_idempotent() {
    let (_dir, _path, conn) = open_store();
    let years = YearRange::new(1990, 1995);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA", "BBB", "CCC"]);
    let template = shipped_templates().per_year_select;

    pivot_table(&conn, "API_GDP_wide", years, &template).unwrap();
    let first = table_fingerprint(&conn, "API_GDP_long").unwrap();
    pivot_table(&conn, "API_GDP_wide", years, &template).unwrap();
    let second = table_fingerprint(&conn, "API_GDP_long").unwrap();

    assert_eq!(first, second);
    assert_eq!(count_rows(&conn, "API_GDP_long").unwrap(), 15);
}

#[test]
fn test_failed_pivot_leaves_previous_long_table_on_disk() {
    let (_dir, path, conn) = open_store();
    let years = YearRange::new(2000, 2003);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA", "BBB"]);
    let template = shipped_templates().per_year_select;

    pivot_table(&conn, "API_GDP_wide", years, &template).unwrap();
    let before = table_fingerprint(&conn, "API_GDP_long").unwrap();

    let err = pivot_table(&conn, "API_GDP_wide", YearRange::new(2000, 2004), &template).unwrap_err();
    assert!(matches!(err, StoreError::PivotExecutionError { .. }));
    assert!(err.to_string().contains("2003"));
    drop(conn);

    let reopened = Connection::open(&path).unwrap();
    assert_eq!(table_fingerprint(&reopened, "API_GDP_long").unwrap(), before);
}

#[test]
fn test_partition_builds_table_per_country_with_null_rows() {
    let (_dir, _path, conn) = open_store();
    let years = YearRange::new(2020, 2022);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA", "BBB", "CCC"]);
    create_wide(&conn, "API_POP_wide", "POP", years, &["AAA", "BBB", "DDD"]);

    let pipeline = pipeline(&conn, years);
    let tables = pipeline.discover().unwrap();
    let check = pipeline.check(&tables).unwrap();
    assert!(check.report.excluded.is_empty());

    let outcomes = pipeline.partition(&check.report).unwrap();
    // Country set comes from API_GDP_wide, the first retained table.
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_success()));

    for code in ["AAA", "BBB", "CCC"] {
        assert_eq!(count_rows(&conn, &format!("country_{code}_wide")).unwrap(), 2);
    }
    let pop_2020: Option<f64> = conn
        .query_row(
            r#"SELECT "2020" FROM country_CCC_wide WHERE indicator = 'POP'"#,
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(pop_2020, None);

    let gdp_2021: f64 = conn
        .query_row(
            r#"SELECT "2021" FROM country_BBB_wide WHERE indicator = 'GDP'"#,
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(gdp_2021, 101.0);
}

#[test]
fn test_run_continues_past_single_table_failure() {
    let (_dir, _path, conn) = open_store();
    let years = YearRange::new(2020, 2022);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA", "BBB"]);
    create_wide(&conn, "API_POP_wide", "POP", years, &["AAA", "BBB"]);
    // Same countries, but one year short.
    create_wide(&conn, "API_CO2_wide", "CO2", YearRange::new(2020, 2021), &["AAA", "BBB"]);

    let report = pipeline(&conn, years).run().unwrap();
    assert!(report.excluded.is_empty());
    assert_eq!(report.pivots.len(), 3);

    let failed: Vec<_> = report.pivots.iter().filter(|o| !o.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source, "API_CO2_wide");
    assert!(matches!(failed[0].status, OutcomeStatus::Failed { .. }));

    assert_eq!(count_rows(&conn, "API_GDP_long").unwrap(), 4);
    assert_eq!(count_rows(&conn, "API_POP_long").unwrap(), 4);
    assert!(report.has_failures());
}

#[test]
fn test_second_run_ignores_country_tables() {
    let (_dir, _path, conn) = open_store();
    let years = YearRange::new(2020, 2022);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA", "BBB"]);
    create_wide(&conn, "API_POP_wide", "POP", years, &["AAA", "BBB"]);

    let pipeline = pipeline(&conn, years);
    let first = pipeline.run().unwrap();
    let country_before = table_fingerprint(&conn, "country_AAA_wide").unwrap();
    let second = pipeline.run().unwrap();

    assert_eq!(first.discovered, second.discovered);
    assert_eq!(second.discovered, vec!["API_GDP_wide", "API_POP_wide"]);
    assert_eq!(table_fingerprint(&conn, "country_AAA_wide").unwrap(), country_before);
    assert!(!second.has_failures());
}

#[test]
fn test_pipeline_from_config_file() {
    let (dir, db_path, conn) = open_store();
    let years = YearRange::new(2020, 2022);
    create_wide(&conn, "API_GDP_wide", "GDP", years, &["AAA"]);
    create_wide(&conn, "API_POP_wide", "POP", years, &["AAA"]);

    let config_path = dir.path().join("pipeline.yaml");
    std::fs::write(
        &config_path,
        format!(
            "database: {}\ntemplates_dir: {}\nyears:\n  start: 2020\n  end: 2022\n",
            db_path.display(),
            shipped_templates_dir().display()
        ),
    )
    .unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    let pipeline = Pipeline::new(&conn, &config).unwrap();
    let report = pipeline.run().unwrap();
    assert_eq!(report.pivots.len(), 2);
    assert_eq!(report.partitions.len(), 1);
    assert_eq!(report.succeeded(), 3);
}

#[test]
fn test_missing_template_aborts_before_any_write() {
    let (dir, _path, conn) = open_store();
    create_wide(&conn, "API_GDP_wide", "GDP", YearRange::new(2020, 2022), &["AAA"]);

    let config = PipelineConfig {
        templates_dir: dir.path().join("no-templates"),
        ..PipelineConfig::default()
    };
    match Pipeline::new(&conn, &config) {
        Err(err) => assert!(err.is_configuration()),
        Ok(_) => panic!("expected a template error"),
    }
    assert_eq!(
        pipeline(&conn, YearRange::new(2020, 2022))
            .catalog()
            .list_wide_tables()
            .unwrap(),
        vec!["API_GDP_wide"]
    );
}
