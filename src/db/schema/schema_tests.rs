use super::*;
use crate::db::artifact::{Artifact, Connection};
use crate::db::connection::{BackendCredentials, SqliteCredentials};
use crate::db::dispatch::dispatch;
use crate::db::driver::{Driver, EngineOptions};
use crate::db::request::resolve;
use crate::db::sqlite::SqliteDriver;
use crate::db::testing::FakeDriver;
use crate::db::value::QueryOutput;
use chrono::NaiveDate;
use tempfile::TempDir;

fn sqlite_credentials(dir: &TempDir) -> BackendCredentials {
    BackendCredentials::Sqlite(SqliteCredentials::new(dir.path().join("schema")).unwrap())
}

fn sqlite(dir: &TempDir) -> Connection {
    let inner = SqliteDriver.connect(&sqlite_credentials(dir)).unwrap();
    Connection::new(Backend::Sqlite, inner)
}

fn fake_oracle(driver: &FakeDriver) -> Connection {
    let credentials = BackendCredentials::from_record(
        Backend::Oracle,
        &crate::db::CredentialRecord::oracle("scott", "tiger", "db", "ORCL"),
    )
    .unwrap();
    Connection::new(Backend::Oracle, driver.connect(&credentials).unwrap())
}

fn people() -> TableData {
    let mut data = TableData::new(&["nome", "idade"]);
    data.push_row(vec![Value::from("aaa"), Value::Integer(10)]).unwrap();
    data.push_row(vec![Value::from("bbb"), Value::Integer(20)]).unwrap();
    data.push_row(vec![Value::from("ccc"), Value::Integer(30)]).unwrap();
    data
}

fn text(row: &Row, i: usize) -> String {
    row[i].to_string()
}

#[test]
fn test_format_columns() {
    let columns = vec![ColumnSpec::new("id", "integer"), ("name", "varchar(40)").into()];
    assert_eq!(
        format_columns(&columns).unwrap(),
        "ID INTEGER, NAME VARCHAR(40)"
    );
}

#[test]
fn test_format_columns_rejects_empty() {
    assert!(matches!(
        format_columns(&[]).unwrap_err(),
        Error::InvalidColumns(_)
    ));
    assert!(matches!(
        format_columns(&[ColumnSpec::new("id", " ")]).unwrap_err(),
        Error::InvalidColumns(_)
    ));
}

#[test]
fn test_from_pairs_length_mismatch() {
    let err = ColumnSpec::from_pairs(&["a", "b"], &["integer"]).unwrap_err();
    assert!(matches!(err, Error::InvalidColumns(_)));

    let specs = ColumnSpec::from_pairs(&["a", "b"], &["integer", "date"]).unwrap();
    assert_eq!(specs[1], ColumnSpec::new("b", "date"));
}

#[test]
fn test_column_type_inference() {
    let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let mut data = TableData::new(&["i", "f", "s", "d", "n"]);
    data.push_row(vec![
        Value::Null,
        Value::Float(1.5),
        Value::from("x"),
        Value::Timestamp(ts),
        Value::Null,
    ])
    .unwrap();
    data.push_row(vec![
        Value::Integer(1),
        Value::Float(2.5),
        Value::from("y"),
        Value::Timestamp(ts),
        Value::Null,
    ])
    .unwrap();

    assert_eq!(
        data.column_types(),
        vec![
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Varchar,
            ColumnType::Date,
            ColumnType::Varchar,
        ]
    );
    assert_eq!(data.column_specs()[0], ColumnSpec::new("I", "integer"));
}

#[test]
fn test_push_row_checks_width() {
    let mut data = TableData::new(&["a"]);
    assert!(data.push_row(vec![Value::Null, Value::Null]).is_err());
    assert!(data.rows.is_empty());
}

#[test]
fn test_sqlite_create_find_and_exists() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    create_table(
        &conn,
        "p_teste",
        &[ColumnSpec::new("id", "integer")],
        false,
    )
    .unwrap();
    create_table(&conn, "other", &[ColumnSpec::new("id", "integer")], false).unwrap();

    let found = find_table(&conn, Some("teste"), TableScope::default(), Fetch::All).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(text(&found[0], 0), "p_teste");

    let all = find_table(&conn, None, TableScope::default(), Fetch::All).unwrap();
    assert_eq!(all.len(), 2);
    let first = find_table(&conn, None, TableScope::default(), Fetch::First(1)).unwrap();
    assert_eq!(first.len(), 1);

    assert!(table_exists(&conn, "p_teste", TableScope::default(), None).unwrap());
    assert!(!table_exists(&conn, "missing", TableScope::default(), None).unwrap());
}

#[test]
fn test_sqlite_create_if_not_exists() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    let columns = [ColumnSpec::new("id", "integer")];
    create_table(&conn, "t", &columns, false).unwrap();
    assert!(create_table(&conn, "t", &columns, false).is_err());
    create_table(&conn, "t", &columns, true).unwrap();
}

#[test]
fn test_sqlite_drop_table() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    create_table(&conn, "t", &[ColumnSpec::new("id", "integer")], false).unwrap();
    drop_table(&conn, "t").unwrap();
    assert!(!table_exists(&conn, "t", TableScope::default(), None).unwrap());
}

#[test]
fn test_sqlite_insert_rows() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    create_table(
        &conn,
        "t",
        &ColumnSpec::from_pairs(&["a", "b"], &["integer", "text"]).unwrap(),
        false,
    )
    .unwrap();

    let rows = vec![
        vec![Value::Integer(1), Value::from("x")],
        vec![Value::Integer(2), Value::Null],
    ];
    assert_eq!(insert_rows(&conn, "t", &["a", "b"], &rows).unwrap(), 2);

    let output = conn.query("SELECT a, b FROM t ORDER BY a", &[]).unwrap();
    assert_eq!(output.rows, rows);
}

#[test]
fn test_insert_rows_checks_width() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    let err = insert_rows(&conn, "t", &["a", "b"], &[vec![Value::Integer(1)]]).unwrap_err();
    assert!(matches!(err, Error::InvalidColumns(_)));
}

#[test]
fn test_find_column_unsupported_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    let err = find_column(&conn, "id", None, TableScope::default(), Fetch::All).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedBackend {
            backend: Backend::Sqlite,
            operation: "find_column"
        }
    ));
}

#[test]
fn test_insert_table_creates_and_commits() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    let inserted = insert_table(
        &conn,
        "p_teste_nsds",
        &people(),
        IfExists::Fail,
        CommitPolicy::Strict,
    )
    .unwrap();
    assert_eq!(inserted, 3);

    let other = sqlite(&dir);
    let output = other
        .query("SELECT NOME, IDADE FROM p_teste_nsds ORDER BY IDADE", &[])
        .unwrap();
    assert_eq!(output.rows.len(), 3);
    assert_eq!(output.rows[2], vec![Value::from("ccc"), Value::Integer(30)]);
}

#[test]
fn test_insert_table_fail_when_exists() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::Strict).unwrap();
    let err = insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::Strict)
        .unwrap_err();
    assert!(matches!(err, Error::TableExists(ref name) if name == "t"));
}

#[test]
fn test_insert_table_append_and_replace() {
    let dir = TempDir::new().unwrap();
    let conn = sqlite(&dir);
    insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::Strict).unwrap();
    insert_table(&conn, "t", &people(), IfExists::Append, CommitPolicy::Strict).unwrap();
    let count = conn.query("SELECT COUNT(*) FROM t", &[]).unwrap();
    assert_eq!(count.rows[0][0], Value::Integer(6));

    insert_table(&conn, "t", &people(), IfExists::Replace, CommitPolicy::Strict).unwrap();
    let count = conn.query("SELECT COUNT(*) FROM t", &[]).unwrap();
    assert_eq!(count.rows[0][0], Value::Integer(3));
}

#[test]
fn test_insert_table_through_engine() {
    let dir = TempDir::new().unwrap();
    let plan = resolve("engine").unwrap();
    let artifacts = dispatch(
        &plan,
        &SqliteDriver,
        &sqlite_credentials(&dir),
        &EngineOptions::default(),
    )
    .unwrap();
    let engine = match artifacts.into_single() {
        Some(Artifact::Engine(engine)) => engine,
        other => panic!("expected engine, got {:?}", other),
    };

    insert_table(&engine, "t", &people(), IfExists::Fail, CommitPolicy::Strict).unwrap();
    assert!(table_exists(&engine, "t", TableScope::default(), None).unwrap());
}

#[test]
fn test_oracle_find_table_sql() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    find_table(&conn, Some("teste"), TableScope::Dba, Fetch::All).unwrap();
    find_table(&conn, Some("teste"), TableScope::User, Fetch::All).unwrap();

    let statements = driver.statements();
    assert_eq!(
        statements[0].0,
        "SELECT owner, table_name FROM dba_tables WHERE table_name LIKE :1 ORDER BY owner, table_name"
    );
    assert_eq!(statements[0].1, vec![Value::from("%TESTE%")]);
    assert_eq!(
        statements[1].0,
        "SELECT table_name FROM user_tables WHERE table_name LIKE :1 ORDER BY table_name"
    );
}

#[test]
fn test_oracle_table_exists_with_owner_prefix() {
    let driver = FakeDriver::new(Backend::Oracle);
    driver.push_output(QueryOutput {
        columns: vec!["COUNT(*)".to_string()],
        rows: vec![vec![Value::Integer(1)]],
    });
    let conn = fake_oracle(&driver);

    assert!(table_exists(&conn, "sas.p_teste", TableScope::All, None).unwrap());
    let (sql, params) = &driver.statements()[0];
    assert!(sql.starts_with("SELECT COUNT(*) FROM all_objects"));
    assert!(sql.ends_with("AND owner = :2"));
    assert_eq!(params, &vec![Value::from("P_TESTE"), Value::from("SAS")]);
}

#[test]
fn test_oracle_table_exists_user_scope_ignores_owner() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    assert!(!table_exists(&conn, "t", TableScope::User, Some("sas")).unwrap());
    let (sql, params) = &driver.statements()[0];
    assert!(sql.starts_with("SELECT COUNT(*) FROM user_objects"));
    assert_eq!(params.len(), 1);
}

#[test]
fn test_oracle_find_column_sql() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    find_column(&conn, "cpf", Some("cliente"), TableScope::All, Fetch::All).unwrap();
    let (sql, params) = &driver.statements()[0];
    assert!(sql.contains("FROM all_tables tabs INNER JOIN all_tab_cols cols"));
    assert!(sql.contains("tabs.owner = cols.owner"));
    assert_eq!(
        params,
        &vec![Value::from("%CLIENTE%"), Value::from("%CPF%")]
    );
}

#[test]
fn test_oracle_insert_rows_uses_numbered_binds() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    let rows = vec![vec![Value::Integer(1), Value::from("a")]];
    insert_rows(&conn, "t", &["id", "name"], &rows).unwrap();
    let (sql, params) = &driver.statements()[0];
    assert_eq!(sql, "INSERT INTO t (ID, NAME) VALUES (:1, :2)");
    assert_eq!(params, &rows[0]);
}

#[test]
fn test_oracle_insert_table_commits_on_same_connection() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::Strict).unwrap();

    let statements: Vec<String> = driver.statements().into_iter().map(|(sql, _)| sql).collect();
    assert!(statements[0].starts_with("SELECT COUNT(*) FROM user_objects"));
    assert_eq!(statements[1], "CREATE TABLE t (NOME VARCHAR(40), IDADE INTEGER)");
    assert_eq!(statements.last().map(String::as_str), Some("COMMIT"));
    assert_eq!(driver.connect_count(), 1);
}

#[test]
fn test_commit_policies() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::Skip).unwrap();
    assert!(!driver.statements().iter().any(|(sql, _)| sql == "COMMIT"));

    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    insert_table(&conn, "t", &people(), IfExists::Fail, CommitPolicy::BestEffort).unwrap();
    assert!(driver.statements().iter().any(|(sql, _)| sql == "COMMIT"));
}

#[test]
fn test_insert_table_on_closed_connection() {
    let driver = FakeDriver::new(Backend::Oracle);
    let conn = fake_oracle(&driver);
    let cursor = conn.cursor();
    conn.close().unwrap();
    let err = insert_table(&cursor, "t", &people(), IfExists::Fail, CommitPolicy::BestEffort)
        .unwrap_err();
    assert!(matches!(err, Error::Driver(crate::error::DriverError::Closed)));
}
