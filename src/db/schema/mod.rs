//! Schema introspection and row operations that work through any artifact.
//!
//! Table and column names are interpolated into the SQL text as given;
//! search patterns and row values are bound as parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::db::artifact::{Connector, Cursor};
use crate::db::value::{Row, Value};
use crate::db::Backend;
use crate::error::{Error, Result};

/// Which family of Oracle dictionary views to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableScope {
    #[default]
    Dba,
    All,
    User,
}

impl TableScope {
    fn prefix(&self) -> &'static str {
        match self {
            TableScope::Dba => "dba",
            TableScope::All => "all",
            TableScope::User => "user",
        }
    }

    /// `user_*` views have no owner column.
    fn has_owner(&self) -> bool {
        !matches!(self, TableScope::User)
    }
}

impl fmt::Display for TableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// How many rows of a search to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fetch {
    #[default]
    All,
    First(usize),
}

impl Fetch {
    fn take(&self, cursor: &mut Cursor) -> Vec<Row> {
        match self {
            Fetch::All => cursor.fetch_all(),
            Fetch::First(n) => cursor.fetch_many(*n),
        }
    }
}

/// What to do when `insert_table` finds the table already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfExists {
    #[default]
    Fail,
    Replace,
    Append,
}

/// What to do with the commit that follows an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit and return any failure.
    #[default]
    Strict,
    /// Commit, log a failure and carry on.
    BestEffort,
    /// Leave the transaction open for the caller.
    Skip,
}

/// SQL type used for a column created from inferred values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Varchar,
    Date,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Varchar => "varchar(40)",
            ColumnType::Date => "date",
        }
    }

    /// Type of the first non-null value, `varchar(40)` when there is none.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values
            .into_iter()
            .find_map(|value| match value {
                Value::Null => None,
                Value::Integer(_) => Some(ColumnType::Integer),
                Value::Float(_) => Some(ColumnType::Float),
                Value::Timestamp(_) => Some(ColumnType::Date),
                Value::Text(_) | Value::Blob(_) => Some(ColumnType::Varchar),
            })
            .unwrap_or(ColumnType::Varchar)
    }
}

/// A column name with its SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    /// Zip separate name and type lists.
    pub fn from_pairs<N: AsRef<str>, T: AsRef<str>>(names: &[N], types: &[T]) -> Result<Vec<Self>> {
        if names.len() != types.len() {
            return Err(Error::InvalidColumns(format!(
                "{} column names but {} types",
                names.len(),
                types.len()
            )));
        }
        Ok(names
            .iter()
            .zip(types)
            .map(|(name, data_type)| Self::new(name.as_ref(), data_type.as_ref()))
            .collect())
    }

    fn definition(&self) -> String {
        format!("{} {}", self.name.trim(), self.data_type.trim()).to_uppercase()
    }
}

impl From<(&str, &str)> for ColumnSpec {
    fn from((name, data_type): (&str, &str)) -> Self {
        Self::new(name, data_type)
    }
}

/// `NAME TYPE, NAME TYPE` column list for a CREATE TABLE statement.
pub fn format_columns(columns: &[ColumnSpec]) -> Result<String> {
    if columns.is_empty() {
        return Err(Error::InvalidColumns("no columns given".to_string()));
    }
    if let Some(column) = columns
        .iter()
        .find(|c| c.name.trim().is_empty() || c.data_type.trim().is_empty())
    {
        return Err(Error::InvalidColumns(format!(
            "incomplete column definition {:?}",
            column
        )));
    }
    let definitions: Vec<String> = columns.iter().map(ColumnSpec::definition).collect();
    Ok(definitions.join(", "))
}

/// Column names plus rows, the unit `insert_table` writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        check_width(self.columns.len(), &row)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|i| ColumnType::infer(self.rows.iter().filter_map(|row| row.get(i))))
            .collect()
    }

    pub fn column_specs(&self) -> Vec<ColumnSpec> {
        self.columns
            .iter()
            .zip(self.column_types())
            .map(|(name, data_type)| ColumnSpec::new(&name.to_uppercase(), data_type.sql()))
            .collect()
    }
}

fn check_width(expected: usize, row: &Row) -> Result<()> {
    if row.len() != expected {
        return Err(Error::InvalidColumns(format!(
            "row has {} values but there are {} columns",
            row.len(),
            expected
        )));
    }
    Ok(())
}

/// Split an optional `owner.` prefix off a table name.
fn split_owner(table_name: &str) -> (Option<&str>, &str) {
    match table_name.split_once('.') {
        Some((owner, table)) => (Some(owner), table),
        None => (None, table_name),
    }
}

fn run_search<C: Connector + ?Sized>(
    conn: &C,
    sql: &str,
    params: &[Value],
    fetch: Fetch,
) -> Result<Vec<Row>> {
    debug!(backend = %conn.backend(), %sql, "running search");
    let mut cursor = conn.open_cursor()?;
    cursor.execute(sql, params)?;
    Ok(fetch.take(&mut cursor))
}

/// Tables whose name contains `partial_table_name`.
///
/// Oracle rows are `(owner, table_name)`, or just `(table_name)` for
/// [`TableScope::User`]; SQLite rows are `(name)`.
pub fn find_table<C: Connector + ?Sized>(
    conn: &C,
    partial_table_name: Option<&str>,
    scope: TableScope,
    fetch: Fetch,
) -> Result<Vec<Row>> {
    let partial = partial_table_name.unwrap_or_default();
    let (sql, pattern) = match conn.backend() {
        Backend::Oracle => {
            let owner = if scope.has_owner() { "owner, " } else { "" };
            (
                format!(
                    "SELECT {owner}table_name FROM {scope}_tables \
                     WHERE table_name LIKE :1 ORDER BY {owner}table_name"
                ),
                format!("%{}%", partial.to_uppercase()),
            )
        }
        Backend::Sqlite => (
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE ?1 ORDER BY name"
                .to_string(),
            format!("%{partial}%"),
        ),
    };
    run_search(conn, &sql, &[Value::Text(pattern)], fetch)
}

/// Whether a table (or, on Oracle, a view) named `table_name` exists.
///
/// An `owner.table` name restricts the Oracle search to that owner.
pub fn table_exists<C: Connector + ?Sized>(
    conn: &C,
    table_name: &str,
    scope: TableScope,
    owner: Option<&str>,
) -> Result<bool> {
    let (prefix_owner, table) = split_owner(table_name);
    let owner = prefix_owner.or(owner);

    let (sql, params) = match conn.backend() {
        Backend::Oracle => {
            let mut sql = format!(
                "SELECT COUNT(*) FROM {scope}_objects \
                 WHERE object_type IN ('TABLE', 'VIEW') AND object_name = :1"
            );
            let mut params = vec![Value::Text(table.to_uppercase())];
            if let Some(owner) = owner.filter(|_| scope.has_owner()) {
                sql.push_str(" AND owner = :2");
                params.push(Value::Text(owner.to_uppercase()));
            }
            (sql, params)
        }
        Backend::Sqlite => (
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1".to_string(),
            vec![Value::Text(table.to_string())],
        ),
    };

    let rows = run_search(conn, &sql, &params, Fetch::First(1))?;
    let count = rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Ok(count > 0)
}

/// Columns whose name contains `partial_column_name`, optionally limited to
/// tables whose name contains `partial_table_name`. Oracle only.
pub fn find_column<C: Connector + ?Sized>(
    conn: &C,
    partial_column_name: &str,
    partial_table_name: Option<&str>,
    scope: TableScope,
    fetch: Fetch,
) -> Result<Vec<Row>> {
    let backend = conn.backend();
    if backend != Backend::Oracle {
        return Err(Error::UnsupportedBackend {
            backend,
            operation: "find_column",
        });
    }

    let (owner, owner_join) = if scope.has_owner() {
        ("tabs.owner, ", " AND tabs.owner = cols.owner")
    } else {
        ("", "")
    };
    let sql = format!(
        "SELECT {owner}tabs.table_name, cols.column_name \
         FROM {scope}_tables tabs \
         INNER JOIN {scope}_tab_cols cols ON tabs.table_name = cols.table_name{owner_join} \
         WHERE tabs.table_name LIKE :1 AND cols.column_name LIKE :2 \
         ORDER BY {owner}tabs.table_name, cols.column_name"
    );
    let params = [
        Value::Text(format!(
            "%{}%",
            partial_table_name.unwrap_or_default().to_uppercase()
        )),
        Value::Text(format!("%{}%", partial_column_name.to_uppercase())),
    ];
    run_search(conn, &sql, &params, fetch)
}

pub fn create_table<C: Connector + ?Sized>(
    conn: &C,
    table_name: &str,
    columns: &[ColumnSpec],
    if_not_exists: bool,
) -> Result<()> {
    let columns = format_columns(columns)?;
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    let sql = format!("CREATE TABLE {guard}{table_name} ({columns})");
    debug!(backend = %conn.backend(), %sql, "creating table");
    conn.open_cursor()?.execute(&sql, &[])?;
    Ok(())
}

pub fn drop_table<C: Connector + ?Sized>(conn: &C, table_name: &str) -> Result<()> {
    debug!(backend = %conn.backend(), table = table_name, "dropping table");
    conn.open_cursor()?
        .execute(&format!("DROP TABLE {table_name}"), &[])?;
    Ok(())
}

/// Batch-insert `rows` into `columns` of `table_name`. Does not commit.
pub fn insert_rows<C: Connector + ?Sized, S: AsRef<str>>(
    conn: &C,
    table_name: &str,
    columns: &[S],
    rows: &[Row],
) -> Result<u64> {
    if columns.is_empty() {
        return Err(Error::InvalidColumns("no columns given".to_string()));
    }
    for row in rows {
        check_width(columns.len(), row)?;
    }

    let backend = conn.backend();
    let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_uppercase()).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| backend.placeholder(i)).collect();
    let sql = format!(
        "INSERT INTO {table_name} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    );

    debug!(%backend, table = table_name, rows = rows.len(), "inserting rows");
    let mut cursor = conn.open_cursor()?;
    cursor.execute_many(&sql, rows)?;
    Ok(cursor.row_count().unwrap_or(0))
}

/// Write `data` into `table_name`, creating the table from inferred column
/// types when needed, then commit according to `commit`.
///
/// All statements run on a single cursor so the commit covers the insert
/// even when `conn` is an engine.
pub fn insert_table<C: Connector + ?Sized>(
    conn: &C,
    table_name: &str,
    data: &TableData,
    if_exists: IfExists,
    commit: CommitPolicy,
) -> Result<u64> {
    let cursor = conn.open_cursor()?;
    let scope = match split_owner(table_name) {
        (Some(_), _) => TableScope::All,
        (None, _) => TableScope::User,
    };

    if table_exists(&cursor, table_name, scope, None)? {
        match if_exists {
            IfExists::Fail => return Err(Error::TableExists(table_name.to_string())),
            IfExists::Replace => {
                drop_table(&cursor, table_name)?;
                create_table(&cursor, table_name, &data.column_specs(), false)?;
            }
            IfExists::Append => {}
        }
    } else {
        create_table(&cursor, table_name, &data.column_specs(), false)?;
    }

    let inserted = insert_rows(&cursor, table_name, &data.columns, &data.rows)?;

    match commit {
        CommitPolicy::Strict => cursor.commit()?,
        CommitPolicy::BestEffort => {
            if let Err(err) = cursor.commit() {
                warn!(table = table_name, error = %err, "commit after insert failed; continuing");
            }
        }
        CommitPolicy::Skip => {}
    }

    Ok(inserted)
}

#[cfg(test)]
mod schema_tests;
