//! Database connections.
//!
//! Statements are written with `%s` (positional) and `%(name)s` (named)
//! placeholders. [`Connection`] is the seam the source and the migration
//! ledger talk through; [`MySqlConnection`] implements it over sqlx.

use relations_core::{Record, SqlValue};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Executor, MySql, Row, TypeInfo};
use tracing::debug;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Executed {
    /// Rows affected.
    pub rows_affected: u64,
    /// Identity generated by the last insert, if any.
    pub last_insert_id: Option<u64>,
}

/// A connection statements are executed on.
///
/// Calls are strictly sequential; nothing here retries. The returned futures
/// are not required to be `Send`: a connection is driven from the task that
/// owns it, so operations are awaited in place rather than spawned.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Executes a statement with positional values.
    async fn execute(&mut self, sql: &str, values: &[SqlValue]) -> Result<Executed, sqlx::Error>;

    /// Executes a statement with named placeholders once per record.
    async fn execute_many(
        &mut self,
        sql: &str,
        records: &[Record],
    ) -> Result<Executed, sqlx::Error>;

    /// Runs a query and returns every row, keyed by column name.
    async fn fetch_all(
        &mut self,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<Record>, sqlx::Error>;

    /// Commits the current transaction.
    async fn commit(&mut self) -> Result<(), sqlx::Error>;
}

/// A placeholder found while rewriting a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placeholder {
    Positional,
    Named(String),
}

/// Rewrites `%s` and `%(name)s` to `?`, returning the placeholders in order.
///
/// `%%` stands for a literal `%`.
fn rewrite(sql: &str) -> (String, Vec<Placeholder>) {
    let mut rewritten = String::with_capacity(sql.len());
    let mut placeholders = Vec::new();
    let mut rest = sql;

    while let Some(at) = rest.find('%') {
        rewritten.push_str(&rest[..at]);
        let tail = &rest[at + 1..];

        if let Some(after) = tail.strip_prefix('s') {
            rewritten.push('?');
            placeholders.push(Placeholder::Positional);
            rest = after;
        } else if let Some(after) = tail.strip_prefix('%') {
            rewritten.push('%');
            rest = after;
        } else if let Some((name, after)) = tail
            .strip_prefix('(')
            .and_then(|named| named.split_once(")s"))
        {
            rewritten.push('?');
            placeholders.push(Placeholder::Named(name.to_string()));
            rest = after;
        } else {
            rewritten.push('%');
            rest = tail;
        }
    }

    rewritten.push_str(rest);
    (rewritten, placeholders)
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_column(row: &MySqlRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "NULL" => None,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int)
        }
        name if name.ends_with("UNSIGNED") => {
            row.try_get::<Option<u64>, _>(index)?.map(|n| {
                i64::try_from(n).map_or_else(|_| SqlValue::Text(n.to_string()), SqlValue::Int)
            })
        }
        "FLOAT" | "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(SqlValue::Json),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(|dt| SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|d| SqlValue::Text(d.to_string())),
        _ => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map(SqlValue::Text),
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

fn decode_row(row: &MySqlRow) -> Result<Record, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| Ok((column.name().to_string(), decode_column(row, column.ordinal())?)))
        .collect()
}

/// A MySQL connection.
pub struct MySqlConnection {
    conn: sqlx::MySqlConnection,
}

impl MySqlConnection {
    /// Opens a connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let conn = sqlx::MySqlConnection::connect(url).await?;
        Ok(Self { conn })
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }

    /// Returns the name of the current database, if one is selected.
    pub async fn current_database(&mut self) -> Result<Option<String>, sqlx::Error> {
        let rows = self.fetch_all("SELECT DATABASE() AS `database`", &[]).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("database"))
            .and_then(|value| match value {
                SqlValue::Text(name) => Some(name),
                _ => None,
            }))
    }

    async fn run(&mut self, sql: &str, values: &[SqlValue]) -> Result<Executed, sqlx::Error> {
        let result = if values.is_empty() {
            self.conn.execute(sql).await?
        } else {
            let (sql, _) = rewrite(sql);
            values
                .iter()
                .fold(sqlx::query(&sql), bind_value)
                .execute(&mut self.conn)
                .await?
        };

        Ok(Executed {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_id()).filter(|id| *id != 0),
        })
    }
}

impl From<sqlx::MySqlConnection> for MySqlConnection {
    fn from(conn: sqlx::MySqlConnection) -> Self {
        Self { conn }
    }
}

impl Connection for MySqlConnection {
    async fn execute(&mut self, sql: &str, values: &[SqlValue]) -> Result<Executed, sqlx::Error> {
        debug!(sql = %sql, values = values.len(), "Executing SQL");
        self.run(sql, values).await
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        records: &[Record],
    ) -> Result<Executed, sqlx::Error> {
        debug!(sql = %sql, records = records.len(), "Executing SQL per record");

        let (rewritten, placeholders) = rewrite(sql);
        let mut executed = Executed::default();

        for record in records {
            let values: Vec<SqlValue> = placeholders
                .iter()
                .map(|placeholder| match placeholder {
                    Placeholder::Named(name) => record.get(name).cloned().unwrap_or(SqlValue::Null),
                    Placeholder::Positional => SqlValue::Null,
                })
                .collect();

            let result = values
                .iter()
                .fold(sqlx::query(&rewritten), bind_value)
                .execute(&mut self.conn)
                .await?;

            executed.rows_affected += result.rows_affected();
            executed.last_insert_id = Some(result.last_insert_id()).filter(|id| *id != 0);
        }

        Ok(executed)
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<Record>, sqlx::Error> {
        debug!(sql = %sql, values = values.len(), "Fetching rows");

        let rows = if values.is_empty() {
            self.conn.fetch_all(sql).await?
        } else {
            let (sql, _) = rewrite(sql);
            values
                .iter()
                .fold(sqlx::query(&sql), bind_value)
                .fetch_all(&mut self.conn)
                .await?
        };

        rows.iter().map(decode_row).collect()
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.conn.execute("COMMIT").await?;
        Ok(())
    }
}
