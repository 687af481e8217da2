#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;

use relations_core::{Record, SqlValue};
use relations_orm::{Connection, Executed};

/// A statement seen by the scripted connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute(String, Vec<SqlValue>),
    Fetch(String, Vec<SqlValue>),
    Commit,
}

/// Records statements, answers fetches from a queue and fails on demand.
#[derive(Debug, Default)]
pub struct Scripted {
    pub calls: Vec<Call>,
    pub rows: VecDeque<Vec<Record>>,
    pub fail_on: Option<String>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the rows returned by the next fetch.
    pub fn returning(mut self, rows: Vec<Record>) -> Self {
        self.rows.push_back(rows);
        self
    }

    /// Answers the ledger existence check.
    pub fn ledger_exists(self, exists: bool) -> Self {
        self.returning(vec![record("total", SqlValue::Int(i64::from(exists)))])
    }

    /// Answers the read of recorded step ids.
    pub fn recorded(self, ids: &[&str]) -> Self {
        let rows = ids
            .iter()
            .map(|id| record("migration", SqlValue::Text((*id).to_string())))
            .collect();
        self.returning(rows)
    }

    /// Fails any execute whose statement contains `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn executed(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute(sql, _) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.calls.iter().filter(|call| **call == Call::Commit).count()
    }
}

impl Connection for Scripted {
    async fn execute(&mut self, sql: &str, values: &[SqlValue]) -> Result<Executed, sqlx::Error> {
        if self.fail_on.as_deref().is_some_and(|marker| sql.contains(marker)) {
            return Err(sqlx::Error::Protocol(format!("refused: {sql}")));
        }
        self.calls.push(Call::Execute(sql.to_string(), values.to_vec()));
        Ok(Executed {
            rows_affected: 0,
            last_insert_id: None,
        })
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        _records: &[Record],
    ) -> Result<Executed, sqlx::Error> {
        self.execute(sql, &[]).await
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<Vec<Record>, sqlx::Error> {
        self.calls.push(Call::Fetch(sql.to_string(), values.to_vec()));
        Ok(self.rows.pop_front().unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.calls.push(Call::Commit);
        Ok(())
    }
}

pub fn record(name: &str, value: SqlValue) -> Record {
    [(name.to_string(), value)].into_iter().collect()
}

pub fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}
