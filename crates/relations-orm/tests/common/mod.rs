#![allow(dead_code)]

use std::collections::VecDeque;

use relations_core::{FieldDefinition, Kind, ModelDefinition, Record, SqlValue};
use relations_orm::{Connection, Executed, Registry};

/// A statement seen by the recording connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Execute(String, Vec<SqlValue>),
    ExecuteMany(String, Vec<Record>),
    Fetch(String, Vec<SqlValue>),
    Commit,
}

/// Records every statement and answers fetches from a queue.
#[derive(Debug, Default)]
pub struct Recording {
    pub calls: Vec<Call>,
    pub rows: VecDeque<Vec<Record>>,
    pub rows_affected: u64,
    pub next_id: u64,
}

impl Recording {
    pub fn new() -> Self {
        Self {
            rows_affected: 1,
            next_id: 1,
            ..Self::default()
        }
    }

    /// Queues the rows returned by the next fetch.
    pub fn returning(mut self, rows: Vec<Record>) -> Self {
        self.rows.push_back(rows);
        self
    }

    pub fn statements(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute(sql, _) | Call::ExecuteMany(sql, _) | Call::Fetch(sql, _) => {
                    Some(sql.as_str())
                }
                Call::Commit => None,
            })
            .collect()
    }
}

impl Connection for Recording {
    async fn execute(&mut self, sql: &str, values: &[SqlValue]) -> Result<Executed, sqlx::Error> {
        self.calls.push(Call::Execute(sql.to_string(), values.to_vec()));
        Ok(Executed {
            rows_affected: self.rows_affected,
            last_insert_id: None,
        })
    }

    async fn execute_many(
        &mut self,
        sql: &str,
        records: &[Record],
    ) -> Result<Executed, sqlx::Error> {
        self.calls
            .push(Call::ExecuteMany(sql.to_string(), records.to_vec()));
        let id = self.next_id;
        self.next_id += records.len() as u64;
        Ok(Executed {
            rows_affected: records.len() as u64,
            last_insert_id: Some(id),
        })
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

pub fn record(values: &[(&str, SqlValue)]) -> Record {
    values
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}

pub fn unit() -> ModelDefinition {
    ModelDefinition::new("unit")
        .database("test_source")
        .field(FieldDefinition::new("id", Kind::Int).auto())
        .field(FieldDefinition::new("name", Kind::Str))
        .id("id")
        .label(&["name"])
}

pub fn test() -> ModelDefinition {
    ModelDefinition::new("test")
        .database("test_source")
        .field(FieldDefinition::new("id", Kind::Int).auto())
        .field(FieldDefinition::new("unit_id", Kind::Int))
        .field(FieldDefinition::new("name", Kind::Str))
        .id("id")
        .label(&["unit_id", "name"])
        .parent("unit_id", "unit", "id")
}

pub fn meta() -> ModelDefinition {
    ModelDefinition::new("meta")
        .database("test_source")
        .field(FieldDefinition::new("id", Kind::Int).auto())
        .field(FieldDefinition::new("name", Kind::Str))
        .field(FieldDefinition::new("flag", Kind::Bool))
        .field(FieldDefinition::new("spend", Kind::Float).default(serde_json::json!(0.0)))
        .field(
            FieldDefinition::new("things", Kind::Opaque)
                .extract("a__b", Kind::Int)
                .label("a__b"),
        )
        .id("id")
        .label(&["name", "things"])
}

pub fn registry() -> Registry {
    Registry::new().model(unit()).model(test()).model(meta())
}
