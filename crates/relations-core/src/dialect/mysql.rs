//! MySQL dialect.

use std::collections::{BTreeMap, BTreeSet};

use super::Dialect;
use crate::delta::{ConstraintChanges, MigrationDelta};
use crate::path;
use crate::schema::{FieldDefault, FieldDefinition, Kind, ModelDefinition, DEFAULT_LENGTH};

/// MySQL dialect for DDL synthesis.
///
/// Models that carry no database of their own are qualified with the
/// dialect's default database, if one is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MySqlDialect {
    database: Option<String>,
}

impl MySqlDialect {
    /// Creates a dialect without a default database.
    #[must_use]
    pub const fn new() -> Self {
        Self { database: None }
    }

    /// Creates a dialect qualifying unqualified models with `database`.
    #[must_use]
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
        }
    }

    /// Returns the default database.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Returns the quoted, qualified table name of a model.
    #[must_use]
    pub fn table(&self, model: &ModelDefinition) -> String {
        match model.database.as_deref().or(self.database.as_deref()) {
            Some(database) => format!(
                "{}.{}",
                self.quote_identifier(database),
                self.quote_identifier(&model.table)
            ),
            None => self.quote_identifier(&model.table),
        }
    }

    /// Maps a kind to its column type.
    #[must_use]
    pub fn column_type(kind: Kind, length: Option<u32>) -> String {
        match kind {
            Kind::Bool => "TINYINT".to_string(),
            Kind::Int => "INTEGER".to_string(),
            Kind::Float => "DOUBLE".to_string(),
            Kind::Str => format!("VARCHAR({})", length.unwrap_or(DEFAULT_LENGTH)),
            Kind::Opaque => "JSON".to_string(),
        }
    }

    /// Generates the column definition of a field.
    ///
    /// A raw definition is returned verbatim. A deferred default forces
    /// `NOT NULL`; only literal defaults are rendered, and never for opaque kinds.
    #[must_use]
    pub fn column_definition(&self, field: &FieldDefinition) -> String {
        if let Some(definition) = &field.definition {
            return definition.clone();
        }

        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&field.store),
            Self::column_type(field.kind, field.length)
        );

        if !field.none || matches!(field.default, FieldDefault::Deferred) {
            sql.push_str(" NOT NULL");
        }
        if field.auto {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let FieldDefault::Literal(value) = &field.default {
            if field.kind != Kind::Opaque {
                sql.push_str(" DEFAULT ");
                sql.push_str(&self.render_default(value));
            }
        }

        sql
    }

    /// Generates the generated-column definition materializing `path` out of `store`.
    #[must_use]
    pub fn extract_definition(&self, store: &str, path: &str, kind: Kind) -> String {
        let operator = if kind == Kind::Opaque { "->" } else { "->>" };
        format!(
            "{} {} AS ({}{operator}{})",
            self.quote_identifier(&path::extract_store(store, path)),
            Self::column_type(kind, None),
            self.quote_identifier(store),
            self.quote_string(&path::walk(path))
        )
    }

    /// Generates the statements creating a model's table.
    #[must_use]
    pub fn create_table(&self, model: &ModelDefinition) -> Vec<String> {
        if let Some(definition) = &model.definition {
            return vec![definition.clone()];
        }

        let mut clauses = Vec::new();

        for field in model.fields.iter().filter(|f| !f.is_injected()) {
            clauses.push(self.column_definition(field));
            clauses.extend(
                field
                    .extract
                    .iter()
                    .map(|(path, kind)| self.extract_definition(&field.store, path, *kind)),
            );
        }

        if let Some(id) = &model.id {
            clauses.push(format!(
                "PRIMARY KEY ({})",
                self.quote_identifier(&model.store_of(id))
            ));
        }
        for (name, fields) in sorted_constraints(&model.unique) {
            clauses.push(format!(
                "UNIQUE {} ({})",
                self.quote_identifier(&name),
                self.constraint_columns(model, fields)
            ));
        }
        for (name, fields) in sorted_constraints(&model.index) {
            clauses.push(format!(
                "INDEX {} ({})",
                self.quote_identifier(&name),
                self.constraint_columns(model, fields)
            ));
        }

        vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.table(model),
            clauses.join(",\n  ")
        )]
    }

    /// Generates the statement dropping a model's table.
    #[must_use]
    pub fn drop_table(&self, model: &ModelDefinition) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table(model))
    }

    /// Generates the statements migrating `original` by `delta`.
    ///
    /// Returns no statement when the delta changes nothing.
    #[must_use]
    pub fn alter_table(&self, original: &ModelDefinition, delta: &MigrationDelta) -> Vec<String> {
        let migrated = original.migrated(delta);
        let table = self.table(original);
        let mut clauses = Vec::new();

        let renamed = self.table(&migrated);
        if renamed != table {
            clauses.push(format!("RENAME TO {renamed}"));
        }

        for field in delta.fields.add.iter().filter(|f| !f.is_injected()) {
            clauses.push(format!("ADD {}", self.column_definition(field)));
            clauses.extend(field.extract.iter().map(|(path, kind)| {
                format!("ADD {}", self.extract_definition(&field.store, path, *kind))
            }));
        }

        for field in original
            .fields
            .iter()
            .filter(|f| !f.is_injected() && delta.fields.remove.contains(&f.name))
        {
            clauses.push(format!("DROP {}", self.quote_identifier(&field.store)));
            clauses.extend(field.extract.keys().map(|path| {
                format!("DROP {}", self.quote_identifier(&field.extract_store(path)))
            }));
        }

        for field in original.fields.iter().filter(|f| !f.is_injected()) {
            if let Some(patch) = delta.fields.change.get(&field.name) {
                clauses.extend(self.change_field(field, &patch.merge(field)));
            }
        }

        clauses.extend(self.alter_constraints("UNIQUE", &delta.unique, &migrated));
        clauses.extend(self.alter_constraints("INDEX", &delta.index, &migrated));

        if clauses.is_empty() {
            return Vec::new();
        }

        vec![format!("ALTER TABLE {table}\n  {}", clauses.join(",\n  "))]
    }

    /// Clauses for one changed field: the column itself, then every extract
    /// path in the union of old and new paths.
    fn change_field(&self, original: &FieldDefinition, merged: &FieldDefinition) -> Vec<String> {
        let mut clauses = vec![format!(
            "CHANGE {} {}",
            self.quote_identifier(&original.store),
            self.column_definition(merged)
        )];

        let paths: BTreeSet<&String> = original
            .extract
            .keys()
            .chain(merged.extract.keys())
            .collect();

        for path in paths {
            match (original.extract.get(path), merged.extract.get(path)) {
                (Some(_), None) => clauses.push(format!(
                    "DROP {}",
                    self.quote_identifier(&original.extract_store(path))
                )),
                (None, Some(kind)) => clauses.push(format!(
                    "ADD {}",
                    self.extract_definition(&merged.store, path, *kind)
                )),
                (Some(before), Some(after))
                    if before != after || original.store != merged.store =>
                {
                    clauses.push(format!(
                        "CHANGE {} {}",
                        self.quote_identifier(&original.extract_store(path)),
                        self.extract_definition(&merged.store, path, *after)
                    ));
                }
                _ => {}
            }
        }

        clauses
    }

    fn alter_constraints(
        &self,
        keyword: &str,
        changes: &ConstraintChanges,
        migrated: &ModelDefinition,
    ) -> Vec<String> {
        let mut clauses = Vec::new();

        for (name, fields) in sorted_constraints(&changes.add) {
            clauses.push(format!(
                "ADD {keyword} {} ({})",
                self.quote_identifier(&name),
                self.constraint_columns(migrated, fields)
            ));
        }

        let mut removed: Vec<String> = changes.remove.iter().map(|n| normalize(n)).collect();
        removed.sort();
        for name in removed {
            clauses.push(format!("DROP INDEX {}", self.quote_identifier(&name)));
        }

        let mut renamed: Vec<(String, String)> = changes
            .rename
            .iter()
            .map(|(old, new)| (normalize(old), normalize(new)))
            .collect();
        renamed.sort();
        for (old, new) in renamed {
            clauses.push(format!(
                "RENAME INDEX {} TO {}",
                self.quote_identifier(&old),
                self.quote_identifier(&new)
            ));
        }

        clauses
    }

    fn constraint_columns(&self, model: &ModelDefinition, fields: &[String]) -> String {
        fields
            .iter()
            .map(|f| self.quote_identifier(&model.store_of(f)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn render_default(&self, value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::Null => "NULL".to_string(),
            serde_json::Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => self.quote_string(s),
            other => self.quote_string(&other.to_string()),
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }
}

fn normalize(name: &str) -> String {
    name.replace('-', "_")
}

fn sorted_constraints(constraints: &BTreeMap<String, Vec<String>>) -> Vec<(String, &[String])> {
    let mut sorted: Vec<(String, &[String])> = constraints
        .iter()
        .map(|(name, fields)| (normalize(name), fields.as_slice()))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}
