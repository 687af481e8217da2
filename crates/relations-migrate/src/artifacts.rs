//! SQL artifacts generated from definition and migration JSON.
//!
//! A migrations directory holds one baseline `definition.sql` and zero or
//! more `migration-<id>.sql` steps. Step ids sort in the order they were
//! generated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relations_core::{MigrationDelta, ModelDefinition, MySqlDialect};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// Baseline file name.
pub const DEFINITION_FILE: &str = "definition.sql";

/// Prefix of migration step file names.
pub const STEP_PREFIX: &str = "migration-";

/// Extension of every SQL artifact.
pub const SQL_EXTENSION: &str = "sql";

/// Format of generated step ids.
pub const STEP_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Model definitions keyed by model name.
pub type Definitions = BTreeMap<String, ModelDefinition>;

/// A model changed by a migration: its original definition and the delta.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelChange {
    /// Definition before the change.
    pub definition: ModelDefinition,
    /// The change itself.
    pub migration: MigrationDelta,
}

/// Models added, removed and changed by one migration, keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Migration {
    /// Models to create.
    pub add: BTreeMap<String, ModelDefinition>,
    /// Models to drop.
    pub remove: BTreeMap<String, ModelDefinition>,
    /// Models to alter.
    pub change: BTreeMap<String, ModelChange>,
}

/// Generates SQL artifacts for the models of one source.
#[derive(Debug, Clone)]
pub struct Generator {
    source: String,
    dialect: MySqlDialect,
}

impl Generator {
    /// Creates a generator for the models whose source is `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dialect: MySqlDialect::new(),
        }
    }

    /// Qualifies tables without a database of their own with `database`.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.dialect = MySqlDialect::with_database(database);
        self
    }

    fn owns(&self, model: &ModelDefinition) -> bool {
        model.source.as_deref() == Some(self.source.as_str())
    }

    /// Create statements for every owned model, sorted by model name.
    #[must_use]
    pub fn define(&self, definitions: &Definitions) -> String {
        let statements: Vec<String> = definitions
            .values()
            .filter(|model| self.owns(model))
            .flat_map(|model| self.dialect.create_table(model))
            .collect();

        debug!(source = %self.source, statements = statements.len(), "Defined models");
        join_statements(&statements)
    }

    /// Statements for one migration: creates, then drops, then alters.
    #[must_use]
    pub fn migrate(&self, migration: &Migration) -> String {
        let mut statements = Vec::new();

        for model in migration.add.values().filter(|model| self.owns(model)) {
            statements.extend(self.dialect.create_table(model));
        }
        for model in migration.remove.values().filter(|model| self.owns(model)) {
            statements.push(self.dialect.drop_table(model));
        }
        for change in migration
            .change
            .values()
            .filter(|change| self.owns(&change.definition))
        {
            statements.extend(
                self.dialect
                    .alter_table(&change.definition, &change.migration),
            );
        }

        debug!(source = %self.source, statements = statements.len(), "Migrated models");
        join_statements(&statements)
    }
}

/// Joins statements with blank lines, terminating each with `;`.
#[must_use]
pub fn join_statements(statements: &[String]) -> String {
    if statements.is_empty() {
        String::new()
    } else {
        format!("{};\n", statements.join(";\n\n"))
    }
}

/// Splits artifact text back into statements.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(";\n")
        .map(str::trim)
        .map(|statement| statement.strip_suffix(';').unwrap_or(statement))
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

/// Step id for a migration generated at `now`.
#[must_use]
pub fn step_id(now: DateTime<Utc>) -> String {
    now.format(STEP_ID_FORMAT).to_string()
}

/// File name of the step with `id`.
#[must_use]
pub fn step_file_name(id: &str) -> String {
    format!("{STEP_PREFIX}{id}.{SQL_EXTENSION}")
}

/// Step id of a step file, or `None` if `path` is not one.
#[must_use]
pub fn step_id_of(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(SQL_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(STEP_PREFIX))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Reads a JSON file into `T`.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| MigrateError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Writes the baseline into `dir`, replacing any previous one.
pub fn write_definition(dir: &Path, sql: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(DEFINITION_FILE);
    std::fs::write(&path, sql)?;
    info!(path = %path.display(), "Wrote definition");
    Ok(path)
}

/// Writes a new step into `dir`; an existing step is never replaced.
pub fn write_step(dir: &Path, id: &str, sql: &str) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }
    let path = dir.join(step_file_name(id));
    if path.exists() {
        return Err(MigrateError::MigrationExists(path));
    }
    std::fs::write(&path, sql)?;
    info!(path = %path.display(), "Wrote migration");
    Ok(path)
}
