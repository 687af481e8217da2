//! Migration ledger.
//!
//! Applied steps are recorded in the `_relations_migration` table of the
//! target database. The first run executes the baseline, creates the table
//! and records every step present at that time, since the baseline already
//! contains their effect. Later runs execute and record the pending steps in
//! ascending id order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use relations_core::{Dialect, MySqlDialect, SqlValue};
use relations_orm::Connection;
use tracing::{debug, info};

use crate::artifacts::{self, DEFINITION_FILE};
use crate::error::{MigrateError, Result};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "_relations_migration";

/// Name of the ledger column holding step ids.
pub const LEDGER_COLUMN: &str = "migration";

/// A migration step file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Step {
    /// Orderable step id.
    pub id: String,
    /// Path to the step file.
    pub path: PathBuf,
}

/// A step and whether the ledger records it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    /// Step id.
    pub id: String,
    /// Whether the step is recorded as applied.
    pub applied: bool,
}

/// Lists the step files in `dir`, sorted by id.
pub fn steps(dir: &Path) -> Result<Vec<Step>> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }

    let mut steps = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(id) = artifacts::step_id_of(&path) {
            steps.push(Step { id, path });
        }
    }
    steps.sort();
    Ok(steps)
}

/// Tracks which steps of a migrations directory one database has applied.
#[derive(Debug, Clone)]
pub struct Ledger {
    database: String,
    dir: PathBuf,
    dialect: MySqlDialect,
}

impl Ledger {
    /// Creates a ledger for `database`, reading artifacts from `dir`.
    pub fn new(database: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let database = database.into();
        Self {
            dialect: MySqlDialect::with_database(database.clone()),
            database,
            dir: dir.into(),
        }
    }

    /// Returns the database the ledger lives in.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table(&self) -> String {
        format!(
            "{}.{}",
            self.dialect.quote_identifier(&self.database),
            self.dialect.quote_identifier(LEDGER_TABLE)
        )
    }

    /// Returns `true` if the ledger table exists.
    pub async fn exists<C: Connection>(&self, connection: &mut C) -> Result<bool> {
        let rows = connection
            .fetch_all(
                "SELECT COUNT(*) AS `total` FROM `information_schema`.`tables` \
                 WHERE `table_schema`=%s AND `table_name`=%s",
                &[
                    SqlValue::Text(self.database.clone()),
                    SqlValue::Text(LEDGER_TABLE.to_string()),
                ],
            )
            .await?;

        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(SqlValue::as_int)
            .is_some_and(|total| total > 0))
    }

    /// Step ids recorded as applied.
    pub async fn applied<C: Connection>(&self, connection: &mut C) -> Result<BTreeSet<String>> {
        let column = self.dialect.quote_identifier(LEDGER_COLUMN);
        let sql = format!("SELECT {column} FROM {} ORDER BY {column}", self.table());
        let rows = connection.fetch_all(&sql, &[]).await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get(LEDGER_COLUMN))
            .map(SqlValue::to_text)
            .collect())
    }

    async fn record<C: Connection>(&self, connection: &mut C, id: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES(%s)",
            self.table(),
            self.dialect.quote_identifier(LEDGER_COLUMN)
        );
        connection
            .execute(&sql, &[SqlValue::Text(id.to_string())])
            .await?;
        Ok(())
    }

    /// Runs the baseline before the ledger table exists, so a failed
    /// baseline leaves the database unbootstrapped and the next run retries it.
    async fn bootstrap<C: Connection>(&self, connection: &mut C, steps: &[Step]) -> Result<()> {
        let baseline = std::fs::read_to_string(self.dir.join(DEFINITION_FILE))?;
        execute(connection, &baseline).await?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) NOT NULL PRIMARY KEY)",
            self.table(),
            self.dialect.quote_identifier(LEDGER_COLUMN)
        );
        connection.execute(&create, &[]).await?;

        for step in steps {
            self.record(connection, &step.id).await?;
        }
        connection.commit().await?;

        info!(
            database = %self.database,
            recorded = steps.len(),
            "Bootstrapped migration ledger"
        );
        Ok(())
    }

    /// Brings the database up to date; returns `true` if anything was executed.
    pub async fn migrate<C: Connection>(&self, connection: &mut C) -> Result<bool> {
        let steps = steps(&self.dir)?;

        if !self.exists(connection).await? {
            self.bootstrap(connection, &steps).await?;
            return Ok(true);
        }

        if steps.is_empty() {
            debug!(database = %self.database, "No migration steps");
            return Ok(false);
        }

        let applied = self.applied(connection).await?;
        let mut migrated = false;

        for step in steps.iter().filter(|step| !applied.contains(&step.id)) {
            let sql = std::fs::read_to_string(&step.path)?;
            execute(connection, &sql).await?;
            self.record(connection, &step.id).await?;
            connection.commit().await?;

            info!(database = %self.database, migration = %step.id, "Applied migration");
            migrated = true;
        }

        if !migrated {
            debug!(database = %self.database, "Nothing to migrate");
        }
        Ok(migrated)
    }

    /// Every step in the directory and whether it is applied.
    ///
    /// Without a ledger table nothing counts as applied.
    pub async fn status<C: Connection>(&self, connection: &mut C) -> Result<Vec<StepStatus>> {
        let steps = steps(&self.dir)?;
        let applied = if self.exists(connection).await? {
            self.applied(connection).await?
        } else {
            BTreeSet::new()
        };

        Ok(steps
            .into_iter()
            .map(|step| StepStatus {
                applied: applied.contains(&step.id),
                id: step.id,
            })
            .collect())
    }
}

/// Executes every statement of an artifact, in order.
pub async fn execute<C: Connection>(connection: &mut C, sql: &str) -> Result<()> {
    for statement in artifacts::split_statements(sql) {
        debug!(sql = %statement, "Executing");
        connection.execute(&statement, &[]).await?;
    }
    Ok(())
}
