//! SQL artifacts and a migration ledger for relations models on MySQL.
//!
//! `relations-migrate` turns model definitions into SQL files and applies them
//! exactly once per database:
//! - A definition JSON (model name to definition) becomes `definition.sql`,
//!   the baseline every new database starts from
//! - A migration JSON (`add`, `remove` and `change` sections) becomes a
//!   `migration-<id>.sql` step
//! - The ledger records applied step ids in a bookkeeping table and runs
//!   pending steps in id order
//!
//! # Architecture
//!
//! - **Artifacts** - JSON in, statement text out, via `relations-core`
//! - **Ledger** - Bootstrap and step application over a `Connection`
//!
//! # Example
//!
//! ```rust,ignore
//! use relations_migrate::prelude::*;
//! use relations_orm::MySqlConnection;
//!
//! let definitions: Definitions = read_json(Path::new("definition.json"))?;
//! let sql = Generator::new("mysql").define(&definitions);
//! write_definition(Path::new("ddl/mysql"), &sql)?;
//!
//! let mut connection = MySqlConnection::connect("mysql://root@localhost/app").await?;
//! let migrated = Ledger::new("app", "ddl/mysql").migrate(&mut connection).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Write the baseline
//! relations-migrate --source mysql define definition.json
//!
//! # Write a step from a migration
//! relations-migrate --source mysql generate migration.json
//!
//! # Apply pending steps
//! relations-migrate migrate
//!
//! # Show step status
//! relations-migrate show
//! ```

pub mod artifacts;
pub mod error;
pub mod ledger;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::artifacts::{
        read_json, step_id, write_definition, write_step, Definitions, Generator, Migration,
        ModelChange,
    };
    pub use crate::error::{MigrateError, Result};
    pub use crate::ledger::{execute, steps, Ledger, Step, StepStatus, LEDGER_TABLE};
}
