//! Error types for artifact generation and the migration ledger.

use std::path::PathBuf;

/// Errors that can occur while generating or applying migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Database error while executing a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing artifact files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a definition or migration file.
    #[error("Failed to parse '{path}': {message}")]
    ParseError {
        /// Path to the file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A migration step file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// No migrations directory found.
    #[error("Migrations directory not found: {0}")]
    MigrationsDirNotFound(PathBuf),

    /// No database to qualify the ledger table with.
    #[error("No database selected")]
    NoDatabase,
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
