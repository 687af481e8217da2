//! relations-migrate CLI
//!
//! Command-line tool for generating and applying MySQL migrations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use relations_migrate::prelude::*;
use relations_orm::MySqlConnection;

/// SQL artifacts and a migration ledger for relations models.
#[derive(Parser)]
#[command(name = "relations-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "mysql://root@localhost")]
    url: String,

    /// Database holding the ledger and qualifying generated tables.
    #[arg(short, long)]
    database: Option<String>,

    /// Migrations directory.
    #[arg(long, default_value = "ddl/mysql")]
    dir: PathBuf,

    /// Source whose models are generated.
    #[arg(short, long, default_value = "mysql")]
    source: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the baseline from a definition JSON file.
    Define {
        /// Definition file mapping model names to definitions.
        definition: PathBuf,
    },

    /// Write a migration step from a migration JSON file.
    Generate {
        /// Migration file with add, remove and change sections.
        migration: PathBuf,

        /// Step id (a timestamp if not specified).
        #[arg(long)]
        id: Option<String>,

        /// Show SQL without writing files (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending migration steps.
    Migrate,

    /// Execute the statements of a SQL file.
    Execute {
        /// SQL file.
        file: PathBuf,
    },

    /// Show migration step status.
    Show,
}

fn generator(cli: &Cli) -> Generator {
    let generator = Generator::new(cli.source.clone());
    match &cli.database {
        Some(database) => generator.database(database.clone()),
        None => generator,
    }
}

async fn connect(cli: &Cli) -> anyhow::Result<(MySqlConnection, String)> {
    let mut connection = MySqlConnection::connect(&cli.url).await?;
    let database = match &cli.database {
        Some(database) => database.clone(),
        None => connection
            .current_database()
            .await?
            .ok_or(MigrateError::NoDatabase)?,
    };
    Ok((connection, database))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Define { definition } => {
            let definitions: Definitions = read_json(definition)?;
            let sql = generator(&cli).define(&definitions);
            write_definition(&cli.dir, &sql)?;
        }

        Commands::Generate {
            migration,
            id,
            dry_run,
        } => {
            let migration: Migration = read_json(migration)?;
            let sql = generator(&cli).migrate(&migration);

            if sql.is_empty() {
                info!("No changes for source {}.", cli.source);
            } else if *dry_run {
                println!("{sql}");
            } else {
                let id = id.clone().unwrap_or_else(|| step_id(chrono::Utc::now()));
                write_step(&cli.dir, &id, &sql)?;
            }
        }

        Commands::Migrate => {
            let (mut connection, database) = connect(&cli).await?;
            let migrated = Ledger::new(database, cli.dir.clone())
                .migrate(&mut connection)
                .await?;

            if migrated {
                info!("Migrations applied.");
            } else {
                info!("No migrations to apply.");
            }
            connection.close().await?;
        }

        Commands::Execute { file } => {
            let (mut connection, _) = connect(&cli).await?;
            let sql = std::fs::read_to_string(file)?;
            execute(&mut connection, &sql).await?;
            connection.close().await?;
        }

        Commands::Show => {
            let (mut connection, database) = connect(&cli).await?;
            let status = Ledger::new(database, cli.dir.clone())
                .status(&mut connection)
                .await?;

            if status.is_empty() {
                info!("No migration steps in {}.", cli.dir.display());
            } else {
                println!("\nMigration steps:");
                println!("{:-<60}", "");
                for step in &status {
                    let mark = if step.applied { "X" } else { " " };
                    println!(" [{mark}] {}", step.id);
                }
                println!();
            }
            connection.close().await?;
        }
    }

    Ok(())
}
