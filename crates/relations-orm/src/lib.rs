//! # relations-orm
//!
//! Async CRUD for relations models against MySQL.
//!
//! This crate provides:
//! - [`Connection`], the seam every statement goes through, and
//!   [`MySqlConnection`] implementing it over sqlx
//! - [`Source`] assembling create, retrieve, count, update and delete
//!   statements from a [`ModelDefinition`](relations_core::ModelDefinition)
//! - [`Selection`] for per-call criteria, free-text search, sort and
//!   pagination
//! - [`Registry`] resolving parent relations by model name
//!
//! ## Quick Start
//!
//! ```ignore
//! use relations_core::{FieldDefinition, Kind, ModelDefinition};
//! use relations_orm::{MySqlConnection, Selection, Source};
//!
//! async fn example() -> relations_orm::Result<()> {
//!     let unit = ModelDefinition::new("unit")
//!         .field(FieldDefinition::new("id", Kind::Int).auto())
//!         .field(FieldDefinition::new("name", Kind::Str))
//!         .id("id")
//!         .label(&["name"])
//!         .order(&["name"]);
//!
//!     let connection = MySqlConnection::connect("mysql://root@localhost/test").await?;
//!     let mut source = Source::new("mysql", connection).database("test");
//!
//!     let mut selection = Selection::new().like("peo").limit(10);
//!     let found = source.retrieve_many(&unit, &mut selection).await?;
//!     println!("{} rows, overflow: {}", found.rows.len(), found.overflow);
//!     Ok(())
//! }
//! ```
//!
//! ## Placeholders
//!
//! Statements use `%s` and `%(name)s` placeholders; the connection rewrites
//! them to the driver's `?` before binding.

mod connection;
mod error;
pub mod record;
mod registry;
mod selection;
mod source;

pub use connection::{Connection, Executed, MySqlConnection};
pub use error::{OrmError, Result};
pub use registry::Registry;
pub use selection::{Selection, DEFAULT_CHUNK};
pub use source::{Retrieved, Source};

// Re-export for convenience
pub use relations_core::{Record, SqlValue};
