//! # relations-core
//!
//! Schema synthesis and query compilation for MySQL-backed models.
//!
//! This crate provides:
//! - Model and field definitions, loadable from JSON
//! - `CREATE TABLE` synthesis and `ALTER TABLE` diffing, including generated
//!   columns extracted from `JSON` columns
//! - Translation of `__`-separated logical paths into JSON path addresses
//! - Compilation of filter criteria into parameterized predicates
//!
//! Everything here is pure: statements come out as text plus bound values,
//! and nothing talks to a database.
//!
//! ## Synthesizing a table
//!
//! ```rust
//! use relations_core::{FieldDefinition, Kind, ModelDefinition, MySqlDialect};
//!
//! let model = ModelDefinition::new("simple")
//!     .field(FieldDefinition::new("id", Kind::Int).auto())
//!     .field(FieldDefinition::new("name", Kind::Str).not_null())
//!     .id("id")
//!     .unique("name", &["name"]);
//!
//! let statements = MySqlDialect::new().create_table(&model);
//! assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `simple`"));
//! ```
//!
//! ## Compiling criteria
//!
//! ```rust
//! use relations_core::{predicate, Criterion, FieldDefinition, Kind, Query};
//!
//! let meta = FieldDefinition::new("meta", Kind::Opaque);
//! let criteria = [Criterion::new("a__gt", 1_i64)];
//! let (sql, params) = predicate::compile(&meta, &criteria, Query::new())
//!     .from("`things`")
//!     .build();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM `things` WHERE JSON_UNQUOTE(JSON_EXTRACT(`meta`, %s))>%s"
//! );
//! assert_eq!(params.len(), 2);
//! ```

pub mod delta;
pub mod dialect;
pub mod path;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod value;

pub use delta::{ConstraintChanges, FieldChanges, FieldPatch, MigrationDelta};
pub use dialect::{Dialect, MySqlDialect};
pub use predicate::{Criterion, FilterValue, Operator};
pub use query::Query;
pub use schema::{FieldDefault, FieldDefinition, Kind, ModelDefinition, ParentRelation};
pub use value::{Record, SqlValue, ToSqlValue};
