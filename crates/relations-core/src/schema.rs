//! Model and field definitions.
//!
//! These types describe what the modeling layer expects a table to look
//! like. They are plain data: the dialect reads them to synthesize DDL and
//! the source reads them to compile queries, neither ever mutates them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path;

/// Fallback `VARCHAR` length when a string field declares none.
pub const DEFAULT_LENGTH: u32 = 255;

/// The storage kind of a field.
///
/// Anything that is not a primitive is an opaque structured value kept in a
/// `JSON` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    /// Boolean, stored as a small integer.
    Bool,
    /// Integer.
    Int,
    /// Double precision float.
    Float,
    /// Variable-length string.
    Str,
    /// Structured document.
    Opaque,
}

impl Kind {
    /// Returns the kind's name as written in definition files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Opaque => "json",
        }
    }
}

impl From<String> for Kind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "str" => Self::Str,
            _ => Self::Opaque,
        }
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.as_str().to_string()
    }
}

/// Default value of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDefault {
    /// No default.
    #[default]
    None,
    /// A fixed literal, rendered into the column definition.
    Literal(serde_json::Value),
    /// Produced at insert time; never rendered, but the column is required.
    Deferred,
}

/// Definition of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawField")]
pub struct FieldDefinition {
    /// Logical name.
    pub name: String,
    /// Physical column name.
    pub store: String,
    /// Storage kind.
    pub kind: Kind,
    /// Whether the column accepts NULL.
    pub none: bool,
    /// Default value.
    pub default: FieldDefault,
    /// Maximum length, strings only.
    pub length: Option<u32>,
    /// Raw column definition that bypasses synthesis.
    pub definition: Option<String>,
    /// Whether the column auto-increments.
    pub auto: bool,
    /// Whether the field is left out of inserts and updates.
    pub readonly: bool,
    /// Paths materialized as generated columns, with their primitive kind.
    pub extract: BTreeMap<String, Kind>,
    /// Path this virtual field writes into; injected fields have no column.
    pub inject: Option<String>,
    /// Label paths used for display and free-text search.
    pub label: Vec<String>,
}

/// Wire form of [`FieldDefinition`], where `store` may be omitted.
#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    store: Option<String>,
    kind: Kind,
    #[serde(default = "yes")]
    none: bool,
    #[serde(default)]
    default: FieldDefault,
    #[serde(default)]
    length: Option<u32>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    auto: Option<bool>,
    #[serde(default)]
    readonly: bool,
    #[serde(default)]
    extract: BTreeMap<String, Kind>,
    #[serde(default)]
    inject: Option<String>,
    #[serde(default)]
    label: Vec<String>,
}

const fn yes() -> bool {
    true
}

impl From<RawField> for FieldDefinition {
    fn from(raw: RawField) -> Self {
        Self {
            store: raw.store.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            kind: raw.kind,
            none: raw.none,
            default: raw.default,
            length: raw.length,
            definition: raw.definition,
            auto: raw.auto.unwrap_or(false),
            readonly: raw.readonly || raw.auto.unwrap_or(false),
            extract: raw.extract,
            inject: raw.inject,
            label: raw.label,
        }
    }
}

impl FieldDefinition {
    /// Creates a nullable field stored under its own name.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        let name = name.into();
        Self {
            store: name.clone(),
            name,
            kind,
            none: true,
            default: FieldDefault::None,
            length: None,
            definition: None,
            auto: false,
            readonly: false,
            extract: BTreeMap::new(),
            inject: None,
            label: Vec::new(),
        }
    }

    /// Sets the physical column name.
    #[must_use]
    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }

    /// Marks the field as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.none = false;
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default(mut self, value: serde_json::Value) -> Self {
        self.default = FieldDefault::Literal(value);
        self
    }

    /// Marks the default as produced at insert time.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.default = FieldDefault::Deferred;
        self
    }

    /// Sets the maximum string length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets a raw column definition.
    #[must_use]
    pub fn definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Marks the field as auto-incrementing (and therefore readonly).
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self.readonly = true;
        self
    }

    /// Marks the field as readonly.
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Materializes `path` as a generated column of the given kind.
    #[must_use]
    pub fn extract(mut self, path: impl Into<String>, kind: Kind) -> Self {
        self.extract.insert(path.into(), kind);
        self
    }

    /// Makes this a virtual field writing into `path`.
    #[must_use]
    pub fn inject(mut self, path: impl Into<String>) -> Self {
        self.inject = Some(path.into());
        self
    }

    /// Adds a label path.
    #[must_use]
    pub fn label(mut self, path: impl Into<String>) -> Self {
        self.label.push(path.into());
        self
    }

    /// Returns `true` for virtual fields.
    #[must_use]
    pub const fn is_injected(&self) -> bool {
        self.inject.is_some()
    }

    /// Returns `true` if values for this field are written by inserts and updates.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !self.readonly && !self.is_injected()
    }

    /// Name of the generated column for one of this field's extract paths.
    #[must_use]
    pub fn extract_store(&self, path: &str) -> String {
        path::extract_store(&self.store, path)
    }
}

/// Relation from a child field to a parent model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRelation {
    /// Field on this model holding the parent's identity.
    pub child_field: String,
    /// Name of the parent model.
    pub parent: String,
    /// Field on the parent referenced by `child_field`.
    pub parent_field: String,
}

/// Definition of a model and the table backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawModel")]
pub struct ModelDefinition {
    /// Model name.
    pub name: String,
    /// Name of the source this model belongs to.
    pub source: Option<String>,
    /// Database (schema) qualifier.
    pub database: Option<String>,
    /// Table name.
    pub table: String,
    /// Fields, in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Identity field name.
    pub id: Option<String>,
    /// Unique constraints by name.
    pub unique: BTreeMap<String, Vec<String>>,
    /// Secondary indexes by name.
    pub index: BTreeMap<String, Vec<String>>,
    /// Raw create statement that bypasses synthesis.
    pub definition: Option<String>,
    /// Label entries (`field` or `field__path`) for display and search.
    pub label: Vec<String>,
    /// Natural sort order, each entry prefixed with `+` or `-`.
    pub order: Vec<String>,
    /// Relations to parent models.
    pub parents: Vec<ParentRelation>,
}

#[derive(Deserialize)]
struct RawModel {
    name: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    unique: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    label: Vec<String>,
    #[serde(default)]
    order: Vec<String>,
    #[serde(default)]
    parents: Vec<ParentRelation>,
}

impl From<RawModel> for ModelDefinition {
    /// The identity field auto-increments unless its `auto` is given.
    fn from(raw: RawModel) -> Self {
        let order = if raw.order.is_empty() {
            default_order(&raw.label)
        } else {
            raw.order
        };
        let fields = raw
            .fields
            .into_iter()
            .map(|mut field| {
                if field.auto.is_none() && raw.id.as_ref() == Some(&field.name) {
                    field.auto = Some(true);
                }
                FieldDefinition::from(field)
            })
            .collect();
        Self {
            table: raw.table.unwrap_or_else(|| raw.name.clone()),
            name: raw.name,
            source: raw.source,
            database: raw.database,
            fields,
            id: raw.id,
            unique: raw.unique,
            index: raw.index,
            definition: raw.definition,
            label: raw.label,
            order,
            parents: raw.parents,
        }
    }
}

fn default_order(label: &[String]) -> Vec<String> {
    label
        .iter()
        .filter(|entry| !entry.contains(path::SEPARATOR))
        .map(|entry| format!("+{entry}"))
        .collect()
}

impl ModelDefinition {
    /// Creates an empty model backed by a table of the same name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            source: None,
            database: None,
            fields: Vec::new(),
            id: None,
            unique: BTreeMap::new(),
            index: BTreeMap::new(),
            definition: None,
            label: Vec::new(),
            order: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Sets the owning source name.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the database qualifier.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the identity field.
    #[must_use]
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.id = Some(name.into());
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.unique
            .insert(name.into(), fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Adds a secondary index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.index
            .insert(name.into(), fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Sets a raw create statement.
    #[must_use]
    pub fn definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Sets the label entries; the natural order follows them unless set explicitly.
    #[must_use]
    pub fn label(mut self, label: &[&str]) -> Self {
        self.label = label.iter().map(|l| (*l).to_string()).collect();
        if self.order.is_empty() {
            self.order = default_order(&self.label);
        }
        self
    }

    /// Sets the natural sort order.
    #[must_use]
    pub fn order(mut self, order: &[&str]) -> Self {
        self.order = order.iter().map(|o| (*o).to_string()).collect();
        self
    }

    /// Adds a relation to a parent model.
    #[must_use]
    pub fn parent(
        mut self,
        child_field: impl Into<String>,
        parent: impl Into<String>,
        parent_field: impl Into<String>,
    ) -> Self {
        self.parents.push(ParentRelation {
            child_field: child_field.into(),
            parent: parent.into(),
            parent_field: parent_field.into(),
        });
        self
    }

    /// Gets a field by logical name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolves a field name to its store; anything else is taken verbatim.
    #[must_use]
    pub fn store_of(&self, name: &str) -> String {
        self.get_field(name)
            .map_or_else(|| name.to_string(), |f| f.store.clone())
    }

    /// The identity field, if one is declared and exists.
    #[must_use]
    pub fn id_field(&self) -> Option<&FieldDefinition> {
        self.id.as_deref().and_then(|id| self.get_field(id))
    }

    /// The parent relation whose child field is `field`.
    #[must_use]
    pub fn parent_of(&self, field: &str) -> Option<&ParentRelation> {
        self.parents.iter().find(|p| p.child_field == field)
    }

    /// Names of every generated column, in emission order.
    #[must_use]
    pub fn generated_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !f.is_injected())
            .flat_map(|f| f.extract.keys().map(|path| f.extract_store(path)))
            .collect()
    }
}
