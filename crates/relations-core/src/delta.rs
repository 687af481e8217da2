//! Migration deltas.
//!
//! A [`MigrationDelta`] describes how one [`ModelDefinition`] turns into
//! the next. The dialect reads it alongside the original definition to
//! emit `ALTER TABLE` clauses; [`ModelDefinition::migrated`] folds it into
//! a new definition without touching the original.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldDefault, FieldDefinition, Kind, ModelDefinition};

/// Partial replacement of a field's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPatch {
    /// New logical name.
    pub name: Option<String>,
    /// New physical column name.
    pub store: Option<String>,
    /// New kind.
    pub kind: Option<Kind>,
    /// New nullability.
    pub none: Option<bool>,
    /// New default.
    pub default: Option<FieldDefault>,
    /// New string length.
    pub length: Option<u32>,
    /// New raw definition.
    pub definition: Option<String>,
    /// New auto-increment flag.
    pub auto: Option<bool>,
    /// New readonly flag.
    pub readonly: Option<bool>,
    /// Replacement extract paths.
    pub extract: Option<BTreeMap<String, Kind>>,
    /// New inject path.
    pub inject: Option<String>,
    /// Replacement label paths.
    pub label: Option<Vec<String>>,
}

impl FieldPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the field.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Moves the field to another column.
    #[must_use]
    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    /// Changes the kind.
    #[must_use]
    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Replaces the extract paths.
    #[must_use]
    pub fn extract(mut self, extract: &[(&str, Kind)]) -> Self {
        self.extract = Some(
            extract
                .iter()
                .map(|(path, kind)| ((*path).to_string(), *kind))
                .collect(),
        );
        self
    }

    /// Applies this patch on top of `original`, returning the merged field.
    ///
    /// A rename without an explicit store moves the column too, as long as
    /// the original column was named after the field.
    #[must_use]
    pub fn merge(&self, original: &FieldDefinition) -> FieldDefinition {
        let mut merged = original.clone();

        if let Some(name) = &self.name {
            merged.name.clone_from(name);
            if self.store.is_none() && original.store == original.name {
                merged.store.clone_from(name);
            }
        }
        if let Some(store) = &self.store {
            merged.store.clone_from(store);
        }
        if let Some(kind) = self.kind {
            merged.kind = kind;
        }
        if let Some(none) = self.none {
            merged.none = none;
        }
        if let Some(default) = &self.default {
            merged.default = default.clone();
        }
        if self.length.is_some() {
            merged.length = self.length;
        }
        if self.definition.is_some() {
            merged.definition.clone_from(&self.definition);
        }
        if let Some(auto) = self.auto {
            merged.auto = auto;
        }
        if let Some(readonly) = self.readonly {
            merged.readonly = readonly;
        }
        if let Some(extract) = &self.extract {
            merged.extract.clone_from(extract);
        }
        if self.inject.is_some() {
            merged.inject.clone_from(&self.inject);
        }
        if let Some(label) = &self.label {
            merged.label.clone_from(label);
        }

        merged
    }
}

/// Field-level changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldChanges {
    /// Fields to add, in order.
    pub add: Vec<FieldDefinition>,
    /// Names of fields to remove.
    pub remove: Vec<String>,
    /// Patches keyed by the original field name.
    pub change: BTreeMap<String, FieldPatch>,
}

/// Changes to a named set of unique constraints or indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintChanges {
    /// Constraints to add.
    pub add: BTreeMap<String, Vec<String>>,
    /// Names of constraints to remove.
    pub remove: Vec<String>,
    /// Renames, old name to new name.
    pub rename: BTreeMap<String, String>,
}

impl ConstraintChanges {
    /// Returns `true` if nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.rename.is_empty()
    }

    fn apply(&self, original: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
        let mut result = original.clone();
        for name in &self.remove {
            result.remove(name);
        }
        for (old, new) in &self.rename {
            if let Some(fields) = result.remove(old) {
                result.insert(new.clone(), fields);
            }
        }
        for (name, fields) in &self.add {
            result.insert(name.clone(), fields.clone());
        }
        result
    }
}

/// Transition from one model definition to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationDelta {
    /// New database qualifier.
    pub database: Option<String>,
    /// New table name.
    pub table: Option<String>,
    /// Field changes.
    pub fields: FieldChanges,
    /// Unique constraint changes.
    pub unique: ConstraintChanges,
    /// Secondary index changes.
    pub index: ConstraintChanges,
}

impl MigrationDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames the table.
    #[must_use]
    pub fn rename_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn add_field(mut self, field: FieldDefinition) -> Self {
        self.fields.add.push(field);
        self
    }

    /// Removes a field.
    #[must_use]
    pub fn remove_field(mut self, name: impl Into<String>) -> Self {
        self.fields.remove.push(name.into());
        self
    }

    /// Changes a field.
    #[must_use]
    pub fn change_field(mut self, name: impl Into<String>, patch: FieldPatch) -> Self {
        self.fields.change.insert(name.into(), patch);
        self
    }
}

impl ModelDefinition {
    /// Returns the definition this model has after `delta` is applied.
    #[must_use]
    pub fn migrated(&self, delta: &MigrationDelta) -> Self {
        let mut migrated = self.clone();

        if delta.database.is_some() {
            migrated.database.clone_from(&delta.database);
        }
        if let Some(table) = &delta.table {
            migrated.table.clone_from(table);
        }

        migrated.fields = self
            .fields
            .iter()
            .filter(|f| !delta.fields.remove.contains(&f.name))
            .map(|f| {
                delta
                    .fields
                    .change
                    .get(&f.name)
                    .map_or_else(|| f.clone(), |patch| patch.merge(f))
            })
            .chain(delta.fields.add.iter().cloned())
            .collect();

        migrated.unique = delta.unique.apply(&self.unique);
        migrated.index = delta.index.apply(&self.index);

        migrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple() -> ModelDefinition {
        ModelDefinition::new("simple")
            .field(FieldDefinition::new("id", Kind::Int).auto())
            .field(FieldDefinition::new("foe", Kind::Str))
            .id("id")
            .index("foe", &["foe"])
    }

    #[test]
    fn test_rename_moves_store_named_after_field() {
        let original = FieldDefinition::new("foe", Kind::Str);
        let merged = FieldPatch::new().name("fum").kind(Kind::Float).merge(&original);
        assert_eq!(merged.name, "fum");
        assert_eq!(merged.store, "fum");
        assert_eq!(merged.kind, Kind::Float);
    }

    #[test]
    fn test_rename_keeps_custom_store() {
        let original = FieldDefinition::new("foe", Kind::Str).store("_foe");
        let merged = FieldPatch::new().name("fum").merge(&original);
        assert_eq!(merged.store, "_foe");
    }

    #[test]
    fn test_migrated_leaves_original_untouched() {
        let original = simple();
        let delta = MigrationDelta::new()
            .rename_table("simples")
            .add_field(FieldDefinition::new("fee", Kind::Int))
            .change_field("foe", FieldPatch::new().name("fum"));

        let migrated = original.migrated(&delta);

        assert_eq!(original, simple());
        assert_eq!(migrated.table, "simples");
        let names: Vec<&str> = migrated.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "fum", "fee"]);
    }

    #[test]
    fn test_constraint_changes_apply() {
        let mut delta = MigrationDelta::new();
        delta.index.rename.insert("foe".into(), "fum".into());
        delta.unique.add.insert("id".into(), vec!["id".into()]);

        let migrated = simple().migrated(&delta);
        assert_eq!(migrated.index.keys().collect::<Vec<_>>(), vec!["fum"]);
        assert_eq!(migrated.unique.keys().collect::<Vec<_>>(), vec!["id"]);
    }
}
