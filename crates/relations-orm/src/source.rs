//! CRUD against a MySQL source.
//!
//! A [`Source`] assembles every statement from a model definition and a
//! [`Selection`]: field criteria first, then the free-text group, then the
//! sort and the limit. Each write is one execute (or one batch) followed by
//! a commit.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use relations_core::{
    predicate, Dialect, FieldDefault, FieldDefinition, Kind, ModelDefinition, MySqlDialect, Query,
    Record, SqlValue,
};
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::record;
use crate::registry::Registry;
use crate::selection::Selection;

/// Rows returned by a search, and whether the search may be incomplete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieved {
    /// Decoded rows, keyed by field name.
    pub rows: Vec<Record>,
    /// Set when a limit was reached, here or in a parent search.
    pub overflow: bool,
}

/// Boxed parent search. Not `Send`, like the [`Connection`] futures it awaits.
type Search<'a> = Pin<Box<dyn Future<Output = Result<(Vec<Record>, bool)>> + 'a>>;

/// A MySQL source executing model operations over a [`Connection`].
///
/// Operations borrow the source mutably and run on the caller's task; their
/// futures are not `Send` and are awaited directly instead of spawned.
pub struct Source<C: Connection> {
    name: String,
    dialect: MySqlDialect,
    registry: Registry,
    connection: C,
}

impl<C: Connection> Source<C> {
    /// Creates a source named `name` over `connection`.
    pub fn new(name: impl Into<String>, connection: C) -> Self {
        Self {
            name: name.into(),
            dialect: MySqlDialect::new(),
            registry: Registry::new(),
            connection,
        }
    }

    /// Qualifies models without a database of their own with `database`.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.dialect = MySqlDialect::with_database(database);
        self
    }

    /// Sets the models parent relations are resolved against.
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    /// Returns the connection.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Consumes the source, returning its connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    // ----------------------------------------------------------------------
    // Assembly
    // ----------------------------------------------------------------------

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn check_criteria(model: &ModelDefinition, selection: &Selection) -> Result<()> {
        match selection
            .criteria()
            .keys()
            .find(|name| model.get_field(name).is_none())
        {
            Some(unknown) => Err(OrmError::InvalidField {
                model: model.name.clone(),
                field: unknown.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Adds field criteria, in field order, and the free-text group.
    async fn filtered(
        &mut self,
        model: &ModelDefinition,
        selection: &Selection,
        mut query: Query,
    ) -> Result<(Query, bool)> {
        Self::check_criteria(model, selection)?;

        for field in &model.fields {
            if let Some(criteria) = selection.criteria().get(&field.name) {
                query = predicate::compile(field, criteria, query);
            }
        }

        let mut overflow = false;
        if let Some(term) = selection.like_term() {
            let (clauses, values, searched_overflow) =
                self.like_group(model, term, selection.chunk_size()).await?;
            if !clauses.is_empty() {
                query = query.filter(format!("({})", clauses.join(" OR ")), values);
            }
            overflow = searched_overflow;
        }

        Ok((query, overflow))
    }

    /// Builds the OR-group matching `term` against every label entry.
    async fn like_group(
        &mut self,
        model: &ModelDefinition,
        term: &str,
        chunk: u64,
    ) -> Result<(Vec<String>, Vec<SqlValue>, bool)> {
        let like = predicate::like_value(&SqlValue::Text(term.to_string()));
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        let mut overflow = false;

        for entry in &model.label {
            let (name, path) = match entry.split_once(relations_core::path::SEPARATOR) {
                Some((name, path)) => (name, Some(path)),
                None => (entry.as_str(), None),
            };
            let Some(field) = model.get_field(name) else {
                continue;
            };

            if path.is_none() {
                if let Some(relation) = model.parent_of(name) {
                    let parent = self
                        .registry
                        .get(&relation.parent)
                        .cloned()
                        .ok_or_else(|| OrmError::UnknownModel(relation.parent.clone()))?;
                    let parent_store = parent.store_of(&relation.parent_field);
                    let column = self.quote(&parent_store);
                    let mut narrowing = Selection::new().like(term).limit(chunk).chunk(chunk);

                    let search: Search<'_> =
                        Box::pin(self.select(&parent, &mut narrowing, &column));
                    let (rows, parent_overflow) = search.await?;

                    let ids: Vec<SqlValue> = rows
                        .into_iter()
                        .filter_map(|mut row| row.remove(&parent_store))
                        .collect();

                    if ids.is_empty() {
                        debug!(
                            model = %model.name,
                            field = %name,
                            "No parent matched, searching the field itself"
                        );
                        clauses.push(format!("{} LIKE %s", self.quote(&field.store)));
                        values.push(like.clone());
                    } else {
                        let placeholders = vec![SqlValue::placeholder(); ids.len()].join(",");
                        clauses.push(format!("{} IN ({placeholders})", self.quote(&field.store)));
                        values.extend(ids);
                        overflow = overflow || parent_overflow;
                    }
                    continue;
                }
            }

            let paths: Vec<&str> = match path {
                Some(path) => vec![path],
                None => field.label.iter().map(String::as_str).collect(),
            };

            if paths.is_empty() {
                clauses.push(format!("{} LIKE %s", self.quote(&field.store)));
                values.push(like.clone());
            }
            for path in paths {
                let (address, bound) = predicate::address(field, Some(path));
                clauses.push(format!("{address} LIKE %s"));
                values.extend(bound);
                values.push(like.clone());
            }
        }

        Ok((clauses, values, overflow))
    }

    /// Adds the explicit sort, consuming it, or the model's natural order.
    fn sorted(&self, model: &ModelDefinition, selection: &mut Selection, query: Query) -> Query {
        let explicit = selection.take_sort();
        let sort = if explicit.is_empty() {
            model.order.clone()
        } else {
            explicit
        };

        sort.iter().fold(query, |query, entry| {
            let (name, descending) = match entry.strip_prefix('-') {
                Some(name) => (name, true),
                None => (entry.strip_prefix('+').unwrap_or(entry), false),
            };
            let column = self.quote(&model.store_of(name));
            if descending {
                query.order_by(format!("{column} DESC"))
            } else {
                query.order_by(column)
            }
        })
    }

    fn limited(selection: &Selection, query: Query) -> Query {
        match (selection.limit_value(), selection.offset_value()) {
            (Some(limit), Some(offset)) => {
                query.limit("%s, %s", vec![int_value(offset), int_value(limit)])
            }
            (Some(limit), None) => query.limit("%s", vec![int_value(limit)]),
            _ => query,
        }
    }

    /// Runs a select of `columns` and returns the raw rows.
    async fn select(
        &mut self,
        model: &ModelDefinition,
        selection: &mut Selection,
        columns: &str,
    ) -> Result<(Vec<Record>, bool)> {
        let query = Query::new().select(columns).from(self.dialect.table(model));
        let (query, overflow) = self.filtered(model, selection, query).await?;
        let query = self.sorted(model, selection, query);
        let (sql, values) = Self::limited(selection, query).build();

        debug!(model = %model.name, sql = %sql, "Selecting");
        let rows = self.connection.fetch_all(&sql, &values).await?;

        let reached = selection
            .limit_value()
            .is_some_and(|limit| u64::try_from(rows.len()).unwrap_or(u64::MAX) >= limit);

        Ok((rows, overflow || reached))
    }

    fn assignments(
        model: &ModelDefinition,
        row: &Record,
        skip: Option<&str>,
    ) -> Vec<(String, SqlValue)> {
        model
            .fields
            .iter()
            .filter(|f| f.is_writable() && Some(f.name.as_str()) != skip)
            .filter_map(|f| row.get(&f.store).map(|v| (f.store.clone(), v.clone())))
            .collect()
    }

    // ----------------------------------------------------------------------
    // Operations
    // ----------------------------------------------------------------------

    /// Inserts records and returns them with their identity back-filled.
    ///
    /// With an auto-increment identity each record is inserted on its own so
    /// its generated id can be read back; otherwise all records go in one batch.
    pub async fn create(
        &mut self,
        model: &ModelDefinition,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(records);
        }

        let fields: Vec<&FieldDefinition> =
            model.fields.iter().filter(|f| f.is_writable()).collect();
        let columns: Vec<String> = fields.iter().map(|f| self.quote(&f.store)).collect();
        let placeholders: Vec<String> = fields
            .iter()
            .map(|f| SqlValue::named_placeholder(&f.store))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES({})",
            self.dialect.table(model),
            columns.join(","),
            placeholders.join(",")
        );

        let rows = records
            .iter()
            .map(|r| insert_row(model, &fields, r))
            .collect::<Result<Vec<_>>>()?;

        let mut created = records;
        if let Some(id) = model.id_field().filter(|f| f.auto) {
            for (record, row) in created.iter_mut().zip(&rows) {
                let executed = self
                    .connection
                    .execute_many(&sql, std::slice::from_ref(row))
                    .await?;
                if let Some(last) = executed.last_insert_id {
                    record.insert(id.name.clone(), int_value(last));
                }
            }
        } else {
            self.connection.execute_many(&sql, &rows).await?;
        }
        self.connection.commit().await?;

        info!(model = %model.name, count = created.len(), "Created records");
        Ok(created)
    }

    /// Retrieves every matching row.
    pub async fn retrieve_many(
        &mut self,
        model: &ModelDefinition,
        selection: &mut Selection,
    ) -> Result<Retrieved> {
        let (rows, overflow) = self.select(model, selection, "*").await?;
        let rows = rows
            .iter()
            .map(|row| record::decode(model, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Retrieved { rows, overflow })
    }

    /// Retrieves exactly one row.
    ///
    /// More than one match is an error; no match is an error unless `verify`
    /// is `false`, which yields `None`.
    pub async fn retrieve_one(
        &mut self,
        model: &ModelDefinition,
        selection: &mut Selection,
        verify: bool,
    ) -> Result<Option<Record>> {
        let mut retrieved = self.retrieve_many(model, selection).await?;
        match retrieved.rows.len() {
            0 if verify => Err(OrmError::NotFound {
                model: model.name.clone(),
            }),
            0 | 1 => Ok(retrieved.rows.pop()),
            _ => Err(OrmError::Cardinality {
                model: model.name.clone(),
            }),
        }
    }

    /// Counts matching rows.
    pub async fn count(&mut self, model: &ModelDefinition, selection: &Selection) -> Result<i64> {
        let query = Query::new()
            .select("COUNT(*) AS `total`")
            .from(self.dialect.table(model));
        let (query, _) = self.filtered(model, selection, query).await?;
        let (sql, values) = query.build();

        let rows = self.connection.fetch_all(&sql, &values).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(SqlValue::as_int)
            .unwrap_or(0))
    }

    /// Applies `changes` (keyed by field name) to every matching row.
    ///
    /// Refuses to run without criteria or a search term.
    pub async fn update(
        &mut self,
        model: &ModelDefinition,
        selection: &Selection,
        changes: &Record,
    ) -> Result<u64> {
        let (query, _) = self.filtered(model, selection, Query::new()).await?;
        let Some(condition) = query.condition() else {
            return Err(OrmError::no_target(&model.name, "update"));
        };

        let row = record::encode(model, changes)?;
        let assignments = Self::assignments(model, &row, None);
        if assignments.is_empty() {
            return Ok(0);
        }

        let set: Vec<String> = assignments
            .iter()
            .map(|(store, _)| format!("{}=%s", self.quote(store)))
            .collect();
        let mut values: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
        values.extend(query.where_values().iter().cloned());

        let sql = format!(
            "UPDATE {} SET {} WHERE {condition}",
            self.dialect.table(model),
            set.join(",")
        );
        let executed = self.connection.execute(&sql, &values).await?;
        self.connection.commit().await?;

        info!(model = %model.name, rows = executed.rows_affected, "Updated rows");
        Ok(executed.rows_affected)
    }

    /// Updates each record by its identity.
    pub async fn update_records(
        &mut self,
        model: &ModelDefinition,
        records: &[Record],
    ) -> Result<u64> {
        let Some(id) = model.id_field() else {
            return Err(OrmError::no_target(&model.name, "update"));
        };
        if records
            .iter()
            .any(|r| r.get(&id.name).map_or(true, SqlValue::is_null))
        {
            return Err(OrmError::no_target(&model.name, "update"));
        }

        let table = self.dialect.table(model);
        let id_column = self.quote(&id.store);
        let mut total = 0;

        for record in records {
            let row = record::encode(model, record)?;
            let assignments = Self::assignments(model, &row, Some(&id.name));
            if assignments.is_empty() {
                continue;
            }

            let set: Vec<String> = assignments
                .iter()
                .map(|(store, _)| format!("{}=%s", self.quote(store)))
                .collect();
            let mut values: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
            values.push(record.get(&id.name).cloned().unwrap_or(SqlValue::Null));

            let sql = format!("UPDATE {table} SET {} WHERE {id_column}=%s", set.join(","));
            total += self.connection.execute(&sql, &values).await?.rows_affected;
        }
        self.connection.commit().await?;

        info!(model = %model.name, rows = total, "Updated records");
        Ok(total)
    }

    /// Deletes every matching row.
    ///
    /// Refuses to run without criteria or a search term.
    pub async fn delete(&mut self, model: &ModelDefinition, selection: &Selection) -> Result<u64> {
        let (query, _) = self.filtered(model, selection, Query::new()).await?;
        let Some(condition) = query.condition() else {
            return Err(OrmError::no_target(&model.name, "delete"));
        };

        let sql = format!("DELETE FROM {} WHERE {condition}", self.dialect.table(model));
        let executed = self.connection.execute(&sql, query.where_values()).await?;
        self.connection.commit().await?;

        info!(model = %model.name, rows = executed.rows_affected, "Deleted rows");
        Ok(executed.rows_affected)
    }

    /// Deletes rows by identity.
    pub async fn delete_ids(&mut self, model: &ModelDefinition, ids: &[SqlValue]) -> Result<u64> {
        let Some(id) = model.id_field() else {
            return Err(OrmError::no_target(&model.name, "delete"));
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec![SqlValue::placeholder(); ids.len()].join(",");
        let sql = format!(
            "DELETE FROM {} WHERE {} IN ({placeholders})",
            self.dialect.table(model),
            self.quote(&id.store)
        );
        let executed = self.connection.execute(&sql, ids).await?;
        self.connection.commit().await?;

        info!(model = %model.name, rows = executed.rows_affected, "Deleted records");
        Ok(executed.rows_affected)
    }

    /// Label texts of every matching row, keyed by identity text.
    pub async fn labels(
        &mut self,
        model: &ModelDefinition,
        selection: &mut Selection,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let Some(id) = model.id_field() else {
            return Err(OrmError::no_target(&model.name, "label"));
        };
        let id_name = id.name.clone();

        let retrieved = self.retrieve_many(model, selection).await?;
        Ok(retrieved
            .rows
            .iter()
            .map(|row| {
                let key = row.get(&id_name).map(SqlValue::to_text).unwrap_or_default();
                (key, record::labels(model, row))
            })
            .collect())
    }
}

fn int_value(n: u64) -> SqlValue {
    SqlValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Encodes a record for insertion, filling absent writable fields with
/// their literal default or NULL.
fn insert_row(
    model: &ModelDefinition,
    fields: &[&FieldDefinition],
    record: &Record,
) -> Result<Record> {
    let mut row = record::encode(model, record)?;
    for field in fields {
        if !row.contains_key(&field.store) {
            let value = match &field.default {
                FieldDefault::Literal(literal) => {
                    if field.kind == Kind::Opaque {
                        SqlValue::Json(literal.clone())
                    } else {
                        SqlValue::from(literal.clone())
                    }
                }
                _ => SqlValue::Null,
            };
            row.insert(field.store.clone(), value);
        }
    }
    Ok(row)
}
