//! Conversion of records at the row boundary.
//!
//! Callers work with records keyed by field name. Rows going to the
//! database are keyed by store, with opaque values as JSON documents and
//! injected fields folded into the document they target. Rows coming back
//! are decoded the other way.

use relations_core::path::{self, KEY_MARKER};
use relations_core::{FieldDefinition, Kind, ModelDefinition, Record, SqlValue};
use serde_json::{Map, Value};

use crate::error::{OrmError, Result};

/// Converts a record keyed by field name into a row keyed by store.
pub fn encode(model: &ModelDefinition, record: &Record) -> Result<Record> {
    if let Some(unknown) = record.keys().find(|name| model.get_field(name).is_none()) {
        return Err(OrmError::InvalidField {
            model: model.name.clone(),
            field: unknown.clone(),
        });
    }

    let mut row = Record::new();

    for field in model.fields.iter().filter(|f| !f.is_injected()) {
        if let Some(value) = record.get(&field.name) {
            row.insert(field.store.clone(), encode_value(field, value));
        }
    }

    for field in model.fields.iter().filter(|f| f.is_injected()) {
        let (Some(value), Some(inject)) = (record.get(&field.name), field.inject.as_deref())
        else {
            continue;
        };
        let segments = path::segments(inject);
        let Some((target, rest)) = segments.split_first() else {
            continue;
        };
        let store = model.store_of(target);
        let mut document = row.get(&store).map_or(Value::Null, SqlValue::to_json);
        set_path(&mut document, rest, value.to_json());
        row.insert(store, SqlValue::Json(document));
    }

    Ok(row)
}

fn encode_value(field: &FieldDefinition, value: &SqlValue) -> SqlValue {
    match (field.kind, value) {
        (_, SqlValue::Null) => SqlValue::Null,
        (Kind::Opaque, value) => SqlValue::Json(value.to_json()),
        (_, value) => value.clone(),
    }
}

/// Converts a row keyed by store into a record keyed by field name.
pub fn decode(model: &ModelDefinition, row: &Record) -> Result<Record> {
    let mut record = Record::new();

    for field in model.fields.iter().filter(|f| !f.is_injected()) {
        if let Some(value) = row.get(&field.store) {
            record.insert(field.name.clone(), decode_value(field, value)?);
        }
    }

    for field in model.fields.iter().filter(|f| f.is_injected()) {
        let Some(inject) = field.inject.as_deref() else {
            continue;
        };
        let segments = path::segments(inject);
        let Some((target, rest)) = segments.split_first() else {
            continue;
        };
        if let Some(document) = record.get(*target).map(SqlValue::to_json) {
            if let Some(value) = get_path(&document, rest) {
                record.insert(field.name.clone(), SqlValue::from(value.clone()));
            }
        }
    }

    Ok(record)
}

fn decode_value(field: &FieldDefinition, value: &SqlValue) -> Result<SqlValue> {
    Ok(match (field.kind, value) {
        (_, SqlValue::Null) => SqlValue::Null,
        (Kind::Opaque, SqlValue::Text(text)) => SqlValue::Json(serde_json::from_str(text)?),
        (Kind::Opaque, value) => SqlValue::Json(value.to_json()),
        (Kind::Bool, SqlValue::Int(n)) => SqlValue::Bool(*n != 0),
        (_, value) => value.clone(),
    })
}

/// Label texts of a decoded record, one per label entry of the model.
#[must_use]
pub fn labels(model: &ModelDefinition, record: &Record) -> Vec<String> {
    model
        .label
        .iter()
        .map(|entry| {
            let segments = path::segments(entry);
            let Some((name, rest)) = segments.split_first() else {
                return String::new();
            };
            match record.get(*name) {
                Some(value) if rest.is_empty() => value.to_text(),
                Some(value) => get_path(&value.to_json(), rest)
                    .map(|v| SqlValue::from(v.clone()).to_text())
                    .unwrap_or_default(),
                None => String::new(),
            }
        })
        .collect()
}

fn key(segment: &str) -> &str {
    segment.strip_prefix(KEY_MARKER).unwrap_or(segment)
}

fn array_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let at = if index < 0 { len + index } else { index };
    usize::try_from(at).ok().filter(|_| at < len)
}

fn get_path<'a>(document: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(document);
    };
    let next = match path::index(first) {
        Some(index) => {
            let items = document.as_array()?;
            items.get(array_index(items.len(), index)?)?
        }
        None => document.as_object()?.get(key(first))?,
    };
    get_path(next, rest)
}

/// Writes `value` at `segments` inside `document`, creating containers on
/// the way. An index past either end of an array appends.
fn set_path(document: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *document = value;
        return;
    };

    if let Some(index) = path::index(first) {
        if !document.is_array() {
            *document = Value::Array(Vec::new());
        }
        if let Value::Array(items) = document {
            match array_index(items.len(), index) {
                Some(at) => set_path(&mut items[at], rest, value),
                None => {
                    let mut item = Value::Null;
                    set_path(&mut item, rest, value);
                    items.push(item);
                }
            }
        }
    } else {
        if !document.is_object() {
            *document = Value::Object(Map::new());
        }
        if let Value::Object(map) = document {
            let slot = map.entry(key(first).to_string()).or_insert(Value::Null);
            set_path(slot, rest, value);
        }
    }
}
