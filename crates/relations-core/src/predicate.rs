//! Predicate compilation.
//!
//! A criterion key is either a bare operator, which addresses the field's
//! own column, or `<path>__<operator>` addressing a path inside it. A path
//! with no recognized operator suffix compares for equality. Declared
//! extract paths go through their generated column; any other path is read
//! with `JSON_EXTRACT` and its JSON address is bound ahead of the predicate's
//! values. `->>` only takes a literal path, so it cannot carry a parameter.

use crate::dialect::{Dialect, MySqlDialect};
use crate::path;
use crate::query::Query;
use crate::schema::FieldDefinition;
use crate::value::{SqlValue, ToSqlValue};

/// A filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Member of a list.
    In,
    /// Not a member of a list.
    Ne,
    /// Contains the value as a substring.
    Like,
    /// Does not contain the value as a substring.
    NotLike,
    /// Is (or is not) NULL.
    Null,
}

impl Operator {
    /// Parses an operator name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "ne" => Some(Self::Ne),
            "like" => Some(Self::Like),
            "notlike" => Some(Self::NotLike),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    /// Returns the operator's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Ne => "ne",
            Self::Like => "like",
            Self::NotLike => "notlike",
            Self::Null => "null",
        }
    }

    /// Comparison symbol, for the comparison operators.
    #[must_use]
    pub const fn symbol(self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            _ => None,
        }
    }
}

/// The value side of a criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// A single value.
    One(SqlValue),
    /// A list of values, for `in` and `ne`.
    Many(Vec<SqlValue>),
}

impl FilterValue {
    /// The values as a list; a single value becomes a one-element list.
    #[must_use]
    pub fn to_list(&self) -> Vec<SqlValue> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    /// The value as a scalar; a list becomes a JSON array.
    #[must_use]
    pub fn to_scalar(&self) -> SqlValue {
        match self {
            Self::One(value) => value.clone(),
            Self::Many(values) => SqlValue::Json(serde_json::Value::Array(
                values.iter().map(SqlValue::to_json).collect(),
            )),
        }
    }

    /// Truthiness of the value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::One(value) => value.is_truthy(),
            Self::Many(values) => !values.is_empty(),
        }
    }
}

impl<T: ToSqlValue> From<T> for FilterValue {
    fn from(value: T) -> Self {
        Self::One(value.to_sql_value())
    }
}

impl<T: ToSqlValue> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

/// A single criterion on a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    /// Operator, or `<path>__<operator>`, or a bare path.
    pub key: String,
    /// Value to compare against.
    pub value: FilterValue,
}

impl Criterion {
    /// Creates a criterion.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Splits a criterion key into its path (if any) and operator.
#[must_use]
pub fn parse_key(key: &str) -> (Option<&str>, Operator) {
    if let Some(operator) = Operator::parse(key) {
        return (None, operator);
    }
    if let Some((path, name)) = key.rsplit_once(path::SEPARATOR) {
        if let Some(operator) = Operator::parse(name) {
            return (Some(path), operator);
        }
    }
    (Some(key), Operator::Eq)
}

/// Address of a field, or of a path within it, plus the values the address binds.
#[must_use]
pub fn address(field: &FieldDefinition, path: Option<&str>) -> (String, Vec<SqlValue>) {
    let dialect = MySqlDialect::new();
    match path {
        None => (dialect.quote_identifier(&field.store), Vec::new()),
        Some(path) if field.extract.contains_key(path) => {
            (dialect.quote_identifier(&field.extract_store(path)), Vec::new())
        }
        Some(path) => (
            format!(
                "JSON_UNQUOTE(JSON_EXTRACT({}, %s))",
                dialect.quote_identifier(&field.store)
            ),
            vec![SqlValue::Text(path::walk(path))],
        ),
    }
}

/// Wraps a value in `LIKE` wildcards.
#[must_use]
pub fn like_value(value: &SqlValue) -> SqlValue {
    SqlValue::Text(format!("%{}%", value.to_text()))
}

/// Compiles every criterion on `field` into `query`, in order.
#[must_use]
pub fn compile(field: &FieldDefinition, criteria: &[Criterion], query: Query) -> Query {
    criteria
        .iter()
        .fold(query, |query, criterion| compile_one(field, criterion, query))
}

fn compile_one(field: &FieldDefinition, criterion: &Criterion, query: Query) -> Query {
    let (path, operator) = parse_key(&criterion.key);

    if matches!(operator, Operator::In | Operator::Ne) {
        let list = criterion.value.to_list();
        if list.is_empty() {
            let always = if operator == Operator::In { "FALSE" } else { "TRUE" };
            return query.filter(always, Vec::new());
        }
        let (address, mut values) = address(field, path);
        let placeholders = vec![SqlValue::placeholder(); list.len()].join(",");
        let keyword = if operator == Operator::In { "IN" } else { "NOT IN" };
        values.extend(list);
        return query.filter(format!("{address} {keyword} ({placeholders})"), values);
    }

    let (address, mut values) = address(field, path);
    match operator {
        Operator::Like | Operator::NotLike => {
            let keyword = if operator == Operator::Like { "LIKE" } else { "NOT LIKE" };
            values.push(like_value(&criterion.value.to_scalar()));
            query.filter(format!("{address} {keyword} %s"), values)
        }
        Operator::Null => {
            let predicate = if criterion.value.is_truthy() {
                format!("{address} IS NULL")
            } else {
                format!("{address} IS NOT NULL")
            };
            query.filter(predicate, values)
        }
        _ => {
            let symbol = operator.symbol().unwrap_or("=");
            values.push(criterion.value.to_scalar());
            query.filter(format!("{address}{symbol}%s"), values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Kind;

    fn compiled(field: &FieldDefinition, criterion: Criterion) -> (Vec<String>, Vec<SqlValue>) {
        let query = compile(field, &[criterion], Query::new());
        (query.wheres().to_vec(), query.where_values().to_vec())
    }

    fn ints(values: &[i64]) -> Vec<SqlValue> {
        values.iter().map(|n| SqlValue::Int(*n)).collect()
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("gt"), (None, Operator::Gt));
        assert_eq!(parse_key("a__b__notlike"), (Some("a__b"), Operator::NotLike));
        assert_eq!(parse_key("a__0___1"), (Some("a__0___1"), Operator::Eq));
    }

    #[test]
    fn test_in() {
        let id = FieldDefinition::new("id", Kind::Int);
        assert_eq!(
            compiled(&id, Criterion::new("in", vec![1_i64, 2, 3])),
            (vec!["`id` IN (%s,%s,%s)".to_string()], ints(&[1, 2, 3]))
        );
        assert_eq!(
            compiled(&id, Criterion::new("ne", vec![1_i64, 2, 3])),
            (vec!["`id` NOT IN (%s,%s,%s)".to_string()], ints(&[1, 2, 3]))
        );
    }

    #[test]
    fn test_in_empty() {
        let id = FieldDefinition::new("id", Kind::Int);
        assert_eq!(
            compiled(&id, Criterion::new("in", Vec::<i64>::new())),
            (vec!["FALSE".to_string()], vec![])
        );
        assert_eq!(
            compiled(&id, Criterion::new("ne", Vec::<i64>::new())),
            (vec!["TRUE".to_string()], vec![])
        );

        let meta = FieldDefinition::new("meta", Kind::Opaque);
        assert_eq!(
            compiled(&meta, Criterion::new("a__in", Vec::<i64>::new())),
            (vec!["FALSE".to_string()], vec![])
        );
    }

    #[test]
    fn test_like() {
        let id = FieldDefinition::new("id", Kind::Int);
        assert_eq!(
            compiled(&id, Criterion::new("like", 1_i64)),
            (
                vec!["`id` LIKE %s".to_string()],
                vec![SqlValue::Text("%1%".into())]
            )
        );
        assert_eq!(
            compiled(&id, Criterion::new("notlike", "1")),
            (
                vec!["`id` NOT LIKE %s".to_string()],
                vec![SqlValue::Text("%1%".into())]
            )
        );
    }

    #[test]
    fn test_null() {
        let id = FieldDefinition::new("id", Kind::Int);
        assert_eq!(
            compiled(&id, Criterion::new("null", true)),
            (vec!["`id` IS NULL".to_string()], vec![])
        );
        assert_eq!(
            compiled(&id, Criterion::new("null", false)),
            (vec!["`id` IS NOT NULL".to_string()], vec![])
        );
    }

    #[test]
    fn test_comparisons() {
        let id = FieldDefinition::new("id", Kind::Int);
        for (key, expected) in [
            ("eq", "`id`=%s"),
            ("gt", "`id`>%s"),
            ("gte", "`id`>=%s"),
            ("lt", "`id`<%s"),
            ("lte", "`id`<=%s"),
        ] {
            assert_eq!(
                compiled(&id, Criterion::new(key, 1_i64)),
                (vec![expected.to_string()], ints(&[1]))
            );
        }
    }

    #[test]
    fn test_path_without_extract() {
        let meta = FieldDefinition::new("meta", Kind::Opaque);
        assert_eq!(
            compiled(&meta, Criterion::new("a__b__0___1", 1_i64)),
            (
                vec!["JSON_UNQUOTE(JSON_EXTRACT(`meta`, %s))=%s".to_string()],
                vec![SqlValue::Text("$.a.b[0].\"1\"".into()), SqlValue::Int(1)]
            )
        );
        assert_eq!(
            compiled(&meta, Criterion::new("a__null", true)),
            (
                vec!["JSON_UNQUOTE(JSON_EXTRACT(`meta`, %s)) IS NULL".to_string()],
                vec![SqlValue::Text("$.a".into())]
            )
        );
    }

    #[test]
    fn test_path_through_extract() {
        let things = FieldDefinition::new("things", Kind::Opaque).extract("a__b", Kind::Int);
        assert_eq!(
            compiled(&things, Criterion::new("a__b__lte", 5_i64)),
            (vec!["`things__a__b`<=%s".to_string()], ints(&[5]))
        );
        assert_eq!(
            compiled(&things, Criterion::new("a__b__in", vec![1_i64, 2])),
            (vec!["`things__a__b` IN (%s,%s)".to_string()], ints(&[1, 2]))
        );
    }

    #[test]
    fn test_compile_keeps_criterion_order() {
        let id = FieldDefinition::new("id", Kind::Int);
        let query = compile(
            &id,
            &[Criterion::new("gt", 1_i64), Criterion::new("lt", 9_i64)],
            Query::new(),
        );
        assert_eq!(query.wheres(), ["`id`>%s", "`id`<%s"]);
        assert_eq!(query.where_values(), ints(&[1, 9]).as_slice());
    }
}
