//! Query builder threaded through the compiling steps.
//!
//! Every step takes the query by value and hands it back, so the clauses a
//! step contributes are visible in its return value. Bound values are kept
//! per clause and concatenated in rendering order, which keeps them aligned
//! with the placeholders in the final text.

use crate::value::SqlValue;

/// A `SELECT` statement under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    selects: Vec<String>,
    from: Option<String>,
    wheres: Vec<String>,
    where_values: Vec<SqlValue>,
    order_bys: Vec<String>,
    limit: Option<String>,
    limit_values: Vec<SqlValue>,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a select expression.
    #[must_use]
    pub fn select(mut self, expr: impl Into<String>) -> Self {
        self.selects.push(expr.into());
        self
    }

    /// Sets the FROM table.
    #[must_use]
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Adds a predicate and the values bound by its placeholders.
    #[must_use]
    pub fn filter(mut self, predicate: impl Into<String>, values: Vec<SqlValue>) -> Self {
        self.wheres.push(predicate.into());
        self.where_values.extend(values);
        self
    }

    /// Adds an ORDER BY expression.
    #[must_use]
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_bys.push(expr.into());
        self
    }

    /// Sets the LIMIT clause body and its values, replacing any earlier one.
    #[must_use]
    pub fn limit(mut self, expr: impl Into<String>, values: Vec<SqlValue>) -> Self {
        self.limit = Some(expr.into());
        self.limit_values = values;
        self
    }

    /// Predicates added so far.
    #[must_use]
    pub fn wheres(&self) -> &[String] {
        &self.wheres
    }

    /// Values bound by the predicates.
    #[must_use]
    pub fn where_values(&self) -> &[SqlValue] {
        &self.where_values
    }

    /// ORDER BY expressions added so far.
    #[must_use]
    pub fn order_bys(&self) -> &[String] {
        &self.order_bys
    }

    /// Returns `true` if no predicate was added.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.wheres.is_empty()
    }

    /// The predicates joined with `AND`, if there are any.
    #[must_use]
    pub fn condition(&self) -> Option<String> {
        if self.wheres.is_empty() {
            None
        } else {
            Some(self.wheres.join(" AND "))
        }
    }

    /// Renders the statement and its values in placeholder order.
    #[must_use]
    pub fn build(self) -> (String, Vec<SqlValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.selects.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.selects.join(","));
        }

        if let Some(ref table) = self.from {
            sql.push_str(" FROM ");
            sql.push_str(table);
        }

        if let Some(condition) = self.condition() {
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
            params.extend(self.where_values);
        }

        if !self.order_bys.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_bys.join(","));
        }

        if let Some(ref limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
            params.extend(self.limit_values);
        }

        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all() {
        let (sql, params) = Query::new().from("`simple`").build();
        assert_eq!(sql, "SELECT * FROM `simple`");
        assert!(params.is_empty());
    }

    #[test]
    fn test_values_follow_placeholder_order() {
        let (sql, params) = Query::new()
            .limit("%s, %s", vec![SqlValue::Int(10), SqlValue::Int(5)])
            .order_by("`name`")
            .filter("`id`>%s", vec![SqlValue::Int(1)])
            .select("`id`")
            .from("`simple`")
            .filter(
                "JSON_UNQUOTE(JSON_EXTRACT(`meta`, %s))=%s",
                vec![SqlValue::Text("$.a".into()), SqlValue::Int(2)],
            )
            .build();

        assert_eq!(
            sql,
            "SELECT `id` FROM `simple` WHERE `id`>%s \
             AND JSON_UNQUOTE(JSON_EXTRACT(`meta`, %s))=%s ORDER BY `name` LIMIT %s, %s"
        );
        assert_eq!(
            params,
            vec![
                SqlValue::Int(1),
                SqlValue::Text("$.a".into()),
                SqlValue::Int(2),
                SqlValue::Int(10),
                SqlValue::Int(5),
            ]
        );
    }

    #[test]
    fn test_condition() {
        assert_eq!(Query::new().condition(), None);
        let query = Query::new()
            .filter("`a`=%s", vec![SqlValue::Int(1)])
            .filter("FALSE", vec![]);
        assert_eq!(query.condition().as_deref(), Some("`a`=%s AND FALSE"));
        assert!(!query.is_unfiltered());
    }
}
