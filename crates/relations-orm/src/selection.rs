//! Per-call query state.
//!
//! A [`Selection`] carries what one retrieve, count, update or delete call
//! narrows by: criteria per field, a free-text term, an explicit sort and
//! pagination.

use std::collections::BTreeMap;

use relations_core::path::SEPARATOR;
use relations_core::predicate::{Criterion, FilterValue};

/// Default bound on parent searches run while narrowing a free-text term.
pub const DEFAULT_CHUNK: u64 = 100;

/// Criteria, search term, sort and pagination for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    criteria: BTreeMap<String, Vec<Criterion>>,
    like: Option<String>,
    sort: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    chunk: u64,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            criteria: BTreeMap::new(),
            like: None,
            sort: Vec::new(),
            limit: None,
            offset: None,
            chunk: DEFAULT_CHUNK,
        }
    }

    /// Adds a criterion on `field`; `key` is an operator or `<path>__<operator>`.
    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.criteria
            .entry(field.into())
            .or_default()
            .push(Criterion::new(key, value));
        self
    }

    /// Adds a criterion from a `field__path__operator` key.
    ///
    /// A bare field name compares for equality.
    #[must_use]
    pub fn filter_by(self, key: &str, value: impl Into<FilterValue>) -> Self {
        match key.split_once(SEPARATOR) {
            Some((field, key)) => self.filter(field, key, value),
            None => self.filter(key, "eq", value),
        }
    }

    /// Sets the free-text search term.
    #[must_use]
    pub fn like(mut self, term: impl Into<String>) -> Self {
        self.like = Some(term.into());
        self
    }

    /// Sets an explicit sort, each entry a field optionally prefixed with `+` or `-`.
    #[must_use]
    pub fn sort(mut self, sort: &[&str]) -> Self {
        self.sort = sort.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Sets the maximum number of rows.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip; only applies with a limit.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the bound on parent searches.
    #[must_use]
    pub fn chunk(mut self, chunk: u64) -> Self {
        self.chunk = chunk;
        self
    }

    /// Criteria by field name.
    #[must_use]
    pub const fn criteria(&self) -> &BTreeMap<String, Vec<Criterion>> {
        &self.criteria
    }

    /// The free-text search term.
    #[must_use]
    pub fn like_term(&self) -> Option<&str> {
        self.like.as_deref()
    }

    /// The row limit.
    #[must_use]
    pub const fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// The row offset.
    #[must_use]
    pub const fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// The bound on parent searches.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.chunk
    }

    /// Returns `true` if anything narrows the selection.
    #[must_use]
    pub fn has_target(&self) -> bool {
        !self.criteria.is_empty() || self.like.is_some()
    }

    /// Takes the explicit sort, leaving none behind.
    pub fn take_sort(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sort)
    }
}
