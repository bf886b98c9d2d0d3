//! Bounded read descriptions.
//!
//! A `Selection` is the only read shape the engine hands to a store:
//! AND-combined equality filters, an optional OR substring search over
//! named fields, one ordering, and offset/limit bounds. There is no
//! expression tree to keep stores honest about what they must support.

use trellis_common::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Parses `asc`/`desc` (any case). Anything else is `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// One equality constraint, ANDed with the others.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Field name.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

/// OR substring search over a set of fields.
#[derive(Debug, Clone)]
pub struct SearchClause {
    /// The substring to look for. Case rules are the store's.
    pub term: String,
    /// Fields the search runs over.
    pub fields: Vec<String>,
}

/// A bounded, safe read against one table.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Table name.
    pub table: String,
    /// Equality filters, combined with AND.
    pub filters: Vec<Filter>,
    /// Free-text search, combined with the filters via AND.
    pub search: Option<SearchClause>,
    /// Ordering; `None` means store order.
    pub order_by: Option<(String, SortOrder)>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Maximum rows to return.
    pub limit: Option<u64>,
    /// Columns to project; `None` means all columns.
    pub projection: Option<Vec<String>>,
}

impl Selection {
    /// Creates an unconstrained selection over a table.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            search: None,
            order_by: None,
            offset: None,
            limit: None,
            projection: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value,
        });
        self
    }

    /// Adds a substring search clause.
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>, fields: Vec<String>) -> Self {
        self.search = Some(SearchClause {
            term: term.into(),
            fields,
        });
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn with_order(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    /// Sets offset/limit pagination bounds.
    #[must_use]
    pub const fn with_bounds(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Sets only a row cap.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Projects a subset of columns.
    #[must_use]
    pub fn with_projection(mut self, columns: Vec<String>) -> Self {
        self.projection = Some(columns);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }

    #[test]
    fn test_builder() {
        let sel = Selection::all("cutting")
            .with_filter("machine", Value::String("M1".into()))
            .with_order("id", SortOrder::Desc)
            .with_bounds(10, 5);
        assert_eq!(sel.table, "cutting");
        assert_eq!(sel.filters.len(), 1);
        assert_eq!(sel.offset, Some(10));
        assert_eq!(sel.limit, Some(5));
    }
}
