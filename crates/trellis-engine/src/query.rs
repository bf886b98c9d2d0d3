//! The query builder.
//!
//! Turns `{search, filters, sortField, sortOrder, page, limit}` into a
//! bounded `Selection` against one table. Filter semantics are part of
//! the product contract: entries with null or empty values are
//! dropped (no constraint, not "match null"), free-text search ORs a
//! substring match over every string/text field, and the default
//! ordering is primary key descending so the newest records come
//! first.

use serde::Serialize;
use serde_json::{Map, Value as Json};

use trellis_common::{Record, TrellisError, TrellisResult, DEFAULT_PAGE_LIMIT};
use trellis_schema::TableDescriptor;
use trellis_store::{Selection, SortOrder};

use crate::coerce::coerce_for_write;

/// A record listing request.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// Requested sort field.
    pub sort_field: Option<String>,
    /// Requested sort direction (`asc`/`desc`).
    pub sort_order: Option<String>,
    /// Free-text search term.
    pub search: Option<String>,
    /// Field/value equality filters.
    pub filters: Map<String, Json>,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_field: None,
            sort_order: None,
            search: None,
            filters: Map::new(),
        }
    }
}

impl RecordQuery {
    /// Sets the page (clamped to at least 1).
    #[must_use]
    pub const fn with_page(mut self, page: u64) -> Self {
        self.page = if page == 0 { 1 } else { page };
        self
    }

    /// Sets the page size (clamped to at least 1).
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = if limit == 0 { 1 } else { limit };
        self
    }

    /// Sets the sort field and direction.
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order.into());
        self
    }

    /// Sets the free-text search term.
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Adds one equality filter.
    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: Json) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    /// The pagination offset.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) * self.limit
    }
}

/// Pagination metadata returned alongside a record page.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    /// Total matching records, ignoring pagination.
    pub total: u64,
    /// The requested page.
    pub page: u64,
    /// The requested page size.
    pub limit: u64,
    /// `ceil(total / limit)`.
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl Pagination {
    /// Builds pagination metadata for a query and its total.
    #[must_use]
    pub const fn new(query: &RecordQuery, total: u64) -> Self {
        Self {
            total,
            page: query.page,
            limit: query.limit,
            total_pages: total.div_ceil(query.limit),
        }
    }
}

/// One page of records plus its pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    /// The records on this page.
    pub records: Vec<Record>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

/// Builds the filter-and-search part of a selection.
///
/// Shared by record listing and CSV export, which must agree on what
/// a filter means. Null and empty-string filter values are dropped;
/// a filter on an undeclared field is a validation error.
pub fn filter_selection(
    desc: &TableDescriptor,
    filters: &Map<String, Json>,
    search: Option<&str>,
) -> TrellisResult<Selection> {
    let mut selection = Selection::all(desc.name.clone());

    for (field_name, raw) in filters {
        if raw.is_null() || raw.as_str().is_some_and(str::is_empty) {
            continue;
        }
        let field = desc
            .field(field_name)
            .ok_or_else(|| TrellisError::Validation {
                field: field_name.clone(),
                message: "unknown filter field".to_string(),
            })?;
        selection = selection.with_filter(field_name.clone(), coerce_for_write(field, raw));
    }

    if let Some(term) = search {
        if !term.is_empty() {
            let fields: Vec<String> = desc
                .searchable_fields()
                .map(|f| f.name.clone())
                .collect();
            // A table with no string fields simply ignores search.
            if !fields.is_empty() {
                selection = selection.with_search(term.to_string(), fields);
            }
        }
    }

    Ok(selection)
}

/// Builds the full bounded selection for a listing request.
pub fn build_selection(desc: &TableDescriptor, query: &RecordQuery) -> TrellisResult<Selection> {
    let mut selection = filter_selection(desc, &query.filters, query.search.as_deref())?;

    let requested = match (&query.sort_field, &query.sort_order) {
        (Some(field), Some(order)) => SortOrder::parse(order).map(|o| (field.clone(), o)),
        _ => None,
    };
    match requested {
        Some((field, order)) => {
            if !desc.has_field(&field) {
                return Err(TrellisError::Validation {
                    field,
                    message: "unknown sort field".to_string(),
                });
            }
            selection = selection.with_order(field, order);
        }
        None => {
            // Newest first, by contract.
            if let Some(pk) = desc.primary_key.clone() {
                selection = selection.with_order(pk, SortOrder::Desc);
            }
        }
    }

    Ok(selection.with_bounds(query.offset(), query.limit))
}
