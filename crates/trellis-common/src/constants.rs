//! System-wide constants and limits.

/// Columns managed by the store, never supplied by callers.
///
/// These are excluded from CSV import validation and projected out of
/// CSV exports.
pub const SYSTEM_COLUMNS: &[&str] = &["id", "created_at", "updated_at"];

/// Default page size for record listings.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Maximum number of order suggestions returned by a single search.
pub const MAX_SUGGESTIONS: usize = 20;

/// Minimum length of an order suggestion query.
pub const MIN_SUGGESTION_QUERY_LEN: usize = 2;

/// Default per-stage timeout for order aggregation, in milliseconds.
pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 5_000;

/// Returns true if `column` is a store-managed system column.
#[must_use]
pub fn is_system_column(column: &str) -> bool {
    SYSTEM_COLUMNS.contains(&column)
}
