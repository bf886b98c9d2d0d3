//! Store-level error types.
//!
//! Constraint violations carry the driver's message text verbatim; the
//! engine parses field and value out of it (with a structured `fields`
//! hint when the driver supplies one, as real drivers sometimes do).

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The named table does not exist in the store.
    #[error("table '{0}' not found in store")]
    TableNotFound(String),

    /// A unique constraint was violated.
    ///
    /// `message` is the driver text (MySQL form:
    /// `Duplicate entry 'v' for key 't.f'`); `fields` lists the
    /// violated constraint's columns when the driver knows them, and
    /// may be empty.
    #[error("{message}")]
    UniqueViolation {
        /// Driver message text.
        message: String,
        /// Columns in the violated unique constraint, if known.
        fields: Vec<String>,
    },

    /// A foreign-key constraint was violated.
    #[error("{message}")]
    ForeignKeyViolation {
        /// Driver message text (contains the ``FOREIGN KEY (`f`)``
        /// fragment the engine parses).
        message: String,
    },

    /// The store connection itself failed.
    #[error("store connection error: {0}")]
    Connection(String),
}
