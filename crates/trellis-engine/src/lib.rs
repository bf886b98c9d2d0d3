//! # trellis-engine
//!
//! The generic table engine.
//!
//! Everything here is metadata-driven: filtered/sorted/paginated CRUD
//! over any registered table, type-aware CSV import/export with
//! row-level error isolation, and cross-table order aggregation, all
//! without per-table code. Type decisions route through the schema
//! registry; store access goes through the `Store` seam.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod coerce;
pub mod csv;
pub mod lookups;
pub mod query;
pub mod records;
pub mod tracking;

use std::sync::Arc;

use trellis_schema::SchemaRegistry;
use trellis_store::Store;

pub use csv::{CsvPipeline, ImportOutcome, RowError};
pub use lookups::{LookupData, LookupService};
pub use query::{Pagination, RecordPage, RecordQuery};
pub use records::RecordService;
pub use tracking::{OrderTracker, OrderView, Suggestion, TrackOptions};

/// Top-level handle bundling the engine's services.
///
/// Cheap to clone; all services share the registry and store.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
}

impl Engine {
    /// Creates an engine over a registry and store.
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// The schema registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Single-record CRUD.
    #[must_use]
    pub fn records(&self) -> RecordService {
        RecordService::new(self.registry.clone(), self.store.clone())
    }

    /// CSV import/export.
    #[must_use]
    pub fn csv(&self) -> CsvPipeline {
        CsvPipeline::new(self.registry.clone(), self.store.clone())
    }

    /// Order aggregation.
    #[must_use]
    pub fn tracking(&self) -> OrderTracker {
        OrderTracker::new(self.registry.clone(), self.store.clone())
    }

    /// Lookup-table reads.
    #[must_use]
    pub fn lookups(&self) -> LookupService {
        LookupService::new(self.store.clone())
    }
}
