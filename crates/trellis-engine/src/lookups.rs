//! Form lookup data.
//!
//! One call loads everything the entry forms need to populate their
//! dropdowns: unfinished inks and solvents keyed by code, and the
//! complex list. The three reads run concurrently.

use std::sync::Arc;

use futures::future::try_join3;
use serde::Serialize;
use tracing::debug;

use trellis_common::{Record, TrellisError, TrellisResult, Value};
use trellis_store::{Selection, SortOrder, Store, StoreError};

/// Dropdown data for the entry forms.
#[derive(Debug, Serialize)]
pub struct LookupData {
    /// Unfinished inks: `code_number`, `color`, `supplier`.
    pub inks: Vec<Record>,
    /// Unfinished solvents: `code_number`, `product`, `supplier`.
    pub solvents: Vec<Record>,
    /// Complexes: `id`, `desc`.
    pub complexes: Vec<Record>,
}

/// Loads lookup-table data for the entry forms.
#[derive(Clone)]
pub struct LookupService {
    store: Arc<dyn Store>,
}

impl LookupService {
    /// Creates a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetches all three lookup lists concurrently.
    pub async fn load(&self) -> TrellisResult<LookupData> {
        let inks = Selection::all("ink")
            .with_filter("is_finished", Value::Bool(false))
            .with_order("color", SortOrder::Asc)
            .with_projection(columns(&["code_number", "color", "supplier"]));
        let solvents = Selection::all("solvent")
            .with_filter("is_finished", Value::Bool(false))
            .with_order("product", SortOrder::Asc)
            .with_projection(columns(&["code_number", "product", "supplier"]));
        let complexes = Selection::all("complex")
            .with_order("desc", SortOrder::Asc)
            .with_projection(columns(&["id", "desc"]));

        let (inks, solvents, complexes) = try_join3(
            self.store.select(&inks),
            self.store.select(&solvents),
            self.store.select(&complexes),
        )
        .await
        .map_err(store_error)?;

        debug!(
            inks = inks.len(),
            solvents = solvents.len(),
            complexes = complexes.len(),
            "lookups loaded"
        );
        Ok(LookupData {
            inks,
            solvents,
            complexes,
        })
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

fn store_error(e: StoreError) -> TrellisError {
    TrellisError::Store {
        message: e.to_string(),
    }
}
