//! The schema registry.
//!
//! An immutable arena of table descriptors indexed by name. Built once
//! at startup and safe for unsynchronized concurrent reads; no
//! component re-queries store metadata per request.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use trellis_common::{TrellisError, TrellisResult};

use crate::table::{TableDescriptor, TableKind};

/// The caller's verified role, issued by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access, including lookup tables.
    Admin,
    /// Production operators; lookup tables are hidden.
    Operator,
}

/// One entry in a table listing.
#[derive(Debug, Clone, Serialize)]
pub struct TableListing {
    /// Store-level table name.
    pub name: String,
    /// Human-readable name.
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Immutable catalog of known tables.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Descriptors by name.
    tables: HashMap<String, Arc<TableDescriptor>>,
    /// Registration order, preserved for listings and stage fan-out.
    order: Vec<String>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Last registration wins on name collision.
    pub fn register(&mut self, table: TableDescriptor) {
        let name = table.name.clone();
        if self.tables.insert(name.clone(), Arc::new(table)).is_none() {
            self.order.push(name);
        }
    }

    /// Looks up a table descriptor. Case-sensitive, O(1).
    pub fn describe(&self, table: &str) -> TrellisResult<Arc<TableDescriptor>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| TrellisError::UnknownTable {
                table: table.to_string(),
            })
    }

    /// Returns true if the named table is registered.
    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Returns true if `role` may operate on `table`.
    ///
    /// Operators are gated out of lookup tables entirely, matching
    /// what they see in the listing.
    #[must_use]
    pub fn visible(&self, table: &TableDescriptor, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Operator => table.kind != TableKind::Lookup,
        }
    }

    /// Lists tables visible to `role`, in registration order.
    #[must_use]
    pub fn list(&self, role: Role) -> Vec<TableListing> {
        self.order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .filter(|t| self.visible(t, role))
            .map(|t| TableListing {
                name: t.name.clone(),
                display_name: t.display_name.clone(),
            })
            .collect()
    }

    /// Returns the production-stage tables in registration order.
    ///
    /// This is the fixed set the order aggregator fans out over.
    #[must_use]
    pub fn stage_tables(&self) -> Vec<Arc<TableDescriptor>> {
        self.order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .filter(|t| t.kind == TableKind::Stage)
            .cloned()
            .collect()
    }

    /// Returns the number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no tables are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
