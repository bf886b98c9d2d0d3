//! Table descriptors.
//!
//! A `TableDescriptor` is the static description of one relational
//! table: its ordered field list, primary key, and the metadata that
//! drives listing, import pre-processing, and aggregation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use trellis_common::is_system_column;

use crate::field::FieldDescriptor;

/// What kind of table this is, from the engine's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// A production-stage table queried by the order aggregator.
    Stage,
    /// A denormalized reference table (ink, solvent, complex).
    Lookup,
}

/// Static schema description of one relational table.
///
/// Immutable after registry load. Field lookup is O(1) via an index
/// built at construction time.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    /// Table name (store-level, snake_case).
    pub name: String,
    /// Human-readable name for UI listings.
    pub display_name: String,
    /// Ordered field list.
    pub fields: Vec<FieldDescriptor>,
    /// Primary-key field name, if the table has one.
    pub primary_key: Option<String>,
    /// Table kind.
    pub kind: TableKind,
    /// Declared natural key, used as the fallback field when a
    /// duplicate-key diagnosis cannot name the column.
    pub natural_key: Option<String>,
    /// Whether CSV import resolves numeric `complex_N` slot values to
    /// their descriptions via the complex lookup table.
    pub resolve_complex_slots: bool,
    /// Name index for O(1) field lookup.
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TableDescriptor {
    /// Creates a descriptor with fields and no primary key.
    pub fn new(name: impl Into<String>, kind: TableKind, fields: Vec<FieldDescriptor>) -> Self {
        let name = name.into();
        let display_name = display_name_for(&name);
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            name,
            display_name,
            fields,
            primary_key: None,
            kind,
            natural_key: None,
            resolve_complex_slots: false,
            index,
        }
    }

    /// Sets the primary-key field.
    #[must_use]
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Sets the declared natural key.
    #[must_use]
    pub fn with_natural_key(mut self, field: impl Into<String>) -> Self {
        self.natural_key = Some(field.into());
        self
    }

    /// Enables complex-slot resolution during CSV import.
    #[must_use]
    pub fn with_complex_resolution(mut self) -> Self {
        self.resolve_complex_slots = true;
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns true if the table declares the named field.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the primary-key field descriptor, if any.
    #[must_use]
    pub fn primary_key_field(&self) -> Option<&FieldDescriptor> {
        self.primary_key.as_deref().and_then(|pk| self.field(pk))
    }

    /// Returns true if the primary key is store-generated.
    #[must_use]
    pub fn primary_key_generated(&self) -> bool {
        self.primary_key_field().is_some_and(|f| f.generated)
    }

    /// Field names a CSV import must carry in its header: every
    /// non-generated, non-system column.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !f.generated && !is_system_column(&f.name))
            .map(|f| f.name.as_str())
    }

    /// Fields free-text search runs over.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.logical_type.is_searchable())
    }

    /// Columns included in CSV export: everything except the generated
    /// key and the store timestamps.
    pub fn export_columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !is_system_column(&f.name))
            .map(|f| f.name.as_str())
    }
}

/// Derives a display name from a snake_case table name:
/// `warehouse_to_dispatch` becomes `Warehouse To Dispatch`.
fn display_name_for(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::LogicalType;

    fn test_table() -> TableDescriptor {
        TableDescriptor::new(
            "cutting",
            TableKind::Stage,
            vec![
                FieldDescriptor::generated_id("id"),
                FieldDescriptor::not_null("order_number", LogicalType::String),
                FieldDescriptor::nullable("speed", LogicalType::Float),
                FieldDescriptor::nullable("notes", LogicalType::Text),
            ],
        )
        .with_primary_key("id")
    }

    #[test]
    fn test_field_lookup() {
        let table = test_table();
        assert!(table.has_field("order_number"));
        assert!(!table.has_field("Order_Number"));
        assert_eq!(
            table.field("speed").unwrap().logical_type,
            LogicalType::Float
        );
    }

    #[test]
    fn test_primary_key() {
        let table = test_table();
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert!(table.primary_key_generated());
    }

    #[test]
    fn test_required_columns_skip_generated() {
        let table = test_table();
        let required: Vec<_> = table.required_columns().collect();
        assert_eq!(required, vec!["order_number", "speed", "notes"]);
    }

    #[test]
    fn test_searchable_fields() {
        let table = test_table();
        let names: Vec<_> = table.searchable_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["order_number", "notes"]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name_for("warehouse_to_dispatch"), "Warehouse To Dispatch");
        assert_eq!(display_name_for("pvc"), "Pvc");
    }
}
