//! Field descriptors.
//!
//! A `FieldDescriptor` carries everything the coercion engine and the
//! UI need to know about one column: its logical type, nullability,
//! whether the store generates it, whether it belongs to a multi-valued
//! slot family, and an optional foreign-key reference.

use serde::{Deserialize, Serialize};

/// Logical column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// Short string.
    String,
    /// Long-form text.
    Text,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
}

impl LogicalType {
    /// Returns true for the types free-text search runs over.
    #[must_use]
    pub const fn is_searchable(self) -> bool {
        matches!(self, Self::String | Self::Text)
    }

    /// Returns true for integer and float columns.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Returns true for date columns.
    #[must_use]
    pub const fn is_date(self) -> bool {
        matches!(self, Self::Date)
    }
}

/// A foreign-key reference to another table's column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,
    /// Referenced column name.
    pub field: String,
}

/// Descriptor for one column of a table.
///
/// Immutable after registry load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Logical type.
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the store generates the value (auto-increment keys).
    pub generated: bool,
    /// Whether this field belongs to a multi-valued slot family
    /// (`complex_N`, `ink_N`, `solvent_N`). Slot values of zero or
    /// blank mean "not used" and coerce to NULL.
    pub slot: bool,
    /// Foreign-key reference, if any.
    pub reference: Option<ForeignKey>,
}

impl FieldDescriptor {
    /// Creates a non-nullable field.
    pub fn not_null(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: false,
            generated: false,
            slot: false,
            reference: None,
        }
    }

    /// Creates a nullable field.
    pub fn nullable(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            nullable: true,
            ..Self::not_null(name, logical_type)
        }
    }

    /// Creates a store-generated integer primary-key field.
    pub fn generated_id(name: impl Into<String>) -> Self {
        Self {
            generated: true,
            ..Self::not_null(name, LogicalType::Integer)
        }
    }

    /// Marks this field as a slot-family member.
    #[must_use]
    pub fn with_slot(mut self) -> Self {
        self.slot = true;
        self
    }

    /// Adds a foreign-key reference.
    #[must_use]
    pub fn with_reference(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.reference = Some(ForeignKey {
            table: table.into(),
            field: field.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_types() {
        assert!(LogicalType::String.is_searchable());
        assert!(LogicalType::Text.is_searchable());
        assert!(!LogicalType::Integer.is_searchable());
        assert!(!LogicalType::Date.is_searchable());
    }

    #[test]
    fn test_field_builders() {
        let f = FieldDescriptor::nullable("ink_1", LogicalType::String)
            .with_slot()
            .with_reference("ink", "code_number");
        assert!(f.nullable);
        assert!(f.slot);
        assert_eq!(f.reference.as_ref().unwrap().table, "ink");

        let id = FieldDescriptor::generated_id("id");
        assert!(id.generated);
        assert_eq!(id.logical_type, LogicalType::Integer);
    }

    #[test]
    fn test_serialized_type_tag() {
        let f = FieldDescriptor::not_null("machine", LogicalType::String);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["nullable"], false);
    }
}
