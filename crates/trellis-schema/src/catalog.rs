//! The built-in production catalog.
//!
//! Descriptors for the nine production-stage tables and the three
//! lookup tables, mirroring the plant's relational schema. The stage
//! tables are registered in process order; that order is what the
//! order aggregator fans out over.

use crate::field::{FieldDescriptor as F, LogicalType as T};
use crate::registry::SchemaRegistry;
use crate::table::{TableDescriptor, TableKind};

/// Builds the registry for the production schema.
#[must_use]
pub fn production_catalog() -> SchemaRegistry {
    let mut reg = SchemaRegistry::new();
    reg.register(cutting());
    reg.register(lamination());
    reg.register(printing());
    reg.register(warehouse_to_dispatch());
    reg.register(dispatch_to_production());
    reg.register(extruder());
    reg.register(raw_slitting());
    reg.register(pvc());
    reg.register(slitting());
    reg.register(ink());
    reg.register(solvent());
    reg.register(complex());
    reg
}

fn complex_slots() -> Vec<F> {
    (1..=6)
        .map(|i| F::nullable(format!("complex_{i}"), T::String).with_slot())
        .collect()
}

fn cutting() -> TableDescriptor {
    TableDescriptor::new(
        "cutting",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("batch_number", T::String),
            F::not_null("machine", T::String),
            F::not_null("customer_name", T::String),
            F::not_null("operator_name", T::String),
            F::nullable("zipper_number", T::String),
            F::nullable("slider_number", T::String),
            F::not_null("date", T::Date),
            F::nullable("speed", T::Float),
            F::nullable("uom", T::String),
            F::nullable("quantity", T::Float),
            F::nullable("waste", T::Float),
            F::nullable("notes", T::Text),
        ],
    )
    .with_primary_key("id")
}

fn lamination() -> TableDescriptor {
    let mut fields = vec![
        F::generated_id("id"),
        F::not_null("order_number", T::String),
        F::not_null("batch_number", T::String),
        F::not_null("machine", T::String),
        F::not_null("customer_name", T::String),
        F::not_null("operator_name", T::String),
        F::nullable("glue_number", T::String),
        F::nullable("hardner_number", T::String),
        F::not_null("date", T::Date),
    ];
    fields.extend(complex_slots());
    fields.extend([
        F::nullable("glue_speed", T::Float),
        F::nullable("machine_speed", T::Float),
        F::nullable("meters", T::Float),
        F::nullable("weight", T::Float),
        F::nullable("waste", T::Float),
        F::nullable("glue_weight", T::Float),
        F::nullable("hardner_weight", T::Float),
    ]);
    TableDescriptor::new("lamination", TableKind::Stage, fields)
        .with_primary_key("id")
        .with_complex_resolution()
}

fn printing() -> TableDescriptor {
    let mut fields = vec![
        F::generated_id("id"),
        F::not_null("order_number", T::String),
        F::not_null("batch_number", T::String),
        F::not_null("machine", T::String),
        F::not_null("customer_name", T::String),
        F::not_null("operator_name", T::String),
    ];
    fields.extend((1..=8).map(|i| {
        F::nullable(format!("ink_{i}"), T::String)
            .with_slot()
            .with_reference("ink", "code_number")
    }));
    fields.extend((1..=3).map(|i| {
        F::nullable(format!("solvent_{i}"), T::String)
            .with_slot()
            .with_reference("solvent", "code_number")
    }));
    fields.push(F::not_null("date", T::Date));
    fields.extend(complex_slots());
    fields.extend([
        F::nullable("speed", T::Float),
        F::nullable("width", T::Float),
        F::nullable("printed_meters", T::Float),
        F::nullable("weight", T::Float),
        F::nullable("waste", T::Float),
        F::nullable("number_of_colors", T::Integer),
        F::nullable("hours", T::Float),
        F::nullable("notes", T::Text),
    ]);
    TableDescriptor::new("printing", TableKind::Stage, fields)
        .with_primary_key("id")
        .with_complex_resolution()
}

fn warehouse_to_dispatch() -> TableDescriptor {
    TableDescriptor::new(
        "warehouse_to_dispatch",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("batch_number", T::String),
            F::not_null("supplier_name", T::String),
            F::not_null("item_description", T::String),
            F::not_null("name_received", T::String),
            F::not_null("quantity_requested", T::Float),
            F::not_null("quantity_sent", T::Float),
            F::nullable("notes", T::Text),
            F::not_null("date", T::Date),
        ],
    )
    .with_primary_key("id")
}

fn dispatch_to_production() -> TableDescriptor {
    TableDescriptor::new(
        "dispatch_to_production",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("date", T::Date),
            F::not_null("item_description", T::String),
            F::not_null("uom", T::String),
            F::not_null("quantity_requested", T::Float),
            F::not_null("quantity_sent", T::Float),
            F::not_null("batch_number", T::String),
            F::not_null("name_received", T::String),
            F::nullable("quantity_returned", T::Float),
        ],
    )
    .with_primary_key("id")
}

fn extruder() -> TableDescriptor {
    TableDescriptor::new(
        "extruder",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("date", T::Date),
            // Free-form in the plant's sheets ("2kg edge trim"), so a
            // string rather than a float.
            F::not_null("waste", T::String),
            F::not_null("operator", T::String),
            F::not_null("client", T::String),
            F::not_null("color", T::String),
            F::not_null("size", T::String),
            F::not_null("thickness", T::Float),
            F::not_null("item_description", T::String),
            F::not_null("meters", T::Float),
            F::not_null("weight", T::Float),
            F::nullable("ldpe_batch_number", T::String),
            F::nullable("enable_batch_number", T::String),
            F::nullable("exact_batch_number", T::String),
            F::nullable("white_batch_number", T::String),
        ],
    )
    .with_primary_key("id")
}

fn raw_slitting() -> TableDescriptor {
    let mut fields = vec![
        F::generated_id("id"),
        F::not_null("order_number", T::String),
        F::not_null("date", T::Date),
        F::not_null("batch_number", T::String),
        F::not_null("operator", T::String),
        F::not_null("client", T::String),
    ];
    fields.extend(complex_slots());
    fields.extend([
        F::not_null("supplier", T::String),
        F::not_null("roll_width", T::Float),
        F::not_null("meters", T::Float),
        F::not_null("weight", T::Float),
        F::not_null("size_after_slitting", T::Float),
        F::not_null("quantity", T::Integer),
        F::nullable("purpose", T::String),
        F::nullable("remaining_destination", T::String),
        F::nullable("waste", T::Float),
    ]);
    TableDescriptor::new("raw_slitting", TableKind::Stage, fields)
        .with_primary_key("id")
        .with_complex_resolution()
}

fn pvc() -> TableDescriptor {
    TableDescriptor::new(
        "pvc",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("batch_number", T::String),
            F::not_null("machine", T::String),
            F::not_null("customer_name", T::String),
            F::not_null("operator_name", T::String),
            F::nullable("glue_number", T::String),
            F::nullable("notes", T::Text),
            F::not_null("date", T::Date),
        ],
    )
    .with_primary_key("id")
}

fn slitting() -> TableDescriptor {
    TableDescriptor::new(
        "slitting",
        TableKind::Stage,
        vec![
            F::generated_id("id"),
            F::not_null("order_number", T::String),
            F::not_null("batch_number", T::String),
            F::not_null("machine", T::String),
            F::not_null("customer_name", T::String),
            F::not_null("operator_name", T::String),
            F::not_null("date", T::Date),
            F::nullable("barcode", T::String),
            F::nullable("production", T::Float),
            F::nullable("waste", T::Float),
            F::nullable("notes", T::Text),
        ],
    )
    .with_primary_key("id")
}

fn ink() -> TableDescriptor {
    TableDescriptor::new(
        "ink",
        TableKind::Lookup,
        vec![
            F::not_null("code_number", T::String),
            F::not_null("supplier", T::String),
            F::not_null("color", T::String),
            F::not_null("code", T::String),
            F::nullable("pal_number", T::String),
            F::nullable("batch_palet_number", T::String),
            F::not_null("date", T::Date),
            F::not_null("is_finished", T::Boolean),
        ],
    )
    .with_primary_key("code_number")
    .with_natural_key("code_number")
}

fn solvent() -> TableDescriptor {
    TableDescriptor::new(
        "solvent",
        TableKind::Lookup,
        vec![
            F::not_null("code_number", T::String),
            F::not_null("supplier", T::String),
            F::not_null("product", T::String),
            F::not_null("code", T::String),
            F::nullable("pal_number", T::String),
            F::nullable("batch_palet_number", T::String),
            F::not_null("date", T::Date),
            F::not_null("is_finished", T::Boolean),
        ],
    )
    .with_primary_key("code_number")
    .with_natural_key("code_number")
}

fn complex() -> TableDescriptor {
    TableDescriptor::new(
        "complex",
        TableKind::Lookup,
        vec![
            F::generated_id("id"),
            F::not_null("desc", T::String),
        ],
    )
    .with_primary_key("id")
}
