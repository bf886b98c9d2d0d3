//! # trellis-schema
//!
//! Schema registry and table descriptors for Trellis.
//!
//! Every type decision in the engine routes through the descriptors in
//! this crate. The registry is built once at startup (from the
//! built-in production catalog or caller-supplied descriptors) and is
//! read-only afterwards; nothing below it probes live store metadata.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod field;
pub mod registry;
pub mod table;

pub use catalog::production_catalog;
pub use field::{FieldDescriptor, ForeignKey, LogicalType};
pub use registry::{Role, SchemaRegistry, TableListing};
pub use table::{TableDescriptor, TableKind};
