//! # trellis-store
//!
//! The store seam for Trellis.
//!
//! The engine talks to the relational store exclusively through the
//! [`Store`] trait defined here. The crate also ships [`MemoryStore`],
//! an in-memory implementation that enforces primary keys, unique
//! constraints, and foreign keys, and reports constraint failures with
//! driver-style message text so the engine's error-diagnosis path is
//! exercised the same way it would be against a production driver.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod memory;
pub mod selection;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use selection::{Filter, SearchClause, Selection, SortOrder};
pub use store::{JobTransaction, Store};
