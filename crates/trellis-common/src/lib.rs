//! # trellis-common
//!
//! Common types, errors, and constants for Trellis.
//!
//! This crate provides the foundational pieces used across all Trellis
//! components:
//!
//! - **Value**: the runtime scalar type every record cell carries
//! - **Errors**: the unified error taxonomy with `TrellisError`
//! - **Constants**: system column names and engine-wide defaults

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod value;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{TrellisError, TrellisResult};
pub use value::{Record, Value};
