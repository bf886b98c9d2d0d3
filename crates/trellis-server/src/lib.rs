//! # trellis-server
//!
//! HTTP server for the trellis table engine.
//!
//! This crate provides:
//!
//! - **REST API**: table metadata, record CRUD, CSV import/export,
//!   order tracking, and form lookups, all routed through the generic
//!   engine.
//!
//! - **Configuration**: TOML file plus command-line overrides.
//!
//! The `trellisd` binary wires a schema registry and store into the
//! engine and serves the API with graceful shutdown.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// HTTP routes and handlers.
pub mod api;

/// Server configuration.
pub mod config;

pub use api::{router, AppState};
pub use config::ServerConfig;
