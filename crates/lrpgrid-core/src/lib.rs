//! lrpgrid-core — shared domain types for lrpgrid.
//!
//! - [`actual`] — actual LRP keys, records, and the transition rules
//! - [`desired`] — desired LRP snapshots and auction start requests
//! - [`config`] — `lrpgrid.toml` parsing

pub mod actual;
pub mod config;
pub mod desired;

pub use actual::*;
pub use config::{ConfigError, GridConfig};
pub use desired::*;
