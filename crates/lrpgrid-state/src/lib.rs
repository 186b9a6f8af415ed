//! lrpgrid-state — versioned key-value store for lrpgrid.
//!
//! Every record carries a version (the store-wide modification index at
//! the time it was last written). Reads return it; conditional writes and
//! deletes require it, and are rejected if the record changed in between.
//! That check is the only concurrency control the lifecycle engine relies
//! on.
//!
//! [`StateStore`] implements [`VersionedStore`] on top of
//! [redb](https://docs.rs/redb), with an on-disk or in-memory backend.

pub mod error;
pub mod schema;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::{StateStore, StoreNode, VersionedStore};
