//! redb table definitions for the lrpgrid state store.
//!
//! Record values and versions live in separate tables under the same
//! `&str` key and are always written in the same transaction.

use redb::TableDefinition;

/// Raw record bytes keyed by path.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Version of each record keyed by path.
pub const VERSIONS: TableDefinition<&str, u64> = TableDefinition::new("versions");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the last assigned modification index.
pub const MODIFIED_INDEX: &str = "modified_index";
