//! StateStore — redb-backed versioned key-value store.
//!
//! Every mutation runs in a single redb write transaction that checks the
//! record's current version, bumps the store-wide modification index, and
//! writes value and version together. redb serializes write transactions,
//! so check and write cannot interleave with another writer.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// A record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNode {
    pub key: String,
    pub value: Vec<u8>,
    /// Version token to pass back to conditional writes.
    pub index: u64,
}

/// The versioned get / create / compare-and-swap / compare-and-delete
/// contract the lifecycle engine is written against.
pub trait VersionedStore: Send + Sync {
    /// Read a record. Missing keys are [`StoreError::NotFound`].
    fn get(&self, key: &str) -> StoreResult<StoreNode>;

    /// Create a record that must not exist yet. Returns its version.
    fn create(&self, key: &str, value: &[u8]) -> StoreResult<u64>;

    /// Replace a record only if its version is still `index`.
    /// Returns the new version.
    fn compare_and_swap(&self, key: &str, index: u64, value: &[u8]) -> StoreResult<u64>;

    /// Delete a record only if its version is still `index`.
    fn compare_and_delete(&self, key: &str, index: u64) -> StoreResult<()>;

    /// All records whose key starts with `prefix`, in key order.
    fn list(&self, prefix: &str) -> StoreResult<Vec<StoreNode>>;
}

/// Thread-safe versioned store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(VERSIONS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

/// Assign the next store-wide modification index.
fn bump_index(meta: &mut Table<'_, &'static str, u64>) -> StoreResult<u64> {
    let current = meta
        .get(MODIFIED_INDEX)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    meta.insert(MODIFIED_INDEX, next).map_err(map_err!(Write))?;
    Ok(next)
}

/// Check that `key` exists at version `expected`.
fn check_version(
    versions: &Table<'_, &'static str, u64>,
    key: &str,
    expected: u64,
) -> StoreResult<()> {
    let actual = versions
        .get(key)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
    if actual != expected {
        return Err(StoreError::VersionMismatch {
            key: key.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

impl VersionedStore for StateStore {
    fn get(&self, key: &str) -> StoreResult<StoreNode> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
        let versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;

        let value = nodes
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec());
        let index = versions
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value());

        match (value, index) {
            (Some(value), Some(index)) => Ok(StoreNode {
                key: key.to_string(),
                value,
                index,
            }),
            _ => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn create(&self, key: &str, value: &[u8]) -> StoreResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let index;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;

            if versions.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }

            index = bump_index(&mut meta)?;
            nodes.insert(key, value).map_err(map_err!(Write))?;
            versions.insert(key, index).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, index, "record created");
        Ok(index)
    }

    fn compare_and_swap(&self, key: &str, index: u64, value: &[u8]) -> StoreResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let next;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;

            check_version(&versions, key, index)?;

            next = bump_index(&mut meta)?;
            nodes.insert(key, value).map_err(map_err!(Write))?;
            versions.insert(key, next).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, from = index, to = next, "record swapped");
        Ok(next)
    }

    fn compare_and_delete(&self, key: &str, index: u64) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
            let mut versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;

            check_version(&versions, key, index)?;

            // Deletes advance the index too, so a re-created key never
            // reuses a version a stale reader may still hold.
            bump_index(&mut meta)?;
            nodes.remove(key).map_err(map_err!(Write))?;
            versions.remove(key).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, index, "record deleted");
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<StoreNode>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
        let versions = txn.open_table(VERSIONS).map_err(map_err!(Table))?;

        // Keys sharing a prefix are contiguous; stop at the first one past it.
        let mut results = Vec::new();
        for entry in nodes.range::<&str>(prefix..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            let index = versions
                .get(key)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .ok_or_else(|| StoreError::Read(format!("missing version for {key}")))?;
            results.push(StoreNode {
                key: key.to_string(),
                value: value.value().to_vec(),
                index,
            });
        }
        Ok(results)
    }
}
