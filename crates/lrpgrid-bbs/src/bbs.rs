//! The lifecycle engine handle and its read operations.
//!
//! Mutating operations live in `lifecycle` (create / claim / start /
//! remove) and `retire` (bulk retirement).

use std::sync::Arc;

use lrpgrid_core::config::DEFAULT_WORKER_POOL_SIZE;
use lrpgrid_core::ActualLrp;
use lrpgrid_state::schema::{actual_lrp_process_dir, actual_lrp_schema_path};
use lrpgrid_state::VersionedStore;

use crate::client::{AuctioneerClient, CellClient, ServiceRegistry};
use crate::clock::Clock;
use crate::error::BbsResult;

/// Authoritative record keeper for actual LRPs.
///
/// Cheap to clone; every collaborator sits behind an `Arc`. Nothing is
/// cached between calls: each operation reads the store afresh.
#[derive(Clone)]
pub struct LrpBbs {
    pub(crate) store: Arc<dyn VersionedStore>,
    pub(crate) auctioneer: Arc<dyn AuctioneerClient>,
    pub(crate) cells: Arc<dyn CellClient>,
    pub(crate) registry: Arc<dyn ServiceRegistry>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Concurrency ceiling for `retire_actual_lrps`.
    pub(crate) worker_pool_size: usize,
}

impl LrpBbs {
    pub fn new(
        store: Arc<dyn VersionedStore>,
        auctioneer: Arc<dyn AuctioneerClient>,
        cells: Arc<dyn CellClient>,
        registry: Arc<dyn ServiceRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            auctioneer,
            cells,
            registry,
            clock,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
        }
    }

    /// Override the retirement concurrency ceiling. Values below 1 are
    /// raised to 1.
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size
    }

    /// Read the actual LRP at `(process_guid, index)`.
    pub fn actual_lrp(&self, process_guid: &str, index: u32) -> BbsResult<ActualLrp> {
        let node = self
            .store
            .get(&actual_lrp_schema_path(process_guid, index))?;
        Ok(serde_json::from_slice(&node.value)?)
    }

    /// All actual LRPs of a process guid, ordered by store key.
    pub fn actual_lrps_by_process_guid(&self, process_guid: &str) -> BbsResult<Vec<ActualLrp>> {
        self.store
            .list(&actual_lrp_process_dir(process_guid))?
            .iter()
            .map(|node| serde_json::from_slice(&node.value).map_err(Into::into))
            .collect()
    }
}
