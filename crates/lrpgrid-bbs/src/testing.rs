//! Test doubles shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lrpgrid_core::{ActualLrpContainerKey, ActualLrpKey, LrpStartRequest};
use lrpgrid_state::StateStore;
use tokio::sync::Notify;

use crate::bbs::LrpBbs;
use crate::client::{
    AuctioneerClient, CellClient, ClientError, ClientFuture, ServiceRegistry, StaticRegistry,
};
use crate::clock::FixedClock;

pub(crate) const TEST_NOW: i64 = 1_700_000_000_000_000_000;
pub(crate) const AUCTIONEER_ADDRESS: &str = "auctioneer.test:9016";

pub(crate) fn test_bbs_with_store(
    store: StateStore,
    auctioneer: Arc<FakeAuctioneer>,
    cells: Arc<FakeCells>,
) -> LrpBbs {
    test_bbs(
        store,
        auctioneer,
        cells,
        Arc::new(StaticRegistry::new(
            Some(AUCTIONEER_ADDRESS.to_string()),
            Default::default(),
        )),
        Arc::new(FixedClock::new(TEST_NOW)),
    )
}

pub(crate) fn test_bbs(
    store: StateStore,
    auctioneer: Arc<FakeAuctioneer>,
    cells: Arc<FakeCells>,
    registry: Arc<dyn ServiceRegistry>,
    clock: Arc<FixedClock>,
) -> LrpBbs {
    LrpBbs::new(Arc::new(store), auctioneer, cells, registry, clock)
}

// ── Auctioneer ────────────────────────────────────────────────────

/// Records every auction request; optionally fails them all.
#[derive(Default)]
pub(crate) struct FakeAuctioneer {
    pub requests: Mutex<Vec<(String, Vec<LrpStartRequest>)>>,
    pub fail: bool,
    arrived: Notify,
}

impl FakeAuctioneer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Wait until at least `n` requests arrived (auctions are fire-and-forget).
    pub async fn wait_for_requests(&self, n: usize) {
        loop {
            if self.request_count() >= n {
                return;
            }
            tokio::time::timeout(Duration::from_secs(2), self.arrived.notified())
                .await
                .expect("auction request never arrived");
        }
    }
}

impl AuctioneerClient for FakeAuctioneer {
    fn request_lrp_auctions<'a>(
        &'a self,
        address: &'a str,
        starts: &'a [LrpStartRequest],
    ) -> ClientFuture<'a> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap()
                .push((address.to_string(), starts.to_vec()));
            self.arrived.notify_one();
            if self.fail {
                return Err(ClientError::Status {
                    uri: format!("http://{address}/v1/lrps/auctions"),
                    status: 500,
                });
            }
            Ok(())
        })
    }
}

// ── Cells ─────────────────────────────────────────────────────────

/// Records stop requests, tracks peak concurrency, and fails for
/// configured cells.
#[derive(Default)]
pub(crate) struct FakeCells {
    pub stops: Mutex<Vec<(ActualLrpKey, ActualLrpContainerKey)>>,
    pub failing_cells: HashSet<String>,
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakeCells {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing_for(cells: &[&str]) -> Self {
        Self {
            failing_cells: cells.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.lock().unwrap().len()
    }
}

impl CellClient for FakeCells {
    fn stop_lrp_instance<'a>(
        &'a self,
        key: &'a ActualLrpKey,
        container_key: &'a ActualLrpContainerKey,
    ) -> ClientFuture<'a> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.stops
                .lock()
                .unwrap()
                .push((key.clone(), container_key.clone()));
            if self.failing_cells.contains(&container_key.cell_id) {
                return Err(ClientError::Connect {
                    address: container_key.cell_id.clone(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(())
        })
    }
}
