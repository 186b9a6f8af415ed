//! Bulk retirement of actual LRPs.
//!
//! Unclaimed slots are removed from the store; anything a cell holds is
//! stopped through that cell. Work fans out over a fixed number of worker
//! slots that live only for the duration of one call.

use std::sync::Arc;

use lrpgrid_core::{ActualLrp, ActualLrpState};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, Instrument};

use crate::bbs::LrpBbs;
use crate::error::{BbsError, BbsResult};

impl LrpBbs {
    /// Retire every record in `lrps`, best effort.
    ///
    /// Failures are logged per record and never returned. The call returns
    /// once every dispatched retirement has finished or failed.
    pub async fn retire_actual_lrps(&self, lrps: Vec<ActualLrp>) {
        let span = info_span!("retire-actual-lrps", count = lrps.len());

        async move {
            let slots = Arc::new(Semaphore::new(self.worker_pool_size));
            let mut workers = JoinSet::new();

            for lrp in lrps {
                // Waits for a free slot, so at most `worker_pool_size`
                // retirements are in flight at once.
                let Ok(permit) = slots.clone().acquire_owned().await else {
                    break;
                };
                let bbs = self.clone();
                workers.spawn(
                    async move {
                        let _permit = permit;
                        if let Err(e) = bbs.retire_actual_lrp(&lrp).await {
                            error!(error = %e, lrp = ?lrp, "failed-to-retire");
                        }
                    }
                    .in_current_span(),
                );
            }

            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "retire worker aborted");
                }
            }
            info!("finished");
        }
        .instrument(span)
        .await
    }

    async fn retire_actual_lrp(&self, lrp: &ActualLrp) -> BbsResult<()> {
        if lrp.state == ActualLrpState::Unclaimed {
            return self.remove_actual_lrp(&lrp.key, &lrp.container_key);
        }

        debug!(
            process_guid = %lrp.key.process_guid,
            index = lrp.key.index,
            cell_id = %lrp.container_key.cell_id,
            "requesting stop"
        );
        self.cells
            .stop_lrp_instance(&lrp.key, &lrp.container_key)
            .await
            .map_err(BbsError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use lrpgrid_core::{ActualLrpContainerKey, ActualLrpKey, ActualLrpNetInfo};
    use lrpgrid_state::schema::actual_lrp_schema_path;
    use lrpgrid_state::{StateStore, VersionedStore};

    use super::*;
    use crate::testing::*;

    fn key(index: u32) -> ActualLrpKey {
        ActualLrpKey::new("some-guid", index, "some-domain")
    }

    fn unclaimed(index: u32) -> ActualLrp {
        ActualLrp::unclaimed(key(index), 1)
    }

    fn running_on(index: u32, cell: &str) -> ActualLrp {
        ActualLrp::running(
            key(index),
            ActualLrpContainerKey::new(format!("instance-{index}"), cell),
            ActualLrpNetInfo::new("10.0.0.1", vec![]),
            1,
        )
    }

    fn seed(store: &StateStore, lrps: &[ActualLrp]) {
        for lrp in lrps {
            store
                .create(
                    &actual_lrp_schema_path(&lrp.key.process_guid, lrp.key.index),
                    &serde_json::to_vec(lrp).unwrap(),
                )
                .unwrap();
        }
    }

    fn setup(cells: FakeCells) -> (LrpBbs, StateStore, Arc<FakeCells>) {
        let store = StateStore::open_in_memory().unwrap();
        let cells = Arc::new(cells);
        let bbs = test_bbs_with_store(
            store.clone(),
            Arc::new(FakeAuctioneer::default()),
            cells.clone(),
        );
        (bbs, store, cells)
    }

    #[tokio::test]
    async fn removes_unclaimed_and_stops_the_rest() {
        let (bbs, store, cells) = setup(FakeCells::default());
        let lrps = vec![
            unclaimed(0),
            running_on(1, "cell-a"),
            unclaimed(2),
            running_on(3, "cell-b"),
        ];
        seed(&store, &lrps);

        bbs.retire_actual_lrps(lrps).await;

        let remaining = bbs.actual_lrps_by_process_guid("some-guid").unwrap();
        let indices: Vec<u32> = remaining.iter().map(|l| l.key.index).collect();
        assert_eq!(indices, vec![1, 3]);

        let stops = cells.stops.lock().unwrap();
        assert_eq!(stops.len(), 2);
        let mut stopped: Vec<u32> = stops.iter().map(|(k, _)| k.index).collect();
        stopped.sort();
        assert_eq!(stopped, vec![1, 3]);
        assert!(stops.iter().any(|(_, c)| c.cell_id == "cell-a"));
        assert!(stops.iter().any(|(_, c)| c.cell_id == "cell-b"));
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let (bbs, store, cells) = setup(FakeCells::failing_for(&["cell-bad"]));
        let lrps = vec![
            running_on(0, "cell-bad"),
            running_on(1, "cell-good"),
            unclaimed(2),
        ];
        seed(&store, &lrps);
        // Index 3 was never stored; removing it fails with not-found.
        let mut batch = lrps.clone();
        batch.push(unclaimed(3));

        bbs.retire_actual_lrps(batch).await;

        assert_eq!(cells.stop_count(), 2);
        assert!(bbs.actual_lrp("some-guid", 2).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn empty_batch_returns_immediately() {
        let (bbs, _store, cells) = setup(FakeCells::default());
        bbs.retire_actual_lrps(Vec::new()).await;
        assert_eq!(cells.stop_count(), 0);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_worker_pool() {
        let (bbs, store, cells) = setup(FakeCells::with_delay(Duration::from_millis(20)));
        let bbs = bbs.with_worker_pool_size(3);
        let lrps: Vec<ActualLrp> = (0..12).map(|i| running_on(i, "cell-a")).collect();
        seed(&store, &lrps);

        bbs.retire_actual_lrps(lrps).await;

        assert_eq!(cells.stop_count(), 12);
        let peak = cells.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight stops was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn returns_only_after_slow_stops_complete() {
        let (bbs, store, cells) = setup(FakeCells::with_delay(Duration::from_millis(50)));
        let lrps: Vec<ActualLrp> = (0..5).map(|i| running_on(i, "cell-a")).collect();
        seed(&store, &lrps);

        bbs.retire_actual_lrps(lrps).await;

        assert_eq!(cells.stop_count(), 5);
    }

    #[tokio::test]
    async fn unclaimed_already_claimed_elsewhere_is_left_alone() {
        // The caller's snapshot says unclaimed, but a cell claimed it since.
        let (bbs, store, _cells) = setup(FakeCells::default());
        let stale = unclaimed(0);
        seed(&store, &[stale.clone()]);
        bbs.claim_actual_lrp(&key(0), &ActualLrpContainerKey::new("i", "cell-a"))
            .unwrap();

        bbs.retire_actual_lrps(vec![stale]).await;

        let lrp = bbs.actual_lrp("some-guid", 0).unwrap();
        assert_eq!(lrp.state, ActualLrpState::Claimed);
    }
}
