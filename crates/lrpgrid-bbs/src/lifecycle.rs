//! Create / claim / start / remove.
//!
//! Each operation logs under its own span and reports `starting`,
//! `succeeded`, or the reason it failed.

use lrpgrid_core::{
    ActualLrp, ActualLrpContainerKey, ActualLrpKey, ActualLrpNetInfo, ActualLrpState, DesiredLrp,
    LrpStartRequest,
};
use lrpgrid_state::schema::actual_lrp_schema_path;
use tracing::{error, info, info_span, Instrument};

use crate::bbs::LrpBbs;
use crate::error::{BbsError, BbsResult};
use crate::occ::{Decision, Outcome};

impl LrpBbs {
    /// Materialize slot `index` of `desired` as an `UNCLAIMED` record and
    /// ask the auctioneer to place it.
    ///
    /// The auction request runs in the background; its failure is logged
    /// and does not fail the call, since the record already exists and a
    /// later reconciliation pass can ask again.
    pub async fn create_actual_lrp(&self, desired: &DesiredLrp, index: u32) -> BbsResult<()> {
        let span = info_span!(
            "create-actual-lrp",
            process_guid = %desired.process_guid,
            index,
        );

        span.in_scope(|| self.create_unclaimed_actual_lrp(desired, index))?;

        let start = LrpStartRequest::new(desired.clone(), vec![index]);
        self.spawn_auction_request(vec![start], span);
        Ok(())
    }

    fn create_unclaimed_actual_lrp(&self, desired: &DesiredLrp, index: u32) -> BbsResult<()> {
        if index >= desired.instances {
            let err = BbsError::IndexTooLarge {
                index,
                instances: desired.instances,
            };
            error!(
                error = %err,
                actual_index = index,
                desired_instances = desired.instances,
                "actual-lrp-index-too-large"
            );
            return Err(err);
        }

        let path = actual_lrp_schema_path(&desired.process_guid, index);
        let key = ActualLrpKey::new(&desired.process_guid, index, &desired.domain);
        let lrp = ActualLrp::unclaimed(key, self.clock.now());

        // No read first: any existing record, decodable or not, is a conflict.
        let created = serde_json::to_vec(&lrp)
            .map_err(BbsError::from)
            .and_then(|value| self.store.create(&path, &value).map_err(BbsError::from));
        let version = created.inspect_err(|e| error!(error = %e, "failed-to-create-actual-lrp"))?;
        info!(%path, version, "succeeded");
        Ok(())
    }

    fn spawn_auction_request(&self, starts: Vec<LrpStartRequest>, span: tracing::Span) {
        let auctioneer = self.auctioneer.clone();
        let registry = self.registry.clone();

        tokio::spawn(
            async move {
                let address = match registry.auctioneer_address() {
                    Ok(address) => address,
                    Err(e) => {
                        error!(error = %e, "failed-to-resolve-auctioneer");
                        return;
                    }
                };
                if let Err(e) = auctioneer.request_lrp_auctions(&address, &starts).await {
                    error!(error = %e, %address, lrp_starts = ?starts, "failed-to-request-start-auctions");
                }
            }
            .instrument(span),
        );
    }

    /// Record that the container `container_key` claimed `key`.
    pub fn claim_actual_lrp(
        &self,
        key: &ActualLrpKey,
        container_key: &ActualLrpContainerKey,
    ) -> BbsResult<()> {
        let span = info_span!(
            "claim-actual-lrp",
            process_guid = %key.process_guid,
            index = key.index,
            cell_id = %container_key.cell_id,
            instance_guid = %container_key.instance_guid,
        );
        let _enter = span.enter();
        info!("starting");

        let since = self.clock.now();
        let result = self.compare_and_set(key, |current| match current {
            None => {
                error!("failed-actual-lrp-not-found");
                Decision::Reject(BbsError::CannotBeClaimed { key: key.clone() })
            }
            Some(lrp) if lrp.is_claimed_by(key, container_key) => Decision::Keep,
            Some(lrp) if lrp.allows_transition_to(key, container_key, ActualLrpState::Claimed) => {
                let mut next = lrp.clone();
                next.state = ActualLrpState::Claimed;
                next.container_key = container_key.clone();
                next.net_info = ActualLrpNetInfo::empty();
                next.since = since;
                Decision::Swap(next)
            }
            Some(lrp) => {
                error!(current_state = %lrp.state, "failed-to-transition-actual-lrp-to-claimed");
                Decision::Reject(BbsError::CannotBeClaimed { key: key.clone() })
            }
        });

        log_outcome(&result);
        result.map(|_| ())
    }

    /// Record that the container `container_key` is running `key` at
    /// `net_info`. Creates the record directly in `RUNNING` if none exists.
    pub fn start_actual_lrp(
        &self,
        key: &ActualLrpKey,
        container_key: &ActualLrpContainerKey,
        net_info: &ActualLrpNetInfo,
    ) -> BbsResult<()> {
        let span = info_span!(
            "start-actual-lrp",
            process_guid = %key.process_guid,
            index = key.index,
            cell_id = %container_key.cell_id,
            instance_guid = %container_key.instance_guid,
        );
        let _enter = span.enter();
        info!("starting");

        let since = self.clock.now();
        let result = self.compare_and_set(key, |current| match current {
            None => Decision::Create(ActualLrp::running(
                key.clone(),
                container_key.clone(),
                net_info.clone(),
                since,
            )),
            Some(lrp) if lrp.is_running_as(key, container_key, net_info) => Decision::Keep,
            Some(lrp) if lrp.allows_transition_to(key, container_key, ActualLrpState::Running) => {
                let mut next = lrp.clone();
                next.state = ActualLrpState::Running;
                next.container_key = container_key.clone();
                next.net_info = net_info.clone();
                next.since = since;
                Decision::Swap(next)
            }
            Some(lrp) => {
                error!(current_state = %lrp.state, "failed-to-transition-actual-lrp-to-started");
                Decision::Reject(BbsError::CannotBeStarted { key: key.clone() })
            }
        });

        log_outcome(&result);
        result.map(|_| ())
    }

    /// Delete `key`, provided it is still owned by `container_key`.
    pub fn remove_actual_lrp(
        &self,
        key: &ActualLrpKey,
        container_key: &ActualLrpContainerKey,
    ) -> BbsResult<()> {
        let span = info_span!(
            "remove-actual-lrp",
            process_guid = %key.process_guid,
            index = key.index,
            cell_id = %container_key.cell_id,
            instance_guid = %container_key.instance_guid,
        );
        let _enter = span.enter();
        info!("starting");

        let result = self.compare_and_set(key, |current| match current {
            // Surfaces the store's not-found.
            None => Decision::Delete,
            Some(lrp) if lrp.key == *key && lrp.container_key == *container_key => {
                Decision::Delete
            }
            Some(lrp) => {
                error!(existing_actual_lrp = ?lrp, "failed-to-match-existing-actual-lrp");
                Decision::Reject(BbsError::ComparisonFailed(format!(
                    "actual lrp {key} is not owned by {}/{}",
                    container_key.cell_id, container_key.instance_guid
                )))
            }
        });

        log_outcome(&result);
        result.map(|_| ())
    }
}

fn log_outcome(result: &BbsResult<Outcome>) {
    match result {
        Ok(Outcome::Unchanged) => info!(noop = true, "succeeded"),
        Ok(Outcome::Written) => info!("succeeded"),
        Err(e) => error!(error = %e, "failed"),
    }
}
