//! Read / decide / conditional-write against the versioned store.
//!
//! Every mutating lifecycle operation goes through [`LrpBbs::compare_and_set`]:
//! it reads the record and its version, hands the record to the
//! operation's decision function, and applies the decision conditioned on
//! the version it read. Conflicts are reported, never retried.

use lrpgrid_core::{ActualLrp, ActualLrpKey};
use lrpgrid_state::schema::actual_lrp_schema_path;
use lrpgrid_state::StoreError;
use tracing::debug;

use crate::bbs::LrpBbs;
use crate::error::{BbsError, BbsResult};

/// What an operation wants done with the record it was shown.
pub(crate) enum Decision {
    /// The record already matches the request.
    Keep,
    /// Nothing is stored at the key; create this record.
    Create(ActualLrp),
    /// Replace the stored record.
    Swap(ActualLrp),
    /// Delete the stored record.
    Delete,
    /// Refuse the request without touching the store.
    Reject(BbsError),
}

/// Whether the store was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Unchanged,
    Written,
}

impl LrpBbs {
    pub(crate) fn compare_and_set<F>(&self, key: &ActualLrpKey, decide: F) -> BbsResult<Outcome>
    where
        F: FnOnce(Option<&ActualLrp>) -> Decision,
    {
        let path = actual_lrp_schema_path(&key.process_guid, key.index);

        let current = match self.store.get(&path) {
            Ok(node) => Some((serde_json::from_slice::<ActualLrp>(&node.value)?, node.index)),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let decision = decide(current.as_ref().map(|(lrp, _)| lrp));

        match (decision, current) {
            (Decision::Keep, _) => Ok(Outcome::Unchanged),
            (Decision::Reject(e), _) => Err(e),
            (Decision::Create(lrp), _) => {
                let value = serde_json::to_vec(&lrp)?;
                let index = self.store.create(&path, &value)?;
                debug!(%path, index, state = %lrp.state, "actual lrp created");
                Ok(Outcome::Written)
            }
            (Decision::Swap(lrp), Some((_, index))) => {
                let value = serde_json::to_vec(&lrp)?;
                let next = self
                    .store
                    .compare_and_swap(&path, index, &value)
                    .map_err(|e| lost_race(&path, e))?;
                debug!(%path, from = index, to = next, state = %lrp.state, "actual lrp swapped");
                Ok(Outcome::Written)
            }
            (Decision::Delete, Some((_, index))) => {
                self.store
                    .compare_and_delete(&path, index)
                    .map_err(|e| lost_race(&path, e))?;
                debug!(%path, index, "actual lrp deleted");
                Ok(Outcome::Written)
            }
            // Nothing was read, so there is nothing to condition on.
            (Decision::Swap(_) | Decision::Delete, None) => {
                Err(BbsError::Store(StoreError::NotFound(path)))
            }
        }
    }
}

/// A conditional write that finds the record changed or gone lost a race.
fn lost_race(path: &str, e: StoreError) -> BbsError {
    match e {
        StoreError::VersionMismatch { .. } | StoreError::NotFound(_) => {
            BbsError::ComparisonFailed(path.to_string())
        }
        other => BbsError::Store(other),
    }
}
