//! Actual LRP records and their lifecycle rules.
//!
//! An actual LRP is one indexed instance slot of a desired LRP. Its
//! record moves `UNCLAIMED -> CLAIMED -> RUNNING`, or straight to
//! `RUNNING` when a cell reports an instance nobody recorded a claim for.
//! Every field is serialized with the snake_case names the store schema
//! uses (`process_guid`, `instance_guid`, `cell_id`, `state`, `since`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::desired::PortMapping;

// ── Keys ──────────────────────────────────────────────────────────

/// Identifies one instance slot of a desired LRP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActualLrpKey {
    pub process_guid: String,
    pub index: u32,
    pub domain: String,
}

impl ActualLrpKey {
    pub fn new(process_guid: impl Into<String>, index: u32, domain: impl Into<String>) -> Self {
        Self {
            process_guid: process_guid.into(),
            index,
            domain: domain.into(),
        }
    }
}

impl fmt::Display for ActualLrpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process_guid, self.index)
    }
}

/// Physical placement of an instance. Empty until a cell claims it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActualLrpContainerKey {
    #[serde(default)]
    pub instance_guid: String,
    #[serde(default)]
    pub cell_id: String,
}

impl ActualLrpContainerKey {
    pub fn new(instance_guid: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self {
            instance_guid: instance_guid.into(),
            cell_id: cell_id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instance_guid.is_empty() && self.cell_id.is_empty()
    }
}

/// Reachable endpoint of a running instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpNetInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

impl ActualLrpNetInfo {
    pub fn new(address: impl Into<String>, ports: Vec<PortMapping>) -> Self {
        Self {
            address: address.into(),
            ports,
        }
    }

    /// The net info a claimed (not yet running) instance carries.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ── Record ────────────────────────────────────────────────────────

/// Lifecycle state of an actual LRP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActualLrpState {
    Unclaimed,
    Claimed,
    Running,
}

impl fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unclaimed => "UNCLAIMED",
            Self::Claimed => "CLAIMED",
            Self::Running => "RUNNING",
        };
        f.write_str(s)
    }
}

/// The stored record for one instance slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrp {
    #[serde(flatten)]
    pub key: ActualLrpKey,
    #[serde(flatten)]
    pub container_key: ActualLrpContainerKey,
    #[serde(flatten)]
    pub net_info: ActualLrpNetInfo,
    pub state: ActualLrpState,
    /// Nanoseconds since the unix epoch of the last accepted transition.
    pub since: i64,
}

impl ActualLrp {
    /// A freshly materialized slot, not yet placed on any cell.
    pub fn unclaimed(key: ActualLrpKey, since: i64) -> Self {
        Self {
            key,
            container_key: ActualLrpContainerKey::default(),
            net_info: ActualLrpNetInfo::empty(),
            state: ActualLrpState::Unclaimed,
            since,
        }
    }

    /// A record created directly in `RUNNING` for an instance a cell
    /// reported before any claim was stored.
    pub fn running(
        key: ActualLrpKey,
        container_key: ActualLrpContainerKey,
        net_info: ActualLrpNetInfo,
        since: i64,
    ) -> Self {
        Self {
            key,
            container_key,
            net_info,
            state: ActualLrpState::Running,
            since,
        }
    }

    /// Whether this record is already exactly the claim being requested.
    pub fn is_claimed_by(&self, key: &ActualLrpKey, container_key: &ActualLrpContainerKey) -> bool {
        self.state == ActualLrpState::Claimed
            && self.key == *key
            && self.container_key == *container_key
    }

    /// Whether this record is already exactly the start being requested.
    /// Ports are compared in order.
    pub fn is_running_as(
        &self,
        key: &ActualLrpKey,
        container_key: &ActualLrpContainerKey,
        net_info: &ActualLrpNetInfo,
    ) -> bool {
        self.state == ActualLrpState::Running
            && self.key == *key
            && self.container_key == *container_key
            && self.net_info.address == net_info.address
            && self.net_info.ports == net_info.ports
    }

    /// Transition legality, evaluated against the record as last read.
    ///
    /// Idempotent re-delivery is checked by the caller before this.
    /// - `CLAIMED` is reachable only from `UNCLAIMED`. A claimed or running
    ///   instance cannot be re-claimed, not even by a different container.
    /// - `RUNNING` is reachable from `UNCLAIMED`, from `CLAIMED` by the
    ///   container that holds the claim, and from `RUNNING` by the same
    ///   container (net info refresh).
    /// - Nothing transitions back to `UNCLAIMED`; slots are removed instead.
    pub fn allows_transition_to(
        &self,
        key: &ActualLrpKey,
        container_key: &ActualLrpContainerKey,
        target: ActualLrpState,
    ) -> bool {
        if self.key != *key {
            return false;
        }

        match (self.state, target) {
            (ActualLrpState::Unclaimed, ActualLrpState::Claimed) => true,
            (ActualLrpState::Unclaimed, ActualLrpState::Running) => true,
            (ActualLrpState::Claimed, ActualLrpState::Running)
            | (ActualLrpState::Running, ActualLrpState::Running) => {
                self.container_key == *container_key
            }
            _ => false,
        }
    }
}
