//! Desired LRP snapshots.
//!
//! lrpgrid does not own desired state. It reads the instance count to bound
//! actual LRP indices and forwards the whole snapshot to the auctioneer when
//! it asks for a placement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when decoding or validating a desired LRP.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DesiredLrpError {
    #[error("JSON has missing/invalid field: {0}")]
    MissingField(&'static str),

    #[error("invalid desired lrp json: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub source_name: String,
}

/// Desired state of a long-running process.
///
/// `actions` are opaque to lrpgrid and kept as raw JSON so they reach the
/// auctioneer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrp {
    #[serde(default)]
    pub process_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub root_fs: String,
    #[serde(default)]
    pub instances: u32,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
    #[serde(default)]
    pub disk_mb: u64,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub cpu_weight: u32,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

impl DesiredLrp {
    /// Decode and validate a desired LRP payload.
    pub fn from_json(payload: &[u8]) -> Result<Self, DesiredLrpError> {
        let lrp: DesiredLrp = serde_json::from_slice(payload)
            .map_err(|e| DesiredLrpError::InvalidJson(e.to_string()))?;
        lrp.validate()?;
        Ok(lrp)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Check the fields every desired LRP must carry.
    pub fn validate(&self) -> Result<(), DesiredLrpError> {
        if self.domain.is_empty() {
            return Err(DesiredLrpError::MissingField("domain"));
        }
        // Process guids are path segments in the store's key layout.
        if self.process_guid.is_empty() || self.process_guid.contains('/') {
            return Err(DesiredLrpError::MissingField("process_guid"));
        }
        if self.stack.is_empty() {
            return Err(DesiredLrpError::MissingField("stack"));
        }
        if self.actions.is_empty() {
            return Err(DesiredLrpError::MissingField("actions"));
        }
        Ok(())
    }
}

/// A request for the auctioneer to place the given indices of a desired LRP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrpStartRequest {
    pub desired_lrp: DesiredLrp,
    pub indices: Vec<u32>,
}

impl LrpStartRequest {
    pub fn new(desired_lrp: DesiredLrp, indices: Vec<u32>) -> Self {
        Self {
            desired_lrp,
            indices,
        }
    }
}
