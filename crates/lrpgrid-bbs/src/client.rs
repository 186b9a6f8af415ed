//! Collaborator contracts: auctioneer, cells, and address lookup.
//!
//! The engine only talks to these through the traits below, so tests can
//! swap in recording fakes. [`crate::http_client`] has the HTTP adapters the
//! daemon wires in.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use lrpgrid_core::{ActualLrpContainerKey, ActualLrpKey, GridConfig, LrpStartRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from auctioneer, cell, and registry calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no auctioneer address registered")]
    NoAuctioneer,

    #[error("no address registered for cell {0}")]
    UnknownCell(String),

    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("request to {uri} failed: {reason}")]
    Request { uri: String, reason: String },

    #[error("{uri} responded with status {status}")]
    Status { uri: String, status: u16 },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Boxed future returned by client calls.
pub type ClientFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;

/// Asks the auctioneer to place instances.
pub trait AuctioneerClient: Send + Sync {
    fn request_lrp_auctions<'a>(
        &'a self,
        address: &'a str,
        starts: &'a [LrpStartRequest],
    ) -> ClientFuture<'a>;
}

/// Asks the cell that owns an instance to stop it.
pub trait CellClient: Send + Sync {
    fn stop_lrp_instance<'a>(
        &'a self,
        key: &'a ActualLrpKey,
        container_key: &'a ActualLrpContainerKey,
    ) -> ClientFuture<'a>;
}

/// Service discovery for the auctioneer and cells.
pub trait ServiceRegistry: Send + Sync {
    /// Address of a running auctioneer, or an error if none is registered.
    fn auctioneer_address(&self) -> Result<String, ClientError>;

    fn cell_address(&self, cell_id: &str) -> Result<String, ClientError>;
}

/// Body of a cell stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopLrpInstanceRequest {
    pub actual_lrp_key: ActualLrpKey,
    pub actual_lrp_container_key: ActualLrpContainerKey,
}

/// Registry with fixed addresses, typically loaded from `lrpgrid.toml`.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    auctioneer: Option<String>,
    cells: HashMap<String, String>,
}

impl StaticRegistry {
    pub fn new(auctioneer: Option<String>, cells: HashMap<String, String>) -> Self {
        Self { auctioneer, cells }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(
            config.auctioneer_address().map(str::to_string),
            config.cell_addresses(),
        )
    }
}

impl ServiceRegistry for StaticRegistry {
    fn auctioneer_address(&self) -> Result<String, ClientError> {
        self.auctioneer.clone().ok_or(ClientError::NoAuctioneer)
    }

    fn cell_address(&self, cell_id: &str) -> Result<String, ClientError> {
        self.cells
            .get(cell_id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownCell(cell_id.to_string()))
    }
}
