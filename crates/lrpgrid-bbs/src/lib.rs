//! lrpgrid-bbs — the actual LRP lifecycle engine.
//!
//! [`LrpBbs`] is the authoritative record of what is running where. Each
//! operation re-reads the record from the versioned store, checks the
//! requested transition against it, and writes back conditioned on the
//! version it read. Concurrent callers (API servers, cells, auctioneers)
//! never hold locks; a lost race is reported as
//! [`BbsError::ComparisonFailed`] and left to the caller.
//!
//! # Architecture
//!
//! ```text
//! LrpBbs
//!   ├── VersionedStore   (get / create / compare-and-swap / compare-and-delete)
//!   ├── ServiceRegistry  (auctioneer + cell addresses)
//!   ├── AuctioneerClient (fire-and-forget start auctions after create)
//!   ├── CellClient       (stop requests during retirement)
//!   └── Clock            (`since` timestamps)
//! ```

pub mod bbs;
pub mod client;
pub mod clock;
pub mod error;
pub mod http_client;
mod lifecycle;
mod occ;
mod retire;
#[cfg(test)]
mod testing;

pub use bbs::LrpBbs;
pub use client::{
    AuctioneerClient, CellClient, ClientError, ClientFuture, ServiceRegistry, StaticRegistry,
    StopLrpInstanceRequest,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BbsError, BbsResult};
pub use http_client::{HttpAuctioneerClient, HttpCellClient};
