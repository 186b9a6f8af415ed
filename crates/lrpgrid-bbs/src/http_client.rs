//! HTTP adapters for the auctioneer and cell contracts.
//!
//! Each call opens a fresh HTTP/1 connection with hyper and is bounded by
//! the client's timeout. Any non-2xx response is an error.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::Method;
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use lrpgrid_core::{ActualLrpContainerKey, ActualLrpKey, LrpStartRequest};
use tracing::debug;

use crate::client::{
    AuctioneerClient, CellClient, ClientError, ClientFuture, ServiceRegistry,
    StopLrpInstanceRequest,
};

const AUCTIONS_PATH: &str = "/v1/lrps/auctions";
const STOP_PATH: &str = "/v1/lrps/stop";

/// Posts start auctions to the auctioneer.
#[derive(Debug, Clone)]
pub struct HttpAuctioneerClient {
    timeout: Duration,
}

impl HttpAuctioneerClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl AuctioneerClient for HttpAuctioneerClient {
    fn request_lrp_auctions<'a>(
        &'a self,
        address: &'a str,
        starts: &'a [LrpStartRequest],
    ) -> ClientFuture<'a> {
        Box::pin(async move {
            let body =
                serde_json::to_vec(starts).map_err(|e| ClientError::Encode(e.to_string()))?;
            post_json(address, AUCTIONS_PATH, body, self.timeout).await
        })
    }
}

/// Posts stop requests to the cell that owns an instance.
#[derive(Clone)]
pub struct HttpCellClient {
    registry: Arc<dyn ServiceRegistry>,
    timeout: Duration,
}

impl HttpCellClient {
    pub fn new(registry: Arc<dyn ServiceRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }
}

impl CellClient for HttpCellClient {
    fn stop_lrp_instance<'a>(
        &'a self,
        key: &'a ActualLrpKey,
        container_key: &'a ActualLrpContainerKey,
    ) -> ClientFuture<'a> {
        Box::pin(async move {
            let address = self.registry.cell_address(&container_key.cell_id)?;
            let request = StopLrpInstanceRequest {
                actual_lrp_key: key.clone(),
                actual_lrp_container_key: container_key.clone(),
            };
            let body =
                serde_json::to_vec(&request).map_err(|e| ClientError::Encode(e.to_string()))?;
            post_json(&address, STOP_PATH, body, self.timeout).await
        })
    }
}

/// POST a JSON body to `http://{address}{path}`.
async fn post_json(
    address: &str,
    path: &str,
    body: Vec<u8>,
    timeout: Duration,
) -> Result<(), ClientError> {
    let uri = format!("http://{address}{path}");
    let body = Bytes::from(body);

    let exchange = async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| ClientError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClientError::Request {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, address)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "lrpgrid-bbs/0.1")
            .body(Full::new(body.clone()))
            .map_err(|e| ClientError::Encode(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ClientError::Request {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            debug!(%uri, status = %resp.status(), "request succeeded");
            Ok(())
        } else {
            Err(ClientError::Status {
                uri: uri.clone(),
                status: resp.status().as_u16(),
            })
        }
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(uri.clone())),
    }
}
