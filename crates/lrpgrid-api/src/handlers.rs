//! REST API handlers.
//!
//! Each handler runs one `LrpBbs` operation and maps its error onto an
//! HTTP status.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lrpgrid_bbs::BbsError;
use lrpgrid_core::{ActualLrp, ActualLrpContainerKey, ActualLrpKey, ActualLrpNetInfo, DesiredLrp};
use serde::Deserialize;
use tracing::warn;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// HTTP status for an engine error.
pub fn status_for(err: &BbsError) -> StatusCode {
    match err {
        BbsError::IndexTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BbsError::CannotBeClaimed { .. } | BbsError::CannotBeStarted { .. } => {
            StatusCode::CONFLICT
        }
        BbsError::ComparisonFailed(_) => StatusCode::PRECONDITION_FAILED,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn bbs_error(err: BbsError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    error_response(&err.to_string(), status)
}

/// Process guids become store path segments, so they may not contain `/`.
fn check_key(key: &ActualLrpKey) -> Result<(), Response> {
    if key.process_guid.is_empty() || key.process_guid.contains('/') {
        return Err(error_response(
            "JSON has missing/invalid field: process_guid",
            StatusCode::BAD_REQUEST,
        ));
    }
    Ok(())
}

// ── Request bodies ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateActualLrpRequest {
    pub desired_lrp: DesiredLrp,
    pub index: u32,
}

#[derive(Deserialize)]
pub struct ClaimActualLrpRequest {
    pub actual_lrp_key: ActualLrpKey,
    pub actual_lrp_container_key: ActualLrpContainerKey,
}

#[derive(Deserialize)]
pub struct StartActualLrpRequest {
    pub actual_lrp_key: ActualLrpKey,
    pub actual_lrp_container_key: ActualLrpContainerKey,
    pub actual_lrp_net_info: ActualLrpNetInfo,
}

#[derive(Deserialize)]
pub struct RemoveActualLrpRequest {
    pub actual_lrp_key: ActualLrpKey,
    pub actual_lrp_container_key: ActualLrpContainerKey,
}

// ── Lifecycle ──────────────────────────────────────────────────

/// POST /v1/actual_lrps
pub async fn create_actual_lrp(
    State(state): State<ApiState>,
    Json(req): Json<CreateActualLrpRequest>,
) -> Response {
    if let Err(e) = req.desired_lrp.validate() {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST);
    }

    match state.bbs.create_actual_lrp(&req.desired_lrp, req.index).await {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok("created")).into_response(),
        Err(e) => bbs_error(e),
    }
}

/// POST /v1/actual_lrps/claim
pub async fn claim_actual_lrp(
    State(state): State<ApiState>,
    Json(req): Json<ClaimActualLrpRequest>,
) -> Response {
    if let Err(resp) = check_key(&req.actual_lrp_key) {
        return resp;
    }
    match state
        .bbs
        .claim_actual_lrp(&req.actual_lrp_key, &req.actual_lrp_container_key)
    {
        Ok(()) => ApiResponse::ok("claimed").into_response(),
        Err(e) => bbs_error(e),
    }
}

/// POST /v1/actual_lrps/start
pub async fn start_actual_lrp(
    State(state): State<ApiState>,
    Json(req): Json<StartActualLrpRequest>,
) -> Response {
    if let Err(resp) = check_key(&req.actual_lrp_key) {
        return resp;
    }
    match state.bbs.start_actual_lrp(
        &req.actual_lrp_key,
        &req.actual_lrp_container_key,
        &req.actual_lrp_net_info,
    ) {
        Ok(()) => ApiResponse::ok("started").into_response(),
        Err(e) => bbs_error(e),
    }
}

/// POST /v1/actual_lrps/remove
pub async fn remove_actual_lrp(
    State(state): State<ApiState>,
    Json(req): Json<RemoveActualLrpRequest>,
) -> Response {
    if let Err(resp) = check_key(&req.actual_lrp_key) {
        return resp;
    }
    match state
        .bbs
        .remove_actual_lrp(&req.actual_lrp_key, &req.actual_lrp_container_key)
    {
        Ok(()) => ApiResponse::ok("removed").into_response(),
        Err(e) => bbs_error(e),
    }
}

/// POST /v1/actual_lrps/retire
///
/// Always succeeds once the batch has been processed; per-record failures
/// are only logged.
pub async fn retire_actual_lrps(
    State(state): State<ApiState>,
    Json(lrps): Json<Vec<ActualLrp>>,
) -> Response {
    if let Some(resp) = lrps.iter().find_map(|lrp| check_key(&lrp.key).err()) {
        return resp;
    }
    let count = lrps.len();
    state.bbs.retire_actual_lrps(lrps).await;
    ApiResponse::ok(serde_json::json!({ "retired": count })).into_response()
}

// ── Reads ──────────────────────────────────────────────────────

/// GET /v1/actual_lrps/{process_guid}
pub async fn list_actual_lrps(
    State(state): State<ApiState>,
    Path(process_guid): Path<String>,
) -> Response {
    match state.bbs.actual_lrps_by_process_guid(&process_guid) {
        Ok(lrps) => ApiResponse::ok(lrps).into_response(),
        Err(e) => bbs_error(e),
    }
}

/// GET /v1/actual_lrps/{process_guid}/{index}
pub async fn get_actual_lrp(
    State(state): State<ApiState>,
    Path((process_guid, index)): Path<(String, u32)>,
) -> Response {
    match state.bbs.actual_lrp(&process_guid, index) {
        Ok(lrp) => ApiResponse::ok(lrp).into_response(),
        Err(e) if e.is_not_found() => {
            error_response("actual lrp not found", StatusCode::NOT_FOUND)
        }
        Err(e) => bbs_error(e),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use lrpgrid_bbs::{
        AuctioneerClient, CellClient, ClientFuture, FixedClock, LrpBbs, StaticRegistry,
    };
    use lrpgrid_core::LrpStartRequest;
    use lrpgrid_state::{StateStore, StoreError};

    use super::*;

    struct NoopClients;

    impl AuctioneerClient for NoopClients {
        fn request_lrp_auctions<'a>(
            &'a self,
            _address: &'a str,
            _starts: &'a [LrpStartRequest],
        ) -> ClientFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    impl CellClient for NoopClients {
        fn stop_lrp_instance<'a>(
            &'a self,
            _key: &'a ActualLrpKey,
            _container_key: &'a ActualLrpContainerKey,
        ) -> ClientFuture<'a> {
            Box::pin(async { Ok(()) })
        }
    }

    fn test_state() -> ApiState {
        let clients = Arc::new(NoopClients);
        let bbs = LrpBbs::new(
            Arc::new(StateStore::open_in_memory().unwrap()),
            clients.clone(),
            clients,
            Arc::new(StaticRegistry::new(None, HashMap::new())),
            Arc::new(FixedClock::new(1)),
        );
        ApiState { bbs }
    }

    fn desired(instances: u32) -> DesiredLrp {
        DesiredLrp {
            process_guid: "web".to_string(),
            domain: "apps".to_string(),
            stack: "some-stack".to_string(),
            instances,
            actions: vec![serde_json::json!({"run": {"path": "/bin/web"}})],
            ..Default::default()
        }
    }

    fn key(index: u32) -> ActualLrpKey {
        ActualLrpKey::new("web", index, "apps")
    }

    #[test]
    fn status_mapping() {
        let k = key(0);
        assert_eq!(
            status_for(&BbsError::IndexTooLarge { index: 3, instances: 2 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&BbsError::CannotBeClaimed { key: k.clone() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&BbsError::CannotBeStarted { key: k }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&BbsError::ComparisonFailed("/v1/actual/web/0".into())),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_for(&BbsError::Store(StoreError::NotFound("/v1/actual/web/0".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&BbsError::Store(StoreError::AlreadyExists("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn create_then_get() {
        let state = test_state();
        let req = CreateActualLrpRequest {
            desired_lrp: desired(2),
            index: 1,
        };

        let resp = create_actual_lrp(State(state.clone()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_actual_lrp(State(state), Path(("web".to_string(), 1))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_rejects_invalid_desired_lrp() {
        let state = test_state();
        let mut desired = desired(2);
        desired.domain.clear();
        let req = CreateActualLrpRequest {
            desired_lrp: desired,
            index: 0,
        };

        let resp = create_actual_lrp(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_with_index_too_large_is_unprocessable() {
        let state = test_state();
        let req = CreateActualLrpRequest {
            desired_lrp: desired(2),
            index: 2,
        };

        let resp = create_actual_lrp(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn claim_missing_record_is_conflict() {
        let state = test_state();
        let req = ClaimActualLrpRequest {
            actual_lrp_key: key(0),
            actual_lrp_container_key: ActualLrpContainerKey::new("i", "cell-a"),
        };

        let resp = claim_actual_lrp(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn remove_by_other_owner_is_precondition_failed() {
        let state = test_state();
        state
            .bbs
            .start_actual_lrp(
                &key(0),
                &ActualLrpContainerKey::new("i", "cell-a"),
                &ActualLrpNetInfo::new("10.0.0.1", vec![]),
            )
            .unwrap();

        let req = RemoveActualLrpRequest {
            actual_lrp_key: key(0),
            actual_lrp_container_key: ActualLrpContainerKey::new("other", "cell-b"),
        };
        let resp = remove_actual_lrp(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn claim_with_slash_in_process_guid_is_bad_request() {
        let state = test_state();
        let req = ClaimActualLrpRequest {
            actual_lrp_key: ActualLrpKey::new("web/0", 0, "apps"),
            actual_lrp_container_key: ActualLrpContainerKey::new("i", "cell-a"),
        };

        let resp = claim_actual_lrp(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let state = test_state();
        let resp = get_actual_lrp(State(state), Path(("nope".to_string(), 0))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_empty_process() {
        let state = test_state();
        let resp = list_actual_lrps(State(state), Path("nope".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retire_empty_batch() {
        let state = test_state();
        let resp = retire_actual_lrps(State(state), Json(Vec::new())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
