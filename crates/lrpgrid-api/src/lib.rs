//! lrpgrid-api — REST API for the actual LRP lifecycle engine.
//!
//! Thin axum layer over [`LrpBbs`]: every route decodes a JSON body, runs
//! one engine operation, and wraps the result in the `{success, data,
//! error}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/v1/actual_lrps` | Create an unclaimed slot and request its auction |
//! | POST | `/v1/actual_lrps/claim` | A cell claims a slot |
//! | POST | `/v1/actual_lrps/start` | A cell reports a slot running |
//! | POST | `/v1/actual_lrps/remove` | Remove a slot owned by a container |
//! | POST | `/v1/actual_lrps/retire` | Retire a batch of records |
//! | GET | `/v1/actual_lrps/{process_guid}` | List a process's slots |
//! | GET | `/v1/actual_lrps/{process_guid}/{index}` | Get one slot |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use lrpgrid_bbs::LrpBbs;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub bbs: LrpBbs,
}

/// Build the API router.
pub fn build_router(bbs: LrpBbs) -> Router {
    let api_state = ApiState { bbs };

    let lrp_routes = Router::new()
        .route("/actual_lrps", post(handlers::create_actual_lrp))
        .route("/actual_lrps/claim", post(handlers::claim_actual_lrp))
        .route("/actual_lrps/start", post(handlers::start_actual_lrp))
        .route("/actual_lrps/remove", post(handlers::remove_actual_lrp))
        .route("/actual_lrps/retire", post(handlers::retire_actual_lrps))
        .route("/actual_lrps/{process_guid}", get(handlers::list_actual_lrps))
        .route("/actual_lrps/{process_guid}/{index}", get(handlers::get_actual_lrp))
        .with_state(api_state);

    Router::new().nest("/v1", lrp_routes)
}
