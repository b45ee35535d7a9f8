use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use kestrel_state::Storage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    consensus_message, discard_candidate, get_candidates, get_snapshot, get_snapshot_at_hash,
    get_status, get_verifiers, get_verifiers_at_hash, propose_candidate, AppState,
};

/// Create the HTTP router
pub fn create_router<S: Storage + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(get_status::<S>))
        .route("/bft/snapshot", get(get_snapshot::<S>))
        .route("/bft/snapshot/{hash}", get(get_snapshot_at_hash::<S>))
        .route("/bft/verifiers", get(get_verifiers::<S>))
        .route("/bft/verifiers/{hash}", get(get_verifiers_at_hash::<S>))
        .route(
            "/bft/candidates",
            get(get_candidates::<S>).post(propose_candidate::<S>),
        )
        .route("/bft/candidates/{address}", delete(discard_candidate::<S>))
        .route("/consensus/message", post(consensus_message::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
