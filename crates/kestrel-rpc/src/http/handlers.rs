use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use kestrel_core::{Address, Hash};
use kestrel_server::{Server, Snapshot};
use kestrel_state::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RpcError;

/// Application state shared with handlers
pub struct AppState<S: Storage> {
    pub server: Arc<Server<S>>,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub chain_id: u64,
    pub height: u64,
    pub head_block_hash: Option<String>,
    pub address: String,
    pub is_verifier: bool,
    pub verifier_count: usize,
    pub consensus_running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub address: String,
    pub authorize: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
}

// Request types

#[derive(Debug, Default, Deserialize)]
pub struct HeightQuery {
    pub height: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub address: String,
    pub authorize: bool,
}

/// Consensus payload pushed by a peer's transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Hex-encoded message bytes
    pub payload: String,
    #[serde(default)]
    pub sender: Option<Address>,
}

fn parse_hash(s: &str) -> Result<Hash, RpcError> {
    Hash::from_hex(s).map_err(|e| RpcError::BadRequest(format!("Invalid block hash: {}", e)))
}

fn parse_address(s: &str) -> Result<Address, RpcError> {
    Address::from_hex(s).map_err(|e| RpcError::BadRequest(format!("Invalid address: {}", e)))
}

/// GET /status
pub async fn get_status<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StatusResponse>, RpcError> {
    let server = &state.server;
    let (chain_id, height, head_block_hash) = {
        let chain = server.chain().read();
        let head = chain
            .head()
            .ok_or_else(|| RpcError::Internal("Chain has no genesis".to_string()))?;
        (head.header.chain_id, head.height(), Some(head.hash().to_hex()))
    };

    let verifiers = server.get_verifiers(None)?;
    Ok(Json(StatusResponse {
        chain_id,
        height,
        head_block_hash,
        address: server.address().to_string(),
        is_verifier: verifiers.contains(&server.address()),
        verifier_count: verifiers.len(),
        consensus_running: server.is_running(),
    }))
}

/// GET /bft/snapshot?height=
pub async fn get_snapshot<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<HeightQuery>,
) -> Result<Json<Snapshot>, RpcError> {
    Ok(Json(state.server.get_snapshot(query.height)?))
}

/// GET /bft/snapshot/{hash}
pub async fn get_snapshot_at_hash<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(hash): Path<String>,
) -> Result<Json<Snapshot>, RpcError> {
    let hash = parse_hash(&hash)?;
    Ok(Json(state.server.get_snapshot_at_hash(&hash)?))
}

/// GET /bft/verifiers?height=
pub async fn get_verifiers<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<HeightQuery>,
) -> Result<Json<Vec<Address>>, RpcError> {
    Ok(Json(state.server.get_verifiers(query.height)?))
}

/// GET /bft/verifiers/{hash}
pub async fn get_verifiers_at_hash<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(hash): Path<String>,
) -> Result<Json<Vec<Address>>, RpcError> {
    let hash = parse_hash(&hash)?;
    Ok(Json(state.server.get_verifiers_at_hash(&hash)?))
}

/// GET /bft/candidates
pub async fn get_candidates<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<BTreeMap<Address, bool>> {
    Json(state.server.candidates())
}

/// POST /bft/candidates
pub async fn propose_candidate<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<ProposeRequest>,
) -> Result<Json<CandidateResponse>, RpcError> {
    let address = parse_address(&request.address)?;
    state.server.propose(address, request.authorize);
    info!(
        "Staged {} vote for {}",
        if request.authorize { "authorize" } else { "drop" },
        address
    );

    Ok(Json(CandidateResponse {
        address: address.to_string(),
        authorize: request.authorize,
    }))
}

/// DELETE /bft/candidates/{address}
pub async fn discard_candidate<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(address): Path<String>,
) -> Result<Json<BTreeMap<Address, bool>>, RpcError> {
    let address = parse_address(&address)?;
    if !state.server.discard(&address) {
        return Err(RpcError::NotFound(format!("No staged vote for {}", address)));
    }
    Ok(Json(state.server.candidates()))
}

/// POST /consensus/message
pub async fn consensus_message<S: Storage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, RpcError> {
    let payload = hex::decode(request.payload.trim_start_matches("0x"))
        .map_err(|e| RpcError::BadRequest(format!("Invalid payload: {}", e)))?;

    if let Some(sender) = request.sender {
        debug!("Consensus message of {} bytes from {}", payload.len(), sender);
    }
    state.server.handle_message(payload)?;

    Ok(Json(MessageResponse {
        status: "accepted".to_string(),
    }))
}
