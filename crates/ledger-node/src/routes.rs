use crate::constants::{BLOCKS_PER_BATCH, MAX_BLOCKS_PER_REQUEST};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_core::pow::CancelToken;
use ledger_core::{Block, ChainError, MiningError, PendingRound, Transaction};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        let status = match &err {
            ChainError::InvalidTransaction(_) | ChainError::EmptyRewardAddress => {
                StatusCode::BAD_REQUEST
            }
            ChainError::Mining(MiningError::Aborted) | ChainError::RejectedBlock(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub(crate) struct Health {
    status: &'static str,
}

#[derive(Serialize)]
pub(crate) struct Head {
    height: u64,
    hash: Option<String>,
    pending: usize,
}

#[derive(Serialize)]
pub(crate) struct BlockView {
    index: u64,
    previous_hash: Option<String>,
    timestamp: u64,
    nonce: u64,
    hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    transactions: Vec<Transaction>,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            previous_hash: block.previous_hash().map(ledger_core::to_hex),
            timestamp: block.timestamp(),
            nonce: block.nonce(),
            hash: block.hash_hex(),
            data: block.data().map(str::to_string),
            transactions: block.transactions().to_vec(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct BlockRange {
    #[serde(default)]
    from: usize,
    limit: Option<usize>,
}

#[derive(Serialize)]
pub(crate) struct Validity {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct MineIn {
    reward_address: String,
}

pub(crate) async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub(crate) async fn head(State(state): State<AppState>) -> Json<Head> {
    let chain = state.chain.read();
    Json(Head {
        height: chain.height(),
        hash: chain.last_block().hash_hex(),
        pending: chain.pending().len(),
    })
}

pub(crate) async fn blocks(
    State(state): State<AppState>,
    Query(range): Query<BlockRange>,
) -> Json<Vec<BlockView>> {
    let limit = range
        .limit
        .unwrap_or(BLOCKS_PER_BATCH)
        .min(MAX_BLOCKS_PER_REQUEST);
    let chain = state.chain.read();
    Json(
        chain
            .blocks()
            .iter()
            .skip(range.from)
            .take(limit)
            .map(BlockView::from)
            .collect(),
    )
}

pub(crate) async fn validate(State(state): State<AppState>) -> Json<Validity> {
    let result = state.chain.validate_chain();
    if let Err(e) = &result {
        warn!(error = %e, "chain failed validation");
    }
    Json(Validity {
        valid: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    })
}

pub(crate) async fn submit_tx(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    state.chain.append_transaction(tx.clone())?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true, "tx": tx })),
    ))
}

pub(crate) async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineIn>,
) -> Result<Json<BlockView>, ApiError> {
    let round = {
        let mut slot = state.round.lock();
        if slot.is_some() {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "a mining round is already in progress",
            ));
        }
        let round = state.chain.start_round(&req.reward_address)?;
        *slot = Some(round.cancel_token());
        round
    };

    // The slot is released by the blocking task itself, so a client that
    // disconnects mid-search cannot leave it held.
    let slot = Arc::clone(&state.round);
    let block = tokio::task::spawn_blocking(move || finish_and_release(round, &slot))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    Ok(Json(BlockView::from(&block)))
}

fn finish_and_release(
    round: PendingRound,
    slot: &Mutex<Option<CancelToken>>,
) -> Result<Block, ChainError> {
    let result = round.finish();
    slot.lock().take();
    result
}

pub(crate) async fn cancel_mining(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cancelled = match state.round.lock().as_ref() {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    };
    if cancelled {
        info!("mining round cancel requested");
    }
    Json(serde_json::json!({ "cancelled": cancelled }))
}
