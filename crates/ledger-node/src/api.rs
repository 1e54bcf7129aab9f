//! HTTP surface for triggering mining and submitting transactions.

use crate::miner::Miner;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{balance::balance, constants::INITIAL_BALANCE, Block, Chain, LedgerError};
use ledger_core::{Transaction, TransactionPool, Wallet};
use ledger_p2p::{Broadcast, P2pServer};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub chain: Chain,
    pub pool: Arc<dyn TransactionPool>,
    pub wallet: Arc<Mutex<Wallet>>,
    pub p2p: Arc<P2pServer>,
    pub miner: Arc<Miner<P2pServer>>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct TransactRequest {
    pub recipient: String,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<LedgerError>() {
            Some(LedgerError::InsufficientBalance { .. }) => StatusCode::BAD_REQUEST,
            Some(LedgerError::MiningInterrupted) | Some(LedgerError::InvalidBlock(_)) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        anyhow::Error::from(err).into()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/blocks", get(blocks))
        .route("/mine", post(mine))
        .route("/transactions", get(transactions))
        .route("/transact", post(transact))
        .route("/public-key", get(public_key))
        .route("/balance", get(own_balance))
        .route("/balance/{address}", get(address_balance))
        .with_state(state)
}

pub async fn blocks(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.chain.blocks().to_vec())
}

pub async fn mine(State(state): State<AppState>) -> Result<Json<Block>, ApiError> {
    match state.miner.mine().await {
        Ok(block) => Ok(Json(block)),
        Err(e) => {
            warn!(error = %e, "mining failed");
            Err(e.into())
        }
    }
}

pub async fn transactions(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.pool.transactions())
}

pub async fn transact(
    State(state): State<AppState>,
    Json(req): Json<TransactRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let tx = {
        let mut wallet = state.wallet.lock().unwrap_or_else(PoisonError::into_inner);
        wallet.create_transaction(
            &req.recipient,
            req.amount,
            &state.chain.blocks(),
            state.pool.as_ref(),
        )?
    };
    state.p2p.broadcast_transaction(&tx);
    Ok(Json(tx))
}

pub async fn public_key(State(state): State<AppState>) -> Json<serde_json::Value> {
    let wallet = state.wallet.lock().unwrap_or_else(PoisonError::into_inner);
    Json(serde_json::json!({ "publicKey": wallet.public_key() }))
}

pub async fn own_balance(State(state): State<AppState>) -> Json<BalanceResponse> {
    let wallet = state.wallet.lock().unwrap_or_else(PoisonError::into_inner);
    Json(BalanceResponse {
        address: wallet.public_key().to_string(),
        balance: wallet.calculate_balance(&state.chain.blocks()),
    })
}

pub async fn address_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<BalanceResponse> {
    let balance = balance(&address, &state.chain.blocks(), INITIAL_BALANCE);
    Json(BalanceResponse { address, balance })
}
