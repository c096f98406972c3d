//! HTTP ingress API.
//!
//! The request/response surface consumed by wallet CLIs, miners, and
//! explorers. Validation failures surface the verbatim rule message as
//! `400 {"error": …}`; reads of unknown heights or ids return 404; the
//! candidate endpoint reports assembly failures as 500.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};

use cobble_core::types::{Block, Transaction};

use crate::node::Node;

/// Build the API router over a shared node handle.
pub fn router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/config", get(get_config))
        .route("/chain", get(get_chain))
        .route("/tip", get(get_tip))
        .route("/block/candidate/{addr}", get(get_candidate))
        .route("/block/{height}", get(get_block))
        .route("/mempool", get(get_mempool))
        .route("/utxos/{addr}", get(get_utxos))
        .route("/tx/{id}", get(get_tx))
        .route("/transactions", post(post_transaction))
        .route("/blocks", post(post_block))
        .layer(cors)
        .with_state(node)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// ── Reads ────────────────────────────────────────────────────────────────────

async fn get_config(State(node): State<Arc<Node>>) -> Json<cobble_core::params::ChainParams> {
    Json(node.chain_params())
}

async fn get_chain(State(node): State<Arc<Node>>) -> Json<Vec<Block>> {
    Json(node.chain())
}

async fn get_tip(State(node): State<Arc<Node>>) -> Json<Option<Block>> {
    Json(node.tip())
}

async fn get_block(State(node): State<Arc<Node>>, Path(height): Path<u64>) -> Response {
    match node.block_at(height) {
        Some(block) => Json(block).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "block height out of range"),
    }
}

async fn get_mempool(State(node): State<Arc<Node>>) -> Json<Vec<Transaction>> {
    Json(node.mempool_transactions())
}

/// One spendable output in the `/utxos/{addr}` listing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UtxoJson {
    txid: String,
    index: u32,
    amount: u64,
    block_height: u64,
    is_coinbase: bool,
}

async fn get_utxos(State(node): State<Arc<Node>>, Path(addr): Path<String>) -> Json<Value> {
    let utxos: Vec<UtxoJson> = node
        .utxos_for_address(&addr)
        .into_iter()
        .map(|(outpoint, entry)| UtxoJson {
            txid: outpoint.txid,
            index: outpoint.index,
            amount: entry.amount,
            block_height: entry.block_height,
            is_coinbase: entry.is_coinbase,
        })
        .collect();
    Json(json!({ "utxos": utxos }))
}

async fn get_tx(State(node): State<Arc<Node>>, Path(id): Path<String>) -> Response {
    match node.find_tx(&id) {
        Some((tx, block_height)) => {
            Json(json!({ "tx": tx, "blockHeight": block_height })).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "transaction not found"),
    }
}

// ── Submissions ──────────────────────────────────────────────────────────────

async fn post_transaction(
    State(node): State<Arc<Node>>,
    Json(tx): Json<Transaction>,
) -> Response {
    match node.submit_transaction(tx, None) {
        Ok(id) => Json(json!({ "ok": true, "id": id })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn post_block(State(node): State<Arc<Node>>, Json(block): Json<Block>) -> Response {
    match node.submit_block(block, None) {
        Ok(height) => Json(json!({ "ok": true, "height": height })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn get_candidate(State(node): State<Arc<Node>>, Path(addr): Path<String>) -> Response {
    match node.build_candidate(&addr) {
        Ok(block) => Json(block).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
