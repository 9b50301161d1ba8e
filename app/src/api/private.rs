//! Private write endpoints, exposed only to the consensus node.
//!
//! Each handler validates shape (the named top-level field must be
//! present and decode), acknowledges with 200, and defers the actual
//! work to the serialized ingest queue. Persistence failures never
//! surface here; the queue absorbs and retries through recovery.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use basilica_types::{Block, PreImageInfo, Transaction};
use serde_json::Value;

use super::{ApiContext, ApiError};
use crate::ingest::IngestTask;

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route("/block_externalized", post(block_externalized))
        .route("/preimage_received", post(preimage_received))
        .route("/transaction_received", post(transaction_received))
        .with_state(context)
}

/// Pulls and decodes the required top-level field; anything missing or
/// malformed is a 400.
fn shape<T: serde::de::DeserializeOwned>(mut body: Value, field: &str) -> Result<T, ApiError> {
    let value = body
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| ApiError::invalid(format!("missing top-level field: {field}")))?;
    serde_json::from_value(value).map_err(|e| ApiError::invalid(format!("malformed {field}: {e}")))
}

async fn block_externalized(
    State(ctx): State<ApiContext>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let block: Block = shape(body, "block")?;
    tracing::debug!(height = %block.header.height, "block externalized");
    ctx.ingest.submit(IngestTask::Block(Box::new(block)));
    Ok(StatusCode::OK)
}

async fn preimage_received(
    State(ctx): State<ApiContext>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let preimage: PreImageInfo = shape(body, "preimage")?;
    ctx.ingest.submit(IngestTask::PreImage(preimage));
    Ok(StatusCode::OK)
}

async fn transaction_received(
    State(ctx): State<ApiContext>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let tx: Transaction = shape(body, "tx")?;
    ctx.ingest.submit(IngestTask::PoolTx(Box::new(tx)));
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_requires_top_level_field() {
        let body = serde_json::json!({ "nope": 1 });
        let result: Result<PreImageInfo, ApiError> = shape(body, "preimage");
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[test]
    fn test_shape_decodes_preimage() {
        let info = PreImageInfo {
            utxo: basilica_types::hash(b"utxo"),
            hash: basilica_types::hash(b"tip"),
            height: basilica_types::Height::new(4),
        };
        let body = serde_json::json!({ "preimage": info });
        let decoded: PreImageInfo = shape(body, "preimage").unwrap();
        assert_eq!(decoded, info);
    }
}
