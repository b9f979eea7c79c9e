//! HTTP handlers for the client-facing storage API.
//!
//! Status mapping for retrieval: a blob that was never stored is 404; one
//! whose every reachable copy fails verification is 410 (it existed, it is
//! gone); unreachable peers and exhausted failover are 502, retryable once
//! stabilization has healed the ring.

use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::error::ChordError;

use crate::chord::node::ChordNode;

use super::protocol::{ErrorResponse, InsertResponse, StatsResponse};
use super::shard::Shard;

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn retrieval_status(error: &ChordError) -> StatusCode {
    match error {
        ChordError::NotFound(_) => StatusCode::NOT_FOUND,
        ChordError::SignatureMismatch { .. } => StatusCode::GONE,
        ChordError::PeerUnreachable(_) | ChordError::RetrievalFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /shard with the raw blob bytes as the body.
pub async fn handle_insert_item(
    Extension(shard): Extension<Arc<Shard>>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty body".to_string());
    }
    match shard.save_file(&body).await {
        Ok(receipt) => {
            info!(
                "accepted blob {} ({} bytes) for shard {:08x}",
                receipt.content_id,
                body.len(),
                receipt.shard_id
            );
            (
                StatusCode::CREATED,
                Json(InsertResponse {
                    content_id: receipt.content_id,
                    sha256: receipt.sha256,
                    shard_id: receipt.shard_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("failed to store blob: {e}");
            let status = if e.is_unreachable() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, e.to_string())
        }
    }
}

/// GET /shard/stats: per-instance lookup counters.
pub async fn handle_get_stats(
    Extension(node): Extension<Arc<ChordNode>>,
    Extension(shard): Extension<Arc<Shard>>,
) -> Json<StatsResponse> {
    Json(StatsResponse {
        shard_id: node.local().id,
        hits: shard.hit_count(),
    })
}

/// GET /shard/{content_id}: the verified blob bytes.
pub async fn handle_get_item(
    Extension(shard): Extension<Arc<Shard>>,
    Path(content_id): Path<String>,
) -> Response {
    match shard.get_item(&content_id).await {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => error_response(retrieval_status(&e), e.to_string()),
    }
}
