//! HTTP handlers for the node-to-node ring protocol.
//!
//! Thin adapters between the wire DTOs and `ChordNode`. Routing queries
//! that fail mid-walk answer `finger: None` with 200 so callers can tell
//! "query failed" apart from "peer down" at the transport layer.

use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use tracing::warn;

use super::node::ChordNode;
use super::protocol::*;

pub async fn handle_get_location(
    Extension(node): Extension<Arc<ChordNode>>,
) -> Json<FingerResponse> {
    Json(FingerResponse {
        finger: node.local(),
    })
}

pub async fn handle_get_shard_id(
    Extension(node): Extension<Arc<ChordNode>>,
) -> Json<ShardIdResponse> {
    Json(ShardIdResponse {
        shard_id: node.local().id,
    })
}

pub async fn handle_get_successor(
    Extension(node): Extension<Arc<ChordNode>>,
) -> Json<FingerResponse> {
    Json(FingerResponse {
        finger: node.successor().await,
    })
}

pub async fn handle_get_predecessor(
    Extension(node): Extension<Arc<ChordNode>>,
) -> Json<OptionalFingerResponse> {
    Json(OptionalFingerResponse {
        finger: node.predecessor().await,
    })
}

pub async fn handle_set_predecessor(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<SetPredecessorRequest>,
) -> Json<AckResponse> {
    node.set_predecessor(request.predecessor).await;
    Json(AckResponse { success: true })
}

pub async fn handle_notify(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<NotifyRequest>,
) -> Json<AckResponse> {
    node.notify_predecessor(request.candidate).await;
    Json(AckResponse { success: true })
}

pub async fn handle_find_successor(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<FindRequest>,
) -> Json<OptionalFingerResponse> {
    match node.find_successor(request.identifier).await {
        Ok(finger) => Json(OptionalFingerResponse {
            finger: Some(finger),
        }),
        Err(e) => {
            warn!("find-successor for {:08x} failed: {e}", request.identifier);
            Json(OptionalFingerResponse { finger: None })
        }
    }
}

pub async fn handle_find_predecessor(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<FindRequest>,
) -> Json<OptionalFingerResponse> {
    match node.find_predecessor(request.identifier).await {
        Ok(finger) => Json(OptionalFingerResponse {
            finger: Some(finger),
        }),
        Err(e) => {
            warn!("find-predecessor for {:08x} failed: {e}", request.identifier);
            Json(OptionalFingerResponse { finger: None })
        }
    }
}

pub async fn handle_closest_preceding_finger(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<FindRequest>,
) -> Json<FingerResponse> {
    Json(FingerResponse {
        finger: node.closest_preceding_finger(request.identifier).await,
    })
}

pub async fn handle_get_finger_table(
    Extension(node): Extension<Arc<ChordNode>>,
) -> Json<FingerTableResponse> {
    Json(FingerTableResponse {
        fingers: node.finger_table().await,
    })
}

pub async fn handle_refresh_successors(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<RefreshSuccessorsRequest>,
) -> (StatusCode, Json<AckResponse>) {
    match node.refresh_successors(request.nodes_left).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse { success: true })),
        Err(e) => {
            warn!("successor-list refresh failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AckResponse { success: false }),
            )
        }
    }
}

pub async fn handle_remove_node(
    Extension(node): Extension<Arc<ChordNode>>,
    Json(request): Json<RemoveNodeRequest>,
) -> Json<AckResponse> {
    node.remove_node(
        request.node,
        request.index,
        request.replacement,
        request.hops_remaining,
    )
    .await;
    Json(AckResponse { success: true })
}

/// Direct blob fetch used by replica lookups; answers 404 when this node
/// holds no copy, which the client maps to `Ok(None)`.
pub async fn handle_get_file(
    Extension(shard): Extension<Arc<crate::storage::Shard>>,
    Path(content_id): Path<String>,
) -> (StatusCode, Json<FileResponse>) {
    match shard.get_local(&content_id).await {
        Some(bytes) => (
            StatusCode::OK,
            Json(FileResponse {
                data_hex: Some(hex::encode(bytes)),
            }),
        ),
        None => (StatusCode::NOT_FOUND, Json(FileResponse { data_hex: None })),
    }
}

/// Replication push: store the copy and forward it along the successor
/// chain while hops remain.
pub async fn handle_replicate(
    Extension(shard): Extension<Arc<crate::storage::Shard>>,
    Json(request): Json<ReplicateFileRequest>,
) -> (StatusCode, Json<AckResponse>) {
    let Ok(bytes) = hex::decode(&request.data_hex) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(AckResponse { success: false }),
        );
    };
    match shard.receive_replica(bytes, request.hops_remaining).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse { success: true })),
        Err(e) => {
            warn!("failed to store replica: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AckResponse { success: false }),
            )
        }
    }
}
