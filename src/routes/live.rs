use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::{
    error::{AppError, Result},
    services::{
        auth::AdminUser,
        mirror::{Document, MirrorSnapshot, MirrorStatus, SnapshotDiff},
        notification::NOTIFICATIONS_COLLECTION,
        product::PRODUCTS_COLLECTION,
    },
    state::AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:collection", get(live_handler))
}

/// 推送给客户端的一帧：完整结果集加差异
#[derive(Serialize)]
struct SnapshotFrame<'a, T> {
    collection: &'a str,
    version: u64,
    items: &'a [T],
    diff: &'a SnapshotDiff,
    status: &'a MirrorStatus,
}

/// 集合快照的 WebSocket 推送
/// GET /api/admin/live/:collection
async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminUser>,
    Path(collection): Path<String>,
) -> Result<Response> {
    info!("Live stream request for '{}' from {}", collection, admin.email);

    let response = match collection.as_str() {
        PRODUCTS_COLLECTION => {
            let rx = state.product_service.mirror().watch();
            ws.on_upgrade(move |socket| stream_snapshots(socket, PRODUCTS_COLLECTION, rx))
        }
        NOTIFICATIONS_COLLECTION => {
            let rx = state.notification_service.mirror().watch();
            ws.on_upgrade(move |socket| stream_snapshots(socket, NOTIFICATIONS_COLLECTION, rx))
        }
        _ => return Err(AppError::not_found("Collection")),
    };
    Ok(response)
}

fn encode_frame<T: Document>(collection: &str, snapshot: &MirrorSnapshot<T>) -> Option<String> {
    let frame = SnapshotFrame {
        collection,
        version: snapshot.version,
        items: snapshot.items.as_slice(),
        diff: &snapshot.diff,
        status: &snapshot.status,
    };
    serde_json::to_string(&frame)
        .map_err(|e| error!("Failed to encode snapshot frame: {}", e))
        .ok()
}

/// 每次快照变化发送一帧，直到客户端断开或镜像停止
async fn stream_snapshots<T: Document>(
    mut socket: WebSocket,
    collection: &'static str,
    mut rx: watch::Receiver<MirrorSnapshot<T>>,
) {
    loop {
        let frame = encode_frame(collection, &rx.borrow_and_update());
        if let Some(frame) = frame {
            if socket.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }

        let changed = loop {
            tokio::select! {
                changed = rx.changed() => break changed.is_ok(),
                message = socket.recv() => match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break false,
                    _ => {}
                },
            }
        };
        if !changed {
            break;
        }
    }
    debug!("Live stream for '{}' closed", collection);
}
