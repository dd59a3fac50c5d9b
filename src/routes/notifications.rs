use crate::{
    error::Result,
    models::{
        notification::{NotificationFeed, NotificationView},
        response::ApiResponse,
    },
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_feed).delete(clear_all))
        .route("/history", get(get_history))
        .route("/:id/read", post(mark_read))
        .route("/:id", delete(delete_notification))
}

/// 未读通知（最多 5 条）和未读总数
/// GET /api/admin/notifications
pub async fn get_feed(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<NotificationFeed>>> {
    Ok(Json(ApiResponse::success(app_state.notification_service.feed())))
}

/// 已读通知
/// GET /api/admin/notifications/history
pub async fn get_history(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<NotificationView>>>> {
    Ok(Json(ApiResponse::success(app_state.notification_service.history())))
}

/// POST /api/admin/notifications/:id/read
pub async fn mark_read(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    app_state.notification_service.mark_read(&id).await?;
    Ok(Json(json!({ "success": true })))
}

/// DELETE /api/admin/notifications/:id
pub async fn delete_notification(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    app_state.notification_service.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

/// 清空全部通知
/// DELETE /api/admin/notifications
pub async fn clear_all(State(app_state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let cleared = app_state.notification_service.clear_all().await?;
    Ok(Json(json!({
        "success": true,
        "data": { "cleared": cleared }
    })))
}
