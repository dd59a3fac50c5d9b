pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod live;
pub mod media;
pub mod notifications;
pub mod products;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::{state::AppState, utils::middleware::require_auth};

/// 组装全部路由；`/api/admin` 下的接口都需要登录
pub fn app(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .merge(dashboard::router())
        .nest("/products", products::router())
        .nest("/notifications", notifications::router())
        .nest("/media", media::router())
        .nest("/live", live::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth::router())
        .nest("/api/admin", admin)
        .nest("/api/catalog", catalog::router())
        .layer(DefaultBodyLimit::max(state.config.max_upload_size as usize))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "smart-retail-catalog",
        "mirrors": {
            "products": state.product_service.mirror().status(),
            "notifications": state.notification_service.mirror().status(),
        }
    }))
}
