use crate::{
    error::Result,
    models::{category::CategorySummary, product::DashboardStats, response::ApiResponse},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/categories", get(list_categories))
}

/// GET /api/admin/dashboard
pub async fn get_dashboard(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<DashboardStats>>> {
    Ok(Json(ApiResponse::success(app_state.product_service.dashboard())))
}

/// 由商品派生的分类
/// GET /api/admin/categories
pub async fn list_categories(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CategorySummary>>>> {
    Ok(Json(ApiResponse::success(app_state.product_service.categories())))
}
