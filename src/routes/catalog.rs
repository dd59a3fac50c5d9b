use crate::{
    error::Result,
    models::{
        catalog::{CatalogItem, CatalogSlide},
        response::ApiResponse,
    },
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_catalog))
        .route("/:index", get(get_slide))
}

/// 解析后的目录
/// GET /api/catalog
pub async fn list_catalog(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CatalogItem>>>> {
    Ok(Json(ApiResponse::success(app_state.catalog_service.load().await)))
}

/// 一页幻灯片，前后索引循环
/// GET /api/catalog/:index
pub async fn get_slide(
    State(app_state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<ApiResponse<CatalogSlide>>> {
    let slide = app_state.catalog_service.slide(index).await?;
    Ok(Json(ApiResponse::success(slide)))
}
