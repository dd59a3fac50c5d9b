use crate::{
    error::{AppError, Result},
    models::{
        media::ImageUpload,
        product::{BulkDeleteRequest, Product, ProductPatch, ProductQuery},
        response::{ApiResponse, PaginatedResult},
    },
    services::{
        auth::AdminUser,
        product::SaveMode,
        spreadsheet::{ImportMode, ImportReport, EXPORT_FILENAME},
    },
    state::AppState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/bulk-delete", post(bulk_delete))
        .route("/with-image", post(save_with_image))
        .route("/import", post(import_products))
        .route("/export", get(export_products))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub mode: Option<ImportMode>,
}

/// 搜索并分页
/// GET /api/admin/products?search=&page=
pub async fn list_products(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<PaginatedResult<Product>>>> {
    let page = app_state
        .product_service
        .list_products(query.search.as_deref(), query.page);
    Ok(Json(ApiResponse::success(page)))
}

/// 新增商品
/// POST /api/admin/products
pub async fn create_product(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminUser>,
    Json(product): Json<Product>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    debug!("{} creating product {}", admin.email, product.product_id);
    let product = app_state.product_service.create_product(product).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            product,
            "Product added successfully!".to_string(),
        )),
    ))
}

/// GET /api/admin/products/:id
pub async fn get_product(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = app_state.product_service.get_product(&id)?;
    Ok(Json(ApiResponse::success(product)))
}

/// 部分更新
/// PUT /api/admin/products/:id
pub async fn update_product(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Value>> {
    app_state.product_service.update_product(&id, patch).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product updated successfully!"
    })))
}

/// DELETE /api/admin/products/:id
pub async fn delete_product(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    app_state.product_service.delete_product(&id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Product deleted successfully!"
    })))
}

/// 批量删除（全部成功或全部失败）
/// POST /api/admin/products/bulk-delete
pub async fn bulk_delete(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<Value>> {
    let deleted = app_state.product_service.bulk_delete(&request.ids).await?;
    Ok(Json(json!({
        "success": true,
        "data": { "deleted": deleted },
        "message": format!("{} products deleted successfully!", deleted)
    })))
}

/// 商品表单加可选图片
/// POST /api/admin/products/with-image
///
/// 字段：`product`（JSON）、`image`（文件）、`mode`（create | edit）
pub async fn save_with_image(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Product>>> {
    let mut product: Option<Product> = None;
    let mut image: Option<ImageUpload> = None;
    let mut mode = SaveMode::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::BadRequest("Could not process the uploaded form".to_string())
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "product" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Could not read product data"))?;
                product = Some(serde_json::from_str(&text).map_err(|e| {
                    AppError::BadRequest(format!("Invalid product data: {}", e))
                })?);
            }
            "mode" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Could not read mode"))?;
                mode = match text.trim() {
                    "edit" => SaveMode::Edit,
                    "create" | "" => SaveMode::Create,
                    other => return Err(AppError::BadRequest(format!("Unknown mode: {}", other))),
                };
            }
            "image" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Could not read image data"))?;
                if !data.is_empty() {
                    image = Some(ImageUpload {
                        filename,
                        content_type,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let product = product.ok_or_else(|| AppError::bad_request("Missing product data"))?;
    let saved = app_state
        .product_service
        .save_with_image(product, image, mode)
        .await?;

    let message = match mode {
        SaveMode::Create => "Product added successfully!",
        SaveMode::Edit => "Product updated successfully!",
    };
    Ok(Json(ApiResponse::success_with_message(saved, message.to_string())))
}

/// 电子表格导入
/// POST /api/admin/products/import?mode=strict|lenient
pub async fn import_products(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportReport>>> {
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::BadRequest("Could not process the uploaded file".to_string())
    })? {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("Could not read file data"))?;
            file = Some(data.to_vec());
            break;
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request("Please select a file first."))?;
    let mode = query.mode.unwrap_or_default();
    let report = app_state.spreadsheet_service.import(file, mode).await?;

    let message = match mode {
        ImportMode::Strict => format!("Imported {} products successfully!", report.added),
        ImportMode::Lenient => format!(
            "Upload complete: {} added, {} updated",
            report.added, report.updated
        ),
    };
    Ok(Json(ApiResponse::success_with_message(report, message)))
}

/// 导出当前快照
/// GET /api/admin/products/export
pub async fn export_products(State(app_state): State<Arc<AppState>>) -> Result<Response> {
    let buffer = app_state.spreadsheet_service.export()?;
    info!("Exporting {} bytes as {}", buffer.len(), EXPORT_FILENAME);

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        buffer,
    )
        .into_response())
}
