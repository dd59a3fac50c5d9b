use crate::{
    error::{AppError, Result},
    models::media::{ImageUpload, MediaUploadResponse},
    services::auth::AdminUser,
    state::AppState,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Extension, Router,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload_image))
}

/// 上传图片，返回托管 URL
/// POST /api/admin/media/upload
pub async fn upload_image(
    State(app_state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminUser>,
    mut multipart: Multipart,
) -> Result<Json<MediaUploadResponse>> {
    debug!("Processing image upload for: {}", admin.email);

    let mut upload: Option<ImageUpload> = None;

    // 处理multipart表单数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::BadRequest("Could not process the uploaded file".to_string())
    })? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();

            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {}", e);
                AppError::BadRequest("Could not read file data".to_string())
            })?;

            upload = Some(ImageUpload {
                filename,
                content_type,
                data: data.to_vec(),
            });
            break;
        }
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("No file was uploaded".to_string()))?;
    let filename = upload.filename.clone();
    let response = app_state.media_service.upload_image(upload).await?;

    info!("Uploaded image {} for {}", filename, admin.email);
    Ok(Json(response))
}
