use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::media::{HostedImageError, HostedImageResponse, ImageUpload, MediaUploadResponse},
    utils::image::ImageInspector,
};

const UPLOAD_FAILED: &str = "Image upload failed";

/// 图片托管服务：上传后返回可长期访问的 URL
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: &ImageUpload) -> Result<String>;
}

/// Cloudinary 无签名上传
pub struct CloudinaryHost {
    client: Client,
    endpoint: String,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let endpoint = format!(
            "{}/v1_1/{}/image/upload",
            config.cloudinary_base_url.trim_end_matches('/'),
            config.cloudinary_cloud_name
        );
        Ok(Self {
            client,
            endpoint,
            upload_preset: config.cloudinary_upload_preset.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: &ImageUpload) -> Result<String> {
        let part = Part::bytes(image.data.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        debug!("Uploading {} ({} bytes) to {}", image.filename, image.data.len(), self.endpoint);
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            let hosted: HostedImageResponse = serde_json::from_slice(&body).map_err(|e| {
                error!("Unexpected image host response: {}", e);
                AppError::ExternalService(UPLOAD_FAILED.to_string())
            })?;
            Ok(hosted.secure_url)
        } else {
            let message = serde_json::from_slice::<HostedImageError>(&body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| UPLOAD_FAILED.to_string());
            error!("Image host rejected upload ({}): {}", status, message);
            Err(AppError::ExternalService(message))
        }
    }
}

#[derive(Clone)]
pub struct MediaService {
    host: Arc<dyn ImageHost>,
    max_upload_size: usize,
}

impl MediaService {
    pub fn new(config: &Config) -> Result<Self> {
        let host = CloudinaryHost::new(config)?;
        info!("Image host endpoint: {}", host.endpoint());
        Ok(Self::with_host(Arc::new(host), config))
    }

    pub fn with_host(host: Arc<dyn ImageHost>, config: &Config) -> Self {
        Self {
            host,
            max_upload_size: config.max_upload_size as usize,
        }
    }

    /// 本地校验后上传，返回托管 URL
    pub async fn upload_image(&self, image: ImageUpload) -> Result<MediaUploadResponse> {
        let format = ImageInspector::validate(&image.data, self.max_upload_size)
            .map_err(AppError::FileUpload)?;
        let image = ImageUpload {
            content_type: format.to_mime_type().to_string(),
            ..image
        };

        let url = self.host.upload(&image).await?;
        info!("Uploaded image {} -> {}", image.filename, url);

        Ok(MediaUploadResponse {
            url,
            filename: image.filename,
            size: image.data.len(),
            content_type: image.content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingHost {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn upload(&self, image: &ImageUpload) -> Result<String> {
            self.uploads.lock().push(image.content_type.clone());
            Ok(format!("https://img.example/{}", image.filename))
        }
    }

    #[tokio::test]
    async fn test_upload_normalizes_content_type_from_magic_bytes() {
        let host = Arc::new(RecordingHost {
            uploads: Mutex::new(Vec::new()),
        });
        let service = MediaService::with_host(host.clone(), &Config::default());

        let response = service
            .upload_image(ImageUpload {
                filename: "chair.png".to_string(),
                content_type: "application/octet-stream".to_string(),
                data: vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00],
            })
            .await
            .unwrap();

        assert_eq!(response.url, "https://img.example/chair.png");
        assert_eq!(host.uploads.lock().as_slice(), ["image/png".to_string()]);
    }

    #[tokio::test]
    async fn test_non_image_is_rejected_before_upload() {
        let host = Arc::new(RecordingHost {
            uploads: Mutex::new(Vec::new()),
        });
        let service = MediaService::with_host(host.clone(), &Config::default());

        let err = service
            .upload_image(ImageUpload {
                filename: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                data: b"hello world".to_vec(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FileUpload(_)));
        assert!(host.uploads.lock().is_empty());
    }
}
