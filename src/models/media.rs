use serde::{Deserialize, Serialize};

/// 待上传的图片文件
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaUploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
}

/// 图片托管服务的上传响应
#[derive(Debug, Deserialize)]
pub struct HostedImageResponse {
    pub secure_url: String,
}

/// 图片托管服务的错误响应
#[derive(Debug, Deserialize)]
pub struct HostedImageError {
    pub error: Option<HostedImageErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct HostedImageErrorDetail {
    pub message: Option<String>,
}
