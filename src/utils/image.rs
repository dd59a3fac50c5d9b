use serde::{Deserialize, Serialize};

/// 商品图片允许的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    pub fn to_mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }
}

/// 文件头签名
const SIGNATURES: [(&[u8], ImageFormat); 4] = [
    (&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg),
    (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], ImageFormat::Png),
    (b"GIF87a", ImageFormat::Gif),
    (b"GIF89a", ImageFormat::Gif),
];

/// 上传前的本地图片检查
pub struct ImageInspector;

impl ImageInspector {
    pub fn detect_format(data: &[u8]) -> Result<ImageFormat, String> {
        if let Some((_, format)) = SIGNATURES.iter().find(|(magic, _)| data.starts_with(magic)) {
            return Ok(*format);
        }
        // RIFF 容器，第 8..12 字节为 WEBP
        if data.get(..4) == Some(b"RIFF".as_slice()) && data.get(8..12) == Some(b"WEBP".as_slice()) {
            return Ok(ImageFormat::Webp);
        }
        Err("Unsupported image format; expected JPEG, PNG, GIF or WEBP".to_string())
    }

    /// 验证大小和格式，返回检测到的格式
    pub fn validate(data: &[u8], max_size: usize) -> Result<ImageFormat, String> {
        if data.is_empty() {
            return Err("Image file is empty".to_string());
        }
        if data.len() > max_size {
            return Err(format!(
                "Image file is too large: {} bytes (max {} bytes)",
                data.len(),
                max_size
            ));
        }
        Self::detect_format(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        let png_header = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(ImageInspector::detect_format(&png_header).unwrap(), ImageFormat::Png);

        let jpeg_header = vec![0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(ImageInspector::detect_format(&jpeg_header).unwrap(), ImageFormat::Jpeg);

        assert_eq!(ImageInspector::detect_format(b"GIF89a\x01\x00").unwrap(), ImageFormat::Gif);
        assert!(ImageInspector::detect_format(b"RIFF").is_err());
        assert!(ImageInspector::detect_format(&[0x89]).is_err());

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(ImageInspector::detect_format(&webp).unwrap(), ImageFormat::Webp);

        assert!(ImageInspector::detect_format(b"%PDF-1.7").is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_files() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert!(ImageInspector::validate(&jpeg, 4).is_err());
        assert_eq!(ImageInspector::validate(&jpeg, 1024).unwrap(), ImageFormat::Jpeg);
    }
}
