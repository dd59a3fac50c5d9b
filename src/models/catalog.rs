use serde::{Deserialize, Serialize};

use crate::models::product::Product;

/// 目录源中缺少图片时使用的占位图
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=No+Image";

/// 幻灯片中的一页
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSlide {
    pub index: usize,
    pub total: usize,
    pub prev_index: usize,
    pub next_index: usize,
    pub product: Product,
}

/// 目录条目的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Live,
    Feed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(flatten)]
    pub product: Product,
    pub source: CatalogSource,
}
