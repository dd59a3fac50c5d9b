use serde::{Deserialize, Serialize};

/// 商品分类（由商品快照派生，不单独持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub description: String,
    pub product_count: usize,
}
