use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::serde_helpers::{
    lenient_number, lenient_number_opt, lenient_string, lenient_string_opt,
};

/// 商品文档（集合 `products`，以 `Product_ID` 为存储键）
///
/// 字段名与电子表格列名一致，导入导出和 JSON 传输都直接使用。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "Product_ID", default, deserialize_with = "lenient_string::deserialize")]
    pub product_id: String,
    #[serde(rename = "Category", default, deserialize_with = "lenient_string::deserialize")]
    pub category: String,
    #[serde(rename = "Product_Name", default, deserialize_with = "lenient_string::deserialize")]
    pub product_name: String,
    #[serde(rename = "Material_Type", default, deserialize_with = "lenient_string::deserialize")]
    pub material_type: String,
    #[serde(rename = "Wood_Type", default, deserialize_with = "lenient_string::deserialize")]
    pub wood_type: String,
    #[serde(rename = "Length_mm", default, deserialize_with = "lenient_number::deserialize")]
    pub length_mm: f64,
    #[serde(rename = "Width_mm", default, deserialize_with = "lenient_number::deserialize")]
    pub width_mm: f64,
    #[serde(rename = "Height_mm", default, deserialize_with = "lenient_number::deserialize")]
    pub height_mm: f64,
    #[serde(rename = "Thickness_mm", default, deserialize_with = "lenient_number::deserialize")]
    pub thickness_mm: f64,
    #[serde(rename = "Size_Description", default, deserialize_with = "lenient_string::deserialize")]
    pub size_description: String,
    #[serde(rename = "Price_Min_INR", default, deserialize_with = "lenient_number::deserialize")]
    pub price_min_inr: f64,
    #[serde(rename = "Price_Max_INR", default, deserialize_with = "lenient_number::deserialize")]
    pub price_max_inr: f64,
    #[serde(rename = "Stock_Quantity", default, deserialize_with = "lenient_number::deserialize")]
    pub stock_quantity: f64,
    #[serde(rename = "Grade", default, deserialize_with = "lenient_string::deserialize")]
    pub grade: String,
    #[serde(rename = "Usage_Type", default, deserialize_with = "lenient_string::deserialize")]
    pub usage_type: String,
    #[serde(
        rename = "Image_URL",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string_opt::deserialize"
    )]
    pub image_url: Option<String>,
}

/// 电子表格列顺序（导出时的表头）
pub const PRODUCT_COLUMNS: [&str; 16] = [
    "Product_ID",
    "Category",
    "Product_Name",
    "Material_Type",
    "Wood_Type",
    "Length_mm",
    "Width_mm",
    "Height_mm",
    "Thickness_mm",
    "Size_Description",
    "Price_Min_INR",
    "Price_Max_INR",
    "Stock_Quantity",
    "Grade",
    "Usage_Type",
    "Image_URL",
];

/// 单元格值，导出时按类型写入
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl Product {
    /// 创建流程的最低要求：ID 与名称必填
    pub fn has_required_fields(&self) -> bool {
        !self.product_id.trim().is_empty() && !self.product_name.trim().is_empty()
    }

    /// 按 `PRODUCT_COLUMNS` 的顺序生成一行
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.product_id.clone()),
            CellValue::Text(self.category.clone()),
            CellValue::Text(self.product_name.clone()),
            CellValue::Text(self.material_type.clone()),
            CellValue::Text(self.wood_type.clone()),
            CellValue::Number(self.length_mm),
            CellValue::Number(self.width_mm),
            CellValue::Number(self.height_mm),
            CellValue::Number(self.thickness_mm),
            CellValue::Text(self.size_description.clone()),
            CellValue::Number(self.price_min_inr),
            CellValue::Number(self.price_max_inr),
            CellValue::Number(self.stock_quantity),
            CellValue::Text(self.grade.clone()),
            CellValue::Text(self.usage_type.clone()),
            CellValue::Text(self.image_url.clone().unwrap_or_default()),
        ]
    }

    pub fn is_low_stock(&self, threshold: f64) -> bool {
        self.stock_quantity < threshold
    }
}

/// 商品部分更新：只写入提供的字段
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(rename = "Category", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "Product_Name", default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(rename = "Material_Type", default, skip_serializing_if = "Option::is_none")]
    pub material_type: Option<String>,
    #[serde(rename = "Wood_Type", default, skip_serializing_if = "Option::is_none")]
    pub wood_type: Option<String>,
    #[serde(rename = "Length_mm", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub length_mm: Option<f64>,
    #[serde(rename = "Width_mm", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub width_mm: Option<f64>,
    #[serde(rename = "Height_mm", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub height_mm: Option<f64>,
    #[serde(rename = "Thickness_mm", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub thickness_mm: Option<f64>,
    #[serde(rename = "Size_Description", default, skip_serializing_if = "Option::is_none")]
    pub size_description: Option<String>,
    #[serde(rename = "Price_Min_INR", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub price_min_inr: Option<f64>,
    #[serde(rename = "Price_Max_INR", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub price_max_inr: Option<f64>,
    #[serde(rename = "Stock_Quantity", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_number_opt::deserialize")]
    pub stock_quantity: Option<f64>,
    #[serde(rename = "Grade", default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(rename = "Usage_Type", default, skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(rename = "Image_URL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProductPatch {
    /// 编辑表单提交的是整份商品数据（ID 除外）
    pub fn from_product(product: &Product) -> Self {
        Self {
            category: Some(product.category.clone()),
            product_name: Some(product.product_name.clone()),
            material_type: Some(product.material_type.clone()),
            wood_type: Some(product.wood_type.clone()),
            length_mm: Some(product.length_mm),
            width_mm: Some(product.width_mm),
            height_mm: Some(product.height_mm),
            thickness_mm: Some(product.thickness_mm),
            size_description: Some(product.size_description.clone()),
            price_min_inr: Some(product.price_min_inr),
            price_max_inr: Some(product.price_max_inr),
            stock_quantity: Some(product.stock_quantity),
            grade: Some(product.grade.clone()),
            usage_type: Some(product.usage_type.clone()),
            image_url: product.image_url.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ProductPatch::default()
    }

    pub fn to_fields(&self) -> serde_json::Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

/// 批量删除请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

/// 商品列表查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
}

/// 仪表盘统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_products: usize,
    pub total_categories: usize,
    pub low_stock_count: usize,
    pub low_stock_threshold: f64,
    pub low_stock_preview: Vec<Product>,
}
