//! 电子表格批量导入与导出
//!
//! 导入读取第一个工作表，首行为列名（区分大小写），其余每行对应一个商品。

use std::io::Cursor;
use std::sync::Arc;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use futures::{stream, StreamExt};
use rand::Rng;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, error, info, warn};

use crate::{
    error::{AppError, Result},
    models::product::{CellValue, Product, PRODUCT_COLUMNS},
    services::mirror::LiveMirror,
    utils::serde_helpers::{coerce_number, coerce_text},
};

pub const EXPORT_FILENAME: &str = "products_inventory.xlsx";
pub const EXPORT_SHEET: &str = "Products";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_PRODUCT_NAME: &str = "Unknown Product";

/// 一行原始数据：列名 -> 单元格值，空单元格不出现
pub type SheetRow = Map<String, Value>;

/// 导入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// 缺少 ID 或名称的行被跳过
    Strict,
    /// 所有行都写入，缺失字段填默认值
    Lenient,
}

impl Default for ImportMode {
    fn default() -> Self {
        Self::Strict
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub mode: Option<ImportMode>,
    pub total_rows: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SpreadsheetService {
    mirror: Arc<LiveMirror<Product>>,
    concurrency: usize,
}

impl SpreadsheetService {
    pub fn new(mirror: Arc<LiveMirror<Product>>, concurrency: usize) -> Self {
        Self {
            mirror,
            concurrency: concurrency.max(1),
        }
    }

    /// 导入文件，返回统计结果
    pub async fn import(&self, bytes: Vec<u8>, mode: ImportMode) -> Result<ImportReport> {
        let rows = read_rows(bytes)?;
        info!("Parsed {} rows from spreadsheet ({:?} mode)", rows.len(), mode);

        let mut report = ImportReport {
            mode: Some(mode),
            total_rows: rows.len(),
            ..Default::default()
        };

        let products = match mode {
            ImportMode::Strict => {
                let (products, skipped) = strict_products(rows);
                report.skipped = skipped;
                products
            }
            ImportMode::Lenient => {
                if rows.is_empty() {
                    return Err(AppError::Spreadsheet("No valid data found in file.".to_string()));
                }
                lenient_products(rows)
            }
        };

        let snapshot = self.mirror.snapshot();
        let existing: std::collections::HashSet<&str> =
            snapshot.iter().map(|p| p.product_id.as_str()).collect();

        let mirror = self.mirror.clone();
        let results: Vec<(bool, Result<()>)> = stream::iter(products)
            .map(|product| {
                let mirror = mirror.clone();
                let overwrite = existing.contains(product.product_id.as_str());
                async move {
                    let result = mirror.create(&product).await;
                    if let Err(e) = &result {
                        warn!("Failed to import product {}: {}", product.product_id, e);
                    }
                    (overwrite, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (overwrite, result) in results {
            match result {
                Ok(()) if overwrite && mode == ImportMode::Lenient => report.updated += 1,
                Ok(()) => report.added += 1,
                Err(_) => report.failed += 1,
            }
        }

        info!(
            "Import finished: {} added, {} updated, {} skipped, {} failed",
            report.added, report.updated, report.skipped, report.failed
        );
        Ok(report)
    }

    /// 把当前快照导出为 xlsx
    pub fn export(&self) -> Result<Vec<u8>> {
        let snapshot = self.mirror.snapshot();
        let buffer = write_products(&snapshot)?;
        debug!("Exported {} products ({} bytes)", snapshot.len(), buffer.len());
        Ok(buffer)
    }
}

/// 读取第一个工作表；完全为空的行被忽略
pub fn read_rows(bytes: Vec<u8>) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        error!("Failed to open spreadsheet: {}", e);
        AppError::Spreadsheet("Could not read the uploaded file".to_string())
    })?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Spreadsheet("Workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&first_sheet)?;

    let mut rows = range.rows();
    let headers: Vec<Option<String>> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_value(cell).as_ref().and_then(coerce_text))
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut result = Vec::new();
    for row in rows {
        let mut map = SheetRow::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if let (Some(header), Some(value)) = (header, cell_value(cell)) {
                map.insert(header.clone(), value);
            }
        }
        if !map.is_empty() {
            result.push(map);
        }
    }
    Ok(result)
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        Data::String(s) if !s.trim().is_empty() => Some(Value::String(s.clone())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => Number::from_f64(dt.as_f64()).map(Value::Number),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        _ => None,
    }
}

/// 逐列转换：文本列按 `String(x)`，数字列按 `Number(x) || 0`，单个单元格不会让整行失效
fn row_to_product(row: &SheetRow) -> Product {
    let text = |key: &str| row.get(key).and_then(coerce_text).unwrap_or_default();
    let number = |key: &str| row.get(key).map(coerce_number).unwrap_or(0.0);
    Product {
        product_id: text("Product_ID"),
        category: text("Category"),
        product_name: text("Product_Name"),
        material_type: text("Material_Type"),
        wood_type: text("Wood_Type"),
        length_mm: number("Length_mm"),
        width_mm: number("Width_mm"),
        height_mm: number("Height_mm"),
        thickness_mm: number("Thickness_mm"),
        size_description: text("Size_Description"),
        price_min_inr: number("Price_Min_INR"),
        price_max_inr: number("Price_Max_INR"),
        stock_quantity: number("Stock_Quantity"),
        grade: text("Grade"),
        usage_type: text("Usage_Type"),
        image_url: row.get("Image_URL").and_then(coerce_text),
    }
}

/// 严格模式：跳过缺少 ID 或名称的行
pub fn strict_products(rows: Vec<SheetRow>) -> (Vec<Product>, usize) {
    let mut skipped = 0;
    let mut products = Vec::new();
    for row in rows {
        let mut product = row_to_product(&row);
        if !product.has_required_fields() {
            skipped += 1;
            continue;
        }
        if product.category.trim().is_empty() {
            product.category = DEFAULT_CATEGORY.to_string();
        }
        products.push(product);
    }
    (products, skipped)
}

/// 宽松模式：每一行都生成一个商品
pub fn lenient_products(rows: Vec<SheetRow>) -> Vec<Product> {
    let mut rng = rand::thread_rng();
    rows.into_iter()
        .map(|row| {
            let mut product = row_to_product(&row);
            if product.product_id.trim().is_empty() {
                product.product_id = format!("P-{}", rng.gen_range(0..10000));
            }
            if product.category.trim().is_empty() {
                product.category = DEFAULT_CATEGORY.to_string();
            }
            if product.product_name.trim().is_empty() {
                product.product_name = DEFAULT_PRODUCT_NAME.to_string();
            }
            product
        })
        .collect()
}

/// 表头加每个商品一行；空文本单元格留空
pub fn write_products(products: &[Product]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET)?;

    for (col, header) in PRODUCT_COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (index, product) in products.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, cell) in product.to_row().into_iter().enumerate() {
            match cell {
                CellValue::Text(text) if text.is_empty() => {}
                CellValue::Text(text) => {
                    worksheet.write_string(row, col as u16, text.as_str())?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row, col as u16, n)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
