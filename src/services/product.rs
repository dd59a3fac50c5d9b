use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        category::CategorySummary,
        media::ImageUpload,
        product::{DashboardStats, Product, ProductPatch},
        response::PaginatedResult,
    },
    services::{
        media::MediaService,
        mirror::{Document, LiveMirror},
        store::{CollectionQuery, DocumentStore},
        views,
    },
};

pub const PRODUCTS_COLLECTION: &str = "products";

impl Document for Product {
    const ID_FIELD: &'static str = "Product_ID";

    fn document_id(&self) -> &str {
        &self.product_id
    }
}

/// 带图片保存时的目标操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Create,
    Edit,
}

impl Default for SaveMode {
    fn default() -> Self {
        Self::Create
    }
}

#[derive(Clone)]
pub struct ProductService {
    mirror: Arc<LiveMirror<Product>>,
    media_service: MediaService,
    per_page: usize,
    low_stock_threshold: f64,
}

impl ProductService {
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        media_service: MediaService,
        config: &Config,
    ) -> Result<Self> {
        let mirror = LiveMirror::activate(store, CollectionQuery::new(PRODUCTS_COLLECTION)).await?;
        Ok(Self::from_mirror(Arc::new(mirror), media_service, config))
    }

    pub fn from_mirror(
        mirror: Arc<LiveMirror<Product>>,
        media_service: MediaService,
        config: &Config,
    ) -> Self {
        Self {
            mirror,
            media_service,
            per_page: config.products_per_page,
            low_stock_threshold: config.low_stock_threshold,
        }
    }

    pub fn mirror(&self) -> &Arc<LiveMirror<Product>> {
        &self.mirror
    }

    pub fn snapshot(&self) -> Arc<Vec<Product>> {
        self.mirror.snapshot()
    }

    pub fn list_products(&self, search: Option<&str>, page: Option<usize>) -> PaginatedResult<Product> {
        let snapshot = self.mirror.snapshot();
        views::product_page(&snapshot, search, page.unwrap_or(1), self.per_page)
    }

    pub fn get_product(&self, id: &str) -> Result<Product> {
        self.mirror
            .find(id)
            .ok_or_else(|| AppError::not_found("Product"))
    }

    pub fn dashboard(&self) -> DashboardStats {
        views::dashboard_stats(&self.mirror.snapshot(), self.low_stock_threshold)
    }

    pub fn categories(&self) -> Vec<CategorySummary> {
        views::derive_categories(&self.mirror.snapshot())
    }

    /// 新增商品；ID 已存在时拒绝
    pub async fn create_product(&self, product: Product) -> Result<Product> {
        if !product.has_required_fields() {
            return Err(AppError::validation("Please fill in at least ID and Name"));
        }
        if self.mirror.contains(&product.product_id) {
            return Err(AppError::conflict(
                "Product ID already exists. Please change the Product ID or update the existing product.",
            ));
        }

        self.mirror.create(&product).await?;
        info!("Product added: {}", product.product_id);
        Ok(product)
    }

    /// 只合并提供的字段
    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> Result<()> {
        if patch.is_empty() {
            return Err(AppError::bad_request("No fields to update"));
        }
        self.mirror.update(id, patch.to_fields()?).await?;
        info!("Product updated: {}", id);
        Ok(())
    }

    pub async fn delete_product(&self, id: &str) -> Result<()> {
        self.mirror.delete(id).await?;
        info!("Product deleted: {}", id);
        Ok(())
    }

    /// 原子批量删除
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Err(AppError::bad_request("No products selected"));
        }
        self.mirror.delete_many(ids).await?;
        info!("Deleted {} products", ids.len());
        Ok(ids.len())
    }

    /// 先上传图片拿到 URL，再写入商品
    ///
    /// 上传失败时不写入。上传成功但写入失败时图片不会被清理。
    pub async fn save_with_image(
        &self,
        product: Product,
        image: Option<ImageUpload>,
        mode: SaveMode,
    ) -> Result<Product> {
        if !product.has_required_fields() {
            return Err(AppError::validation("Please fill in at least ID and Name"));
        }

        let mut product = product;
        let uploaded = match image {
            Some(image) => {
                let response = self.media_service.upload_image(image).await.map_err(|e| {
                    error!("Image upload failed for product {}: {}", product.product_id, e);
                    match e {
                        AppError::FileUpload(msg) => AppError::FileUpload(msg),
                        _ => AppError::ExternalService("Image upload failed".to_string()),
                    }
                })?;
                debug!("Image URL for {}: {}", product.product_id, response.url);
                product.image_url = Some(response.url.clone());
                Some(response.url)
            }
            None => None,
        };

        let result = match mode {
            SaveMode::Create => self.create_product(product.clone()).await.map(|_| ()),
            SaveMode::Edit => {
                let patch = ProductPatch::from_product(&product);
                self.update_product(&product.product_id, patch).await
            }
        };

        if let Err(e) = result {
            if let Some(url) = uploaded {
                warn!(
                    "Product {} was not saved; uploaded image is orphaned: {}",
                    product.product_id, url
                );
            }
            return Err(e);
        }

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryStore;
    use serde_json::json;

    async fn service() -> (MemoryStore, ProductService) {
        let store = MemoryStore::new();
        let config = Config::default();
        let media = MediaService::new(&config).unwrap();
        let service = ProductService::new(Arc::new(store.clone()), media, &config)
            .await
            .unwrap();
        (store, service)
    }

    fn product(id: &str, name: &str) -> Product {
        Product {
            product_id: id.to_string(),
            product_name: name.to_string(),
            category: "Furniture".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_id_and_name() {
        let (_, service) = service().await;
        let err = service.create_product(product("", "Chair")).await.unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Please fill in at least ID and Name");
    }

    #[tokio::test]
    async fn test_create_rejects_existing_id_once_mirrored() {
        let (_, service) = service().await;
        service.create_product(product("P-1", "Chair")).await.unwrap();
        service
            .mirror()
            .wait_for(|s| s.items.len() == 1)
            .await
            .unwrap();

        let err = service.create_product(product("P-1", "Other")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_merges_only_provided_fields() {
        let (store, service) = service().await;
        service.create_product(product("P-1", "Chair")).await.unwrap();

        let patch: ProductPatch = serde_json::from_value(json!({"Stock_Quantity": 12})).unwrap();
        service.update_product("P-1", patch).await.unwrap();

        let doc = store.get(PRODUCTS_COLLECTION, "P-1").await.unwrap().unwrap();
        assert_eq!(doc.data["Product_Name"], "Chair");
        assert_eq!(doc.data["Stock_Quantity"], json!(12.0));
    }

    #[tokio::test]
    async fn test_save_without_image_in_edit_mode_updates() {
        let (store, service) = service().await;
        service.create_product(product("P-1", "Chair")).await.unwrap();

        let mut edited = product("P-1", "Armchair");
        edited.stock_quantity = 3.0;
        service.save_with_image(edited, None, SaveMode::Edit).await.unwrap();

        let doc = store.get(PRODUCTS_COLLECTION, "P-1").await.unwrap().unwrap();
        assert_eq!(doc.data["Product_Name"], "Armchair");
    }
}
