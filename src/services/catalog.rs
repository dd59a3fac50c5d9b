use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        catalog::{CatalogItem, CatalogSlide, CatalogSource, PLACEHOLDER_IMAGE_URL},
        product::Product,
    },
    services::{
        product::PRODUCTS_COLLECTION,
        store::{DocumentStore, Fields},
        views::SlideCursor,
    },
    utils::serde_helpers::coerce_text,
};

/// 面向顾客的商品目录
///
/// 目录源列出要展示的商品 ID，商品详情从存储中实时读取。
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    feed: String,
    client: Client,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            store,
            feed: config.catalog_feed.clone(),
            client,
        })
    }

    /// 解析整个目录；目录源或任一商品读取失败时返回空目录
    pub async fn load(&self) -> Vec<CatalogItem> {
        match self.try_load().await {
            Ok(items) => items,
            Err(e) => {
                error!("Error loading catalog from '{}': {}", self.feed, e);
                Vec::new()
            }
        }
    }

    async fn try_load(&self) -> Result<Vec<CatalogItem>> {
        let entries = self.fetch_feed().await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Object(feed_fields) = entry else {
                continue;
            };
            let Some(id) = feed_fields.get("Product_ID").and_then(coerce_text) else {
                debug!("Skipping catalog entry without Product_ID");
                continue;
            };

            items.push(self.resolve(&id, feed_fields).await?);
        }
        Ok(items)
    }

    /// 取一页幻灯片，索引超出范围时循环
    pub async fn slide(&self, index: usize) -> Result<CatalogSlide> {
        let mut items = self.load().await;
        if items.is_empty() {
            return Err(AppError::not_found("Catalog item"));
        }
        let cursor = SlideCursor::at(index, items.len());
        let total = items.len();
        let item = items.swap_remove(cursor.index());
        Ok(CatalogSlide {
            index: cursor.index(),
            total,
            prev_index: cursor.prev_index(),
            next_index: cursor.next_index(),
            product: item.product,
        })
    }

    async fn fetch_feed(&self) -> Result<Vec<Value>> {
        let remote = Url::parse(&self.feed)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"));

        let body = if let Some(url) = remote {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(AppError::ExternalService(format!(
                    "Catalog feed returned {}",
                    response.status()
                )));
            }
            response.bytes().await?.to_vec()
        } else {
            tokio::fs::read(&self.feed).await?
        };
        Ok(serde_json::from_slice(&body)?)
    }

    async fn resolve(&self, id: &str, feed_fields: Fields) -> Result<CatalogItem> {
        let stored = self.store.get(PRODUCTS_COLLECTION, id).await?;

        let (merged, source) = match stored {
            Some(record) => {
                let store_fields = match record.data {
                    Value::Object(map) => map,
                    _ => Fields::new(),
                };
                let image = image_from(&store_fields, &["Image_URL", "image_url"])
                    .or_else(|| image_from(&feed_fields, &["image_url", "Image_URL"]));

                let mut merged = feed_fields;
                merged.extend(store_fields);
                merged.remove("image_url");
                match image {
                    Some(url) => merged.insert("Image_URL".to_string(), Value::String(url)),
                    None => merged.remove("Image_URL"),
                };
                (merged, CatalogSource::Live)
            }
            None => {
                let image = image_from(&feed_fields, &["image_url", "Image_URL"])
                    .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());
                let mut merged = feed_fields;
                merged.remove("image_url");
                merged.insert("Image_URL".to_string(), Value::String(image));
                (merged, CatalogSource::Feed)
            }
        };

        let mut product: Product = serde_json::from_value(Value::Object(merged))?;
        if product.product_id.is_empty() {
            product.product_id = id.to_string();
        }
        Ok(CatalogItem { product, source })
    }
}

fn image_from(fields: &Fields, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_lookup_order() {
        let fields: Fields = serde_json::from_value(json!({
            "image_url": "https://cdn/b.jpg",
            "Image_URL": ""
        }))
        .unwrap();
        assert_eq!(
            image_from(&fields, &["Image_URL", "image_url"]),
            Some("https://cdn/b.jpg".to_string())
        );
        assert_eq!(image_from(&Fields::new(), &["Image_URL"]), None);
    }
}
