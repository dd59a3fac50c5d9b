mod common;

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::NamedTempFile;

use common::fields;
use smart_retail_catalog::{
    config::Config,
    error::{AppError, Result},
    models::catalog::{CatalogSource, PLACEHOLDER_IMAGE_URL},
    services::{
        catalog::CatalogService,
        memory::MemoryStore,
        product::PRODUCTS_COLLECTION,
        store::{CollectionQuery, DocumentRecord, DocumentStore, Fields, Subscription},
    },
};

/// 读取指定文档时失败，其余操作交给内存存储
struct FlakyStore {
    inner: MemoryStore,
    broken_id: &'static str,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>> {
        if id == self.broken_id {
            return Err(AppError::Store(format!("{}/{} unavailable", collection, id)));
        }
        self.inner.get(collection, id).await
    }

    async fn list(&self, query: &CollectionQuery) -> Result<Vec<DocumentRecord>> {
        self.inner.list(query).await
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        self.inner.set(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<()> {
        self.inner.delete_many(collection, ids).await
    }

    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription> {
        self.inner.subscribe(query).await
    }
}

fn feed_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn service(store: &MemoryStore, feed: &str) -> CatalogService {
    let config = Config {
        catalog_feed: feed.to_string(),
        ..Config::default()
    };
    CatalogService::new(Arc::new(store.clone()), &config).unwrap()
}

#[tokio::test]
async fn store_fields_win_and_missing_products_get_the_placeholder() {
    let store = MemoryStore::new();
    store
        .set(
            PRODUCTS_COLLECTION,
            "P-1",
            fields(json!({
                "Product_ID": "P-1",
                "Product_Name": "Teak Chair (live)",
                "Stock_Quantity": 8,
                "image_url": "https://cdn.example/live.jpg"
            })),
        )
        .await
        .unwrap();

    let feed = feed_file(
        &json!([
            {"Product_ID": "P-1", "Product_Name": "Teak Chair", "Grade": "A", "image_url": "https://cdn.example/feed.jpg"},
            {"Product_Name": "No id"},
            {"Product_ID": "P-2", "Product_Name": "Oak Desk"}
        ])
        .to_string(),
    );
    let catalog = service(&store, feed.path().to_str().unwrap());

    let items = catalog.load().await;
    assert_eq!(items.len(), 2);

    let live = &items[0];
    assert_eq!(live.source, CatalogSource::Live);
    assert_eq!(live.product.product_name, "Teak Chair (live)");
    assert_eq!(live.product.grade, "A");
    assert_eq!(live.product.stock_quantity, 8.0);
    assert_eq!(live.product.image_url.as_deref(), Some("https://cdn.example/live.jpg"));

    let fallback = &items[1];
    assert_eq!(fallback.source, CatalogSource::Feed);
    assert_eq!(fallback.product.product_name, "Oak Desk");
    assert_eq!(fallback.product.image_url.as_deref(), Some(PLACEHOLDER_IMAGE_URL));
}

#[tokio::test]
async fn feed_image_is_used_when_store_has_none() {
    let store = MemoryStore::new();
    store
        .set(PRODUCTS_COLLECTION, "P-1", fields(json!({"Product_Name": "Chair"})))
        .await
        .unwrap();
    let feed = feed_file(r#"[{"Product_ID": "P-1", "Image_URL": "https://cdn.example/feed.jpg"}]"#);

    let items = service(&store, feed.path().to_str().unwrap()).load().await;
    assert_eq!(items[0].product.product_id, "P-1");
    assert_eq!(items[0].product.image_url.as_deref(), Some("https://cdn.example/feed.jpg"));
}

#[tokio::test]
async fn feed_image_is_kept_for_products_missing_from_the_store() {
    let store = MemoryStore::new();
    let feed = feed_file(
        &json!([
            {"Product_ID": "P-9", "image_url": "https://cdn.example/feed.jpg"},
            {"Product_ID": "P-10", "Image_URL": "https://cdn.example/upper.jpg"}
        ])
        .to_string(),
    );

    let items = service(&store, feed.path().to_str().unwrap()).load().await;
    assert_eq!(items[0].source, CatalogSource::Feed);
    assert_eq!(items[0].product.image_url.as_deref(), Some("https://cdn.example/feed.jpg"));
    assert_eq!(items[1].product.image_url.as_deref(), Some("https://cdn.example/upper.jpg"));
}

#[tokio::test]
async fn store_failure_for_any_item_yields_an_empty_catalog() {
    let inner = MemoryStore::new();
    inner
        .set(PRODUCTS_COLLECTION, "A", fields(json!({"Product_Name": "Chair"})))
        .await
        .unwrap();
    let store = FlakyStore {
        inner,
        broken_id: "B",
    };
    let feed = feed_file(
        &json!([
            {"Product_ID": "A"},
            {"Product_ID": "B"},
            {"Product_ID": "C"}
        ])
        .to_string(),
    );
    let config = Config {
        catalog_feed: feed.path().to_str().unwrap().to_string(),
        ..Config::default()
    };
    let catalog = CatalogService::new(Arc::new(store), &config).unwrap();

    assert!(catalog.load().await.is_empty());
    assert!(matches!(catalog.slide(0).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn unreadable_feed_yields_an_empty_catalog() {
    let store = MemoryStore::new();
    assert!(service(&store, "/nonexistent/products.json").load().await.is_empty());

    let broken = feed_file("{ not json");
    assert!(service(&store, broken.path().to_str().unwrap()).load().await.is_empty());
}

#[tokio::test]
async fn slides_wrap_in_both_directions() {
    let store = MemoryStore::new();
    let feed = feed_file(
        &json!([
            {"Product_ID": "A"},
            {"Product_ID": "B"},
            {"Product_ID": "C"}
        ])
        .to_string(),
    );
    let catalog = service(&store, feed.path().to_str().unwrap());

    let first = catalog.slide(0).await.unwrap();
    assert_eq!(first.product.product_id, "A");
    assert_eq!(first.prev_index, 2);
    assert_eq!(first.next_index, 1);

    let last = catalog.slide(2).await.unwrap();
    assert_eq!(last.next_index, 0);

    let wrapped = catalog.slide(4).await.unwrap();
    assert_eq!(wrapped.product.product_id, "B");
    assert_eq!(wrapped.total, 3);
}
