#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use smart_retail_catalog::{
    error::{AppError, Result},
    services::store::{
        CollectionQuery, DocumentRecord, DocumentStore, Fields, SnapshotEvent, Subscription,
    },
};

/// 由测试手动推送订阅事件的存储
pub struct ScriptedStore {
    subscription: Mutex<Option<Subscription>>,
    pub queries: Mutex<Vec<CollectionQuery>>,
}

impl ScriptedStore {
    pub fn new() -> (mpsc::UnboundedSender<SnapshotEvent>, Arc<Self>) {
        let (tx, subscription) = Subscription::channel();
        let store = Arc::new(Self {
            subscription: Mutex::new(Some(subscription)),
            queries: Mutex::new(Vec::new()),
        });
        (tx, store)
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<DocumentRecord>> {
        Ok(None)
    }

    async fn list(&self, _query: &CollectionQuery) -> Result<Vec<DocumentRecord>> {
        Ok(Vec::new())
    }

    async fn set(&self, _collection: &str, _id: &str, _data: Fields) -> Result<()> {
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, _fields: Fields) -> Result<()> {
        Err(AppError::NotFound(format!("{}/{}", collection, id)))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_many(&self, _collection: &str, _ids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription> {
        self.queries.lock().push(query);
        self.subscription
            .lock()
            .take()
            .ok_or_else(|| AppError::Store("already subscribed".to_string()))
    }
}

pub fn record(id: &str, data: Value) -> DocumentRecord {
    DocumentRecord::new(id, data)
}

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}
