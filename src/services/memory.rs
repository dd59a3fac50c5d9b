use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::{
    error::{AppError, Result},
    services::store::{
        sort_records, CollectionQuery, DocumentRecord, DocumentStore, Fields, Subscription,
    },
};

/// 集合访问规则，用于模拟存储端的安全规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    ReadWrite,
    ReadOnly,
    Denied,
}

/// 进程内文档存储
///
/// 开发环境和测试使用。每次写入都会向该集合的所有订阅推送完整结果集。
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
    rules: RwLock<HashMap<String, AccessRule>>,
    changes: broadcast::Sender<String>,
}

impl MemoryInner {
    fn rule(&self, collection: &str) -> AccessRule {
        self.rules
            .read()
            .get(collection)
            .copied()
            .unwrap_or(AccessRule::ReadWrite)
    }

    fn check_read(&self, collection: &str) -> Result<()> {
        match self.rule(collection) {
            AccessRule::Denied => Err(AppError::PermissionDenied(format!(
                "read access to '{}' is not allowed",
                collection
            ))),
            _ => Ok(()),
        }
    }

    fn check_write(&self, collection: &str) -> Result<()> {
        match self.rule(collection) {
            AccessRule::ReadWrite => Ok(()),
            _ => Err(AppError::PermissionDenied(format!(
                "write access to '{}' is not allowed",
                collection
            ))),
        }
    }

    fn snapshot(&self, query: &CollectionQuery) -> Vec<DocumentRecord> {
        let collections = self.collections.read();
        let mut records: Vec<DocumentRecord> = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| DocumentRecord::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default();
        sort_records(&mut records, query.order_by.as_ref());
        records
    }

    fn notify(&self, collection: &str) {
        // 没有订阅者时发送失败是正常情况
        let _ = self.changes.send(collection.to_string());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(MemoryInner {
                collections: RwLock::new(HashMap::new()),
                rules: RwLock::new(HashMap::new()),
                changes,
            }),
        }
    }

    pub fn set_access(&self, collection: &str, rule: AccessRule) {
        debug!("Access rule for '{}' set to {:?}", collection, rule);
        self.inner.rules.write().insert(collection.to_string(), rule);
    }

    /// 集合中的文档数量
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>> {
        self.inner.check_read(collection)?;
        let collections = self.inner.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| DocumentRecord::new(id, data.clone())))
    }

    async fn list(&self, query: &CollectionQuery) -> Result<Vec<DocumentRecord>> {
        self.inner.check_read(&query.collection)?;
        Ok(self.inner.snapshot(query))
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        self.inner.check_write(collection)?;
        {
            let mut collections = self.inner.collections.write();
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), Value::Object(data));
        }
        self.inner.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.inner.check_write(collection)?;
        {
            let mut collections = self.inner.collections.write();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| AppError::NotFound(format!("No document to update: {}/{}", collection, id)))?;
            match doc {
                Value::Object(existing) => {
                    for (key, value) in fields {
                        existing.insert(key, value);
                    }
                }
                other => *other = Value::Object(fields),
            }
        }
        self.inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.check_write(collection)?;
        let removed = {
            let mut collections = self.inner.collections.write();
            collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        if removed {
            self.inner.notify(collection);
        }
        Ok(())
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<()> {
        self.inner.check_write(collection)?;
        let removed = {
            let mut collections = self.inner.collections.write();
            match collections.get_mut(collection) {
                Some(docs) => ids.iter().filter(|id| docs.remove(id.as_str()).is_some()).count(),
                None => 0,
            }
        };
        debug!("Batch removed {} of {} documents from '{}'", removed, ids.len(), collection);
        if removed > 0 {
            self.inner.notify(collection);
        }
        Ok(())
    }

    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription> {
        self.inner.check_read(&query.collection)?;

        // 先订阅变更再取初始快照，避免漏掉中间的写入
        let mut changes = self.inner.changes.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(self.inner.snapshot(&query)));

        let inner = self.inner.clone();
        let listener = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(collection) if collection == query.collection => {}
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscription on '{}' lagged by {} changes", query.collection, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let event = match inner.check_read(&query.collection) {
                    Ok(()) => Ok(inner.snapshot(&query)),
                    Err(e) => Err(e),
                };
                let failed = event.is_err();
                if tx.send(event).is_err() || failed {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, Some(listener)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[tokio::test]
    async fn test_set_overwrites_and_update_merges() {
        let store = MemoryStore::new();
        store.set("products", "P-1", fields(json!({"a": 1, "b": 2}))).await.unwrap();
        store.set("products", "P-1", fields(json!({"a": 5}))).await.unwrap();

        let doc = store.get("products", "P-1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 5}));

        store.update("products", "P-1", fields(json!({"b": 9}))).await.unwrap();
        let doc = store.get("products", "P-1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 5, "b": 9}));
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = assert_err!(store.update("products", "ghost", fields(json!({"a": 1}))).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_denied_collection_rejects_reads() {
        let store = MemoryStore::new();
        store.set("accounts", "a", fields(json!({}))).await.unwrap();
        store.set_access("accounts", AccessRule::Denied);

        assert!(assert_err!(store.get("accounts", "a").await).is_permission_denied());
        assert!(assert_err!(store.list(&CollectionQuery::new("accounts")).await).is_permission_denied());
        assert_ok!(store.list(&CollectionQuery::new("products")).await);
    }

    #[tokio::test]
    async fn test_read_only_collection_rejects_batch_delete() {
        let store = MemoryStore::new();
        for id in ["1", "2", "3"] {
            store.set("products", id, fields(json!({}))).await.unwrap();
        }
        store.set_access("products", AccessRule::ReadOnly);

        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let err = store.delete_many("products", &ids).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert_eq!(store.len("products"), 3);
    }

    #[tokio::test]
    async fn test_subscription_delivers_initial_and_changed_sets() {
        let store = MemoryStore::new();
        store.set("products", "1", fields(json!({"n": 1}))).await.unwrap();

        let mut sub = store.subscribe(CollectionQuery::new("products")).await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store.set("other", "x", fields(json!({}))).await.unwrap();
        store.set("products", "2", fields(json!({"n": 2}))).await.unwrap();
        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
