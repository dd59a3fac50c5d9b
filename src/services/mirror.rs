//! 实时文档镜像
//!
//! 对一个远程集合保持一个订阅，在内存中维护有序快照。每次变更事件都整体替换快照，
//! 并通过 `watch` 通知所有视图。修改操作直接委托给存储，本地状态等待订阅回推后更新。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    error::{AppError, Result},
    services::store::{CollectionQuery, DocumentRecord, DocumentStore, Fields, Subscription},
};

/// 可被镜像的文档类型
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// 文档 ID 在数据中的字段名
    const ID_FIELD: &'static str;

    fn document_id(&self) -> &str;

    /// 从存储记录解码；数据中缺少 ID 字段时用记录 ID 补上
    fn from_record(record: DocumentRecord) -> Result<Self> {
        let DocumentRecord { id, mut data } = record;
        if let Value::Object(map) = &mut data {
            map.entry(Self::ID_FIELD.to_string())
                .or_insert_with(|| Value::String(id));
        }
        Ok(serde_json::from_value(data)?)
    }

    /// 写入存储的字段
    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::internal("Document did not serialize to an object")),
        }
    }
}

/// 相邻两次快照之间的差异（按文档 ID）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn between(previous: &HashMap<String, Value>, next: &[DocumentRecord]) -> Self {
        let mut diff = SnapshotDiff::default();
        for record in next {
            match previous.get(&record.id) {
                None => diff.added.push(record.id.clone()),
                Some(old) if old != &record.data => diff.modified.push(record.id.clone()),
                Some(_) => {}
            }
        }
        let next_ids: std::collections::HashSet<&str> = next.iter().map(|r| r.id.as_str()).collect();
        diff.removed = previous
            .keys()
            .filter(|id| !next_ids.contains(id.as_str()))
            .cloned()
            .collect();
        diff.removed.sort();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// 镜像的订阅状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MirrorStatus {
    Loading,
    Live,
    Failed { message: String, permission_denied: bool },
}

/// 某一时刻的镜像快照
#[derive(Debug, Clone)]
pub struct MirrorSnapshot<T> {
    pub version: u64,
    pub items: Arc<Vec<T>>,
    pub diff: SnapshotDiff,
    pub status: MirrorStatus,
}

impl<T> MirrorSnapshot<T> {
    fn loading() -> Self {
        Self {
            version: 0,
            items: Arc::new(Vec::new()),
            diff: SnapshotDiff::default(),
            status: MirrorStatus::Loading,
        }
    }
}

/// 把订阅事件应用到 watch 通道
struct SnapshotApplier<T> {
    collection: String,
    previous: HashMap<String, Value>,
    version: u64,
    tx: watch::Sender<MirrorSnapshot<T>>,
}

impl<T: Document> SnapshotApplier<T> {
    fn apply(&mut self, records: Vec<DocumentRecord>) {
        let diff = SnapshotDiff::between(&self.previous, &records);
        let mut next = HashMap::with_capacity(records.len());
        let mut items = Vec::with_capacity(records.len());

        for record in records {
            next.insert(record.id.clone(), record.data.clone());
            let id = record.id.clone();
            match T::from_record(record) {
                Ok(item) => items.push(item),
                Err(e) => warn!("Skipping undecodable document {}/{}: {}", self.collection, id, e),
            }
        }

        self.previous = next;
        self.version += 1;
        debug!(
            "Store update: {} documents in '{}' (+{} ~{} -{})",
            items.len(),
            self.collection,
            diff.added.len(),
            diff.modified.len(),
            diff.removed.len()
        );

        self.tx.send_replace(MirrorSnapshot {
            version: self.version,
            items: Arc::new(items),
            diff,
            status: MirrorStatus::Live,
        });
    }

    fn fail(&mut self, err: &AppError) {
        error!("Error listening to '{}': {}", self.collection, err);
        let status = MirrorStatus::Failed {
            message: err.to_string(),
            permission_denied: err.is_permission_denied(),
        };
        self.tx.send_modify(|snapshot| snapshot.status = status);
    }

    /// 返回是否继续监听
    fn handle(&mut self, event: Option<Result<Vec<DocumentRecord>>>) -> bool {
        match event {
            Some(Ok(records)) => {
                self.apply(records);
                true
            }
            Some(Err(e)) => {
                self.fail(&e);
                false
            }
            None => {
                warn!("Subscription on '{}' closed by the store", self.collection);
                false
            }
        }
    }
}

/// 一个集合的实时镜像
///
/// 激活时打开一个订阅；丢弃时停止监听并释放订阅。
pub struct LiveMirror<T: Document> {
    store: Arc<dyn DocumentStore>,
    query: CollectionQuery,
    snapshot: watch::Receiver<MirrorSnapshot<T>>,
    listener: Option<JoinHandle<()>>,
}

impl<T: Document> LiveMirror<T> {
    /// 打开订阅并等待第一次推送
    pub async fn activate(store: Arc<dyn DocumentStore>, query: CollectionQuery) -> Result<Self> {
        info!("Setting up live mirror for '{}'", query.collection);

        let mut subscription = store.subscribe(query.clone()).await?;
        let (tx, rx) = watch::channel(MirrorSnapshot::loading());
        let mut applier = SnapshotApplier::<T> {
            collection: query.collection.clone(),
            previous: HashMap::new(),
            version: 0,
            tx,
        };

        let listener = if applier.handle(subscription.next().await) {
            Some(tokio::spawn(Self::listen(subscription, applier)))
        } else {
            None
        };

        Ok(Self {
            store,
            query,
            snapshot: rx,
            listener,
        })
    }

    async fn listen(mut subscription: Subscription, mut applier: SnapshotApplier<T>) {
        while applier.handle(subscription.next().await) {}
        debug!("Live mirror listener for '{}' stopped", applier.collection);
    }

    /// 当前快照（同步读取）
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.snapshot.borrow().items.clone()
    }

    pub fn status(&self) -> MirrorStatus {
        self.snapshot.borrow().status.clone()
    }

    /// 订阅失败时的错误信息；之前的快照仍可读取
    pub fn last_error(&self) -> Option<String> {
        match &self.snapshot.borrow().status {
            MirrorStatus::Failed { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    pub fn find(&self, id: &str) -> Option<T> {
        self.snapshot
            .borrow()
            .items
            .iter()
            .find(|item| item.document_id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot
            .borrow()
            .items
            .iter()
            .any(|item| item.document_id() == id)
    }

    /// 视图订阅快照变化
    pub fn watch(&self) -> watch::Receiver<MirrorSnapshot<T>> {
        self.snapshot.clone()
    }

    /// 等待满足条件的快照
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<MirrorSnapshot<T>>
    where
        F: FnMut(&MirrorSnapshot<T>) -> bool,
    {
        let mut rx = self.snapshot.clone();
        loop {
            {
                let current = rx.borrow_and_update();
                if predicate(&current) {
                    return Ok(current.clone());
                }
            }
            rx.changed().await.map_err(|_| {
                AppError::Store(format!("Live mirror for '{}' stopped", self.query.collection))
            })?;
        }
    }

    /// 整体写入（以自然 ID 为键的 upsert）
    pub async fn create(&self, entity: &T) -> Result<()> {
        let id = entity.document_id();
        if id.trim().is_empty() {
            return Err(AppError::validation("Document ID must not be empty"));
        }
        debug!("Attempting to write {}/{}", self.query.collection, id);
        self.store
            .set(&self.query.collection, id, entity.to_fields()?)
            .await
            .map_err(|e| {
                error!("Error writing {}/{}: {}", self.query.collection, id, e);
                e
            })
    }

    /// 部分合并更新
    pub async fn update(&self, id: &str, fields: Fields) -> Result<()> {
        debug!("Attempting to update {}/{} ({} fields)", self.query.collection, id, fields.len());
        self.store
            .update(&self.query.collection, id, fields)
            .await
            .map_err(|e| {
                error!("Error updating {}/{}: {}", self.query.collection, id, e);
                e
            })
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!("Attempting to delete {}/{}", self.query.collection, id);
        self.store
            .delete(&self.query.collection, id)
            .await
            .map_err(|e| {
                error!("Error deleting {}/{}: {}", self.query.collection, id, e);
                e
            })
    }

    /// 原子批量删除
    pub async fn delete_many(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!("Attempting to batch delete {} documents from '{}'", ids.len(), self.query.collection);
        self.store
            .delete_many(&self.query.collection, ids)
            .await
            .map_err(|e| {
                error!("Error batch deleting from '{}': {}", self.query.collection, e);
                e
            })
    }
}

impl<T: Document> Drop for LiveMirror<T> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            debug!("Releasing live mirror subscription for '{}'", self.query.collection);
            listener.abort();
        }
    }
}
