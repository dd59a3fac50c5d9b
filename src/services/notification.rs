use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppError, Result},
    models::notification::{Notification, NotificationFeed, NotificationView},
    services::{
        mirror::{Document, LiveMirror},
        store::{CollectionQuery, DocumentStore, Fields, SortDirection},
        views,
    },
};

pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

impl Document for Notification {
    const ID_FIELD: &'static str = "id";

    fn document_id(&self) -> &str {
        &self.id
    }

    /// ID 由存储分配，不写入文档本身
    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove(Self::ID_FIELD);
                Ok(map)
            }
            _ => Err(AppError::internal("Notification did not serialize to an object")),
        }
    }
}

/// 通知订阅的查询：按时间戳倒序
pub fn notifications_query() -> CollectionQuery {
    CollectionQuery::new(NOTIFICATIONS_COLLECTION).order_by("timestamp", SortDirection::Desc)
}

#[derive(Clone)]
pub struct NotificationService {
    mirror: Arc<LiveMirror<Notification>>,
    feed_limit: usize,
}

impl NotificationService {
    pub async fn new(store: Arc<dyn DocumentStore>, feed_limit: usize) -> Result<Self> {
        let mirror = LiveMirror::activate(store, notifications_query()).await?;
        Ok(Self::from_mirror(Arc::new(mirror), feed_limit))
    }

    pub fn from_mirror(mirror: Arc<LiveMirror<Notification>>, feed_limit: usize) -> Self {
        Self { mirror, feed_limit }
    }

    pub fn mirror(&self) -> &Arc<LiveMirror<Notification>> {
        &self.mirror
    }

    /// 仪表盘卡片：最新的未读通知和未读总数
    pub fn feed(&self) -> NotificationFeed {
        let snapshot = self.mirror.snapshot();
        NotificationFeed {
            unread: views::unread_feed(&snapshot, self.feed_limit),
            unread_count: views::unread_count(&snapshot),
        }
    }

    pub fn history(&self) -> Vec<NotificationView> {
        views::read_history(&self.mirror.snapshot())
    }

    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("read".to_string(), json!(true));
        self.mirror.update(id, fields).await?;
        info!("Notification marked as read: {}", id);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.mirror.delete(id).await?;
        info!("Notification deleted: {}", id);
        Ok(())
    }

    /// 一次批量删除快照中的全部通知
    pub async fn clear_all(&self) -> Result<usize> {
        let ids: Vec<String> = self.mirror.snapshot().iter().map(|n| n.id.clone()).collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.mirror.delete_many(&ids).await?;
        info!("Cleared {} notifications", ids.len());
        Ok(ids.len())
    }
}
