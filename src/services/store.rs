//! 远程文档存储的抽象
//!
//! 以集合名和文档 ID 定位文档，支持读取、整体覆盖写入、部分合并更新、
//! 删除、原子批量删除，以及每次变更都推送完整结果集的订阅。

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::error::Result;

/// 文档字段（JSON 对象）
pub type Fields = Map<String, Value>;

/// 存储中的一条文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub data: Value,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// 服务端排序子句
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// 对一个集合的查询
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection: String,
    pub order_by: Option<OrderBy>,
}

impl CollectionQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }
}

/// 订阅推送的一次完整结果集
pub type SnapshotEvent = Result<Vec<DocumentRecord>>;

/// 一个打开的订阅
///
/// 丢弃时会中止存储端的监听任务。
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
    listener: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SnapshotEvent>, listener: Option<JoinHandle<()>>) -> Self {
        Self { rx, listener }
    }

    /// 创建一对发送端与订阅，供没有后台任务的实现使用
    pub fn channel() -> (mpsc::UnboundedSender<SnapshotEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, None))
    }

    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取单个文档
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>>;

    /// 读取集合中的全部文档，按查询的排序子句排序
    async fn list(&self, query: &CollectionQuery) -> Result<Vec<DocumentRecord>>;

    /// 整体覆盖写入；同 ID 文档被替换而不是合并
    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()>;

    /// 部分合并更新；文档不存在时返回 `NotFound`
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// 原子批量删除：要么全部删除，要么全部保留
    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// 订阅集合变更，首个事件是当前结果集
    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription>;
}

/// 按排序子句对文档排序；未指定时按文档 ID 排序
pub fn sort_records(records: &mut [DocumentRecord], order_by: Option<&OrderBy>) {
    match order_by {
        Some(order) => records.sort_by(|a, b| {
            let ordering = compare_values(a.data.get(&order.field), b.data.get(&order.field));
            match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }),
        None => records.sort_by(|a, b| a.id.cmp(&b.id)),
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::Object(obj)) if timestamp_seconds(obj).is_some() => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn timestamp_seconds(obj: &Map<String, Value>) -> Option<f64> {
    let seconds = obj.get("seconds").or_else(|| obj.get("_seconds"))?.as_f64()?;
    let nanos = obj
        .get("nanoseconds")
        .or_else(|| obj.get("_nanoseconds"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Some(seconds * 1000.0 + nanos / 1_000_000.0)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => timestamp_seconds(obj),
        _ => None,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank_a == 2 => numeric(x)
            .zip(numeric(y))
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_newest_first_by_timestamp() {
        let mut records = vec![
            DocumentRecord::new("a", json!({"timestamp": 100})),
            DocumentRecord::new("b", json!({"timestamp": 300})),
            DocumentRecord::new("c", json!({})),
            DocumentRecord::new("d", json!({"timestamp": 200})),
        ];
        let order = OrderBy {
            field: "timestamp".to_string(),
            direction: SortDirection::Desc,
        };
        sort_records(&mut records, Some(&order));
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_without_clause_uses_document_id() {
        let mut records = vec![
            DocumentRecord::new("P-2", json!({})),
            DocumentRecord::new("P-1", json!({})),
        ];
        sort_records(&mut records, None);
        assert_eq!(records[0].id, "P-1");
    }
}
