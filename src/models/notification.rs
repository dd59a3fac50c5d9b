use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 通知文档（集合 `notifications`，ID 由存储分配）
///
/// `read` 是三值的：`Some(true)`、`Some(false)` 或缺失。
/// 生产者写入的其他字段保存在 `extra` 中原样返回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read == Some(false)
    }

    pub fn is_read(&self) -> bool {
        self.read == Some(true)
    }

    /// 时间戳可能是 RFC 3339 字符串、毫秒数或 `{seconds, nanoseconds}` 对象
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        match self.timestamp.as_ref()? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => {
                let millis = n.as_f64()? as i64;
                Utc.timestamp_millis_opt(millis).single()
            }
            Value::Object(obj) => {
                let seconds = obj
                    .get("seconds")
                    .or_else(|| obj.get("_seconds"))
                    .and_then(Value::as_i64)?;
                let nanos = obj
                    .get("nanoseconds")
                    .or_else(|| obj.get("_nanoseconds"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32;
                Utc.timestamp_opt(seconds, nanos).single()
            }
            _ => None,
        }
    }
}

/// 通知视图中的一条
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub display_time: Option<String>,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        let display_time = notification
            .timestamp_utc()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());
        Self {
            notification,
            display_time,
        }
    }
}

/// 仪表盘通知卡片
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub unread: Vec<NotificationView>,
    pub unread_count: usize,
}
