
use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::IgnoredAny, Deserialize};
use serde_json::{json, Value};
use surrealdb::{
    engine::any::{self, Any},
    opt::auth::Root,
    Surreal,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    error::{AppError, Result},
    services::store::{
        CollectionQuery, DocumentRecord, DocumentStore, Fields, SortDirection, Subscription,
    },
};

const KEY_FIELD: &str = "__key";

/// SurrealDB 文档存储
///
/// 集合映射为表，文档 ID 映射为记录 ID。订阅使用 live select，
/// 每收到一条变更通知就重新读取整个结果集。
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct KeyRow {
    #[serde(rename = "__key")]
    key: String,
}

impl SurrealStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let db = any::connect(config.database_url.as_str()).await?;
        db.signin(Root {
            username: &config.database_username,
            password: &config.database_password,
        })
        .await?;
        db.use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        let store = Self { db };
        store.verify_connection().await?;
        Ok(store)
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.db.query("INFO FOR DB").await.and_then(|r| r.check()) {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(classify(e))
            }
        }
    }

    async fn fetch(db: &Surreal<Any>, query: &CollectionQuery) -> Result<Vec<DocumentRecord>> {
        let mut sql = format!(
            "SELECT *, meta::id(id) AS {} OMIT id FROM type::table($tb)",
            KEY_FIELD
        );
        if let Some(order) = &query.order_by {
            if !FIELD_REGEX.is_match(&order.field) {
                return Err(AppError::bad_request("Invalid sort field"));
            }
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {}", order.field, direction));
        }

        let mut response = db
            .query(sql)
            .bind(("tb", query.collection.clone()))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        let rows: Vec<Value> = response.take(0).map_err(classify)?;

        let mut records: Vec<DocumentRecord> = rows.into_iter().filter_map(into_record).collect();
        if query.order_by.is_none() {
            records.sort_by(|a, b| a.id.cmp(&b.id));
        }
        Ok(records)
    }
}

static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

fn into_record(row: Value) -> Option<DocumentRecord> {
    let Value::Object(mut map) = row else {
        return None;
    };
    match map.remove(KEY_FIELD) {
        Some(Value::String(id)) => Some(DocumentRecord::new(id, Value::Object(map))),
        Some(other) => Some(DocumentRecord::new(other.to_string(), Value::Object(map))),
        None => None,
    }
}

/// 把存储端拒绝访问的错误与其他错误区分开
fn classify(err: surrealdb::Error) -> AppError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("not allowed") || lowered.contains("iam") {
        AppError::PermissionDenied(message)
    } else {
        AppError::Database(err)
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<DocumentRecord>> {
        let sql = format!(
            "SELECT *, meta::id(id) AS {} OMIT id FROM type::thing($tb, $id)",
            KEY_FIELD
        );
        let mut response = self
            .db
            .query(sql)
            .bind(("tb", collection.to_string()))
            .bind(("id", id.to_string()))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        let rows: Vec<Value> = response.take(0).map_err(classify)?;
        Ok(rows.into_iter().find_map(into_record))
    }

    async fn list(&self, query: &CollectionQuery) -> Result<Vec<DocumentRecord>> {
        Self::fetch(&self.db, query).await
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        debug!("Writing record {}:{}", collection, id);
        self.db
            .query("UPDATE type::thing($tb, $id) CONTENT $data RETURN NONE")
            .bind(("tb", collection.to_string()))
            .bind(("id", id.to_string()))
            .bind(("data", Value::Object(data)))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        debug!("Merging {} fields into {}:{}", fields.len(), collection, id);
        let mut response = self
            .db
            .query(format!(
                "UPDATE type::table($tb) MERGE $data WHERE id = type::thing($tb, $id) RETURN meta::id(id) AS {}",
                KEY_FIELD
            ))
            .bind(("tb", collection.to_string()))
            .bind(("id", id.to_string()))
            .bind(("data", Value::Object(fields)))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        let updated: Vec<KeyRow> = response.take(0).map_err(classify)?;
        if updated.iter().any(|row| row.key == id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("No document to update: {}/{}", collection, id)))
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.db
            .query("DELETE type::thing($tb, $id)")
            .bind(("tb", collection.to_string()))
            .bind(("id", id.to_string()))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<()> {
        debug!("Batch deleting {} records from {}", ids.len(), collection);
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::table($tb) WHERE meta::id(id) IN $ids; \
                 COMMIT TRANSACTION;",
            )
            .bind(("tb", collection.to_string()))
            .bind(("ids", json!(ids)))
            .await
            .and_then(|r| r.check())
            .map_err(classify)?;
        Ok(())
    }

    async fn subscribe(&self, query: CollectionQuery) -> Result<Subscription> {
        let initial = Self::fetch(&self.db, &query).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(initial));

        let db = self.db.clone();
        let listener = tokio::spawn(async move {
            let mut stream = match db
                .select::<Vec<IgnoredAny>>(query.collection.as_str())
                .live()
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(classify(e)));
                    return;
                }
            };

            while let Some(notification) = stream.next().await {
                if let Err(e) = notification {
                    warn!("Live query notification error on '{}': {}", query.collection, e);
                }
                let event = Self::fetch(&db, &query).await;
                let failed = event.is_err();
                if tx.send(event).is_err() || failed {
                    break;
                }
            }
            debug!("Live query on '{}' ended", query.collection);
        });

        Ok(Subscription::new(rx, Some(listener)))
    }
}
