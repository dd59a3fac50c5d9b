mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{record, ScriptedStore};
use smart_retail_catalog::{
    error::AppError,
    models::{notification::Notification, product::Product},
    services::{
        mirror::{LiveMirror, MirrorStatus},
        notification::{notifications_query, NotificationService},
        store::{CollectionQuery, SortDirection},
    },
};

fn ids(views: &[smart_retail_catalog::models::notification::NotificationView]) -> Vec<String> {
    views.iter().map(|v| v.notification.id.clone()).collect()
}

#[tokio::test]
async fn snapshot_equals_latest_event_payload() {
    let (tx, store) = ScriptedStore::new();
    tx.send(Ok(vec![
        record("P-1", json!({"Product_Name": "Chair"})),
        record("P-2", json!({"Product_Name": "Desk"})),
        record("P-3", json!({"Product_Name": "Shelf"})),
    ]))
    .unwrap();

    let mirror = LiveMirror::<Product>::activate(store, CollectionQuery::new("products"))
        .await
        .unwrap();
    assert_eq!(mirror.snapshot().len(), 3);
    assert_eq!(mirror.status(), MirrorStatus::Live);

    tx.send(Ok(vec![record("P-2", json!({"Product_Name": "Desk", "Stock_Quantity": 1}))]))
        .unwrap();
    let snapshot = mirror.wait_for(|s| s.version == 2).await.unwrap();

    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].product_id, "P-2");
    assert_eq!(snapshot.items[0].stock_quantity, 1.0);
    assert_eq!(snapshot.diff.removed, vec!["P-1".to_string(), "P-3".to_string()]);
    assert_eq!(snapshot.diff.modified, vec!["P-2".to_string()]);
}

#[tokio::test]
async fn notification_views_follow_each_event() {
    let (tx, store) = ScriptedStore::new();
    tx.send(Ok(vec![record("1", json!({"read": false}))])).unwrap();

    let mirror = Arc::new(
        LiveMirror::<Notification>::activate(store.clone(), notifications_query())
            .await
            .unwrap(),
    );
    let service = NotificationService::from_mirror(mirror.clone(), 5);

    assert_eq!(ids(&service.feed().unread), vec!["1"]);
    assert!(service.history().is_empty());

    tx.send(Ok(vec![
        record("1", json!({"read": true})),
        record("2", json!({"read": false})),
    ]))
    .unwrap();
    mirror.wait_for(|s| s.version == 2).await.unwrap();

    assert_eq!(ids(&service.feed().unread), vec!["2"]);
    assert_eq!(service.feed().unread_count, 1);
    assert_eq!(ids(&service.history()), vec!["1"]);

    let queries = store.queries.lock();
    assert_eq!(queries.len(), 1);
    let order = queries[0].order_by.as_ref().unwrap();
    assert_eq!(order.field, "timestamp");
    assert_eq!(order.direction, SortDirection::Desc);
}

#[tokio::test]
async fn undecodable_documents_are_skipped() {
    let (tx, store) = ScriptedStore::new();
    tx.send(Ok(vec![
        record("1", json!({"read": false})),
        record("2", json!({"read": "not-a-bool"})),
    ]))
    .unwrap();

    let mirror = LiveMirror::<Notification>::activate(store, notifications_query())
        .await
        .unwrap();
    assert_eq!(mirror.snapshot().len(), 1);
    assert!(mirror.contains("1"));
    assert!(!mirror.contains("2"));
}

#[tokio::test]
async fn permission_failure_is_recorded_and_last_snapshot_kept() {
    let (tx, store) = ScriptedStore::new();
    tx.send(Ok(vec![record("P-1", json!({"Product_Name": "Chair"}))]))
        .unwrap();

    let mirror = LiveMirror::<Product>::activate(store, CollectionQuery::new("products"))
        .await
        .unwrap();

    tx.send(Err(AppError::permission_denied("rules changed"))).unwrap();
    let snapshot = mirror
        .wait_for(|s| matches!(s.status, MirrorStatus::Failed { .. }))
        .await
        .unwrap();

    assert_eq!(
        snapshot.status,
        MirrorStatus::Failed {
            message: "Permission denied: rules changed".to_string(),
            permission_denied: true,
        }
    );
    assert!(mirror.last_error().is_some());
    assert_eq!(mirror.snapshot().len(), 1);
}

#[tokio::test]
async fn dropping_the_mirror_releases_the_subscription() {
    let (tx, store) = ScriptedStore::new();
    tx.send(Ok(Vec::new())).unwrap();

    let mirror = LiveMirror::<Product>::activate(store, CollectionQuery::new("products"))
        .await
        .unwrap();
    assert!(!tx.is_closed());

    drop(mirror);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !tx.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("subscription should be released after drop");
}
