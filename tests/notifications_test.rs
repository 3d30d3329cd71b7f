use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use news_automation::traits::NotificationStore;
use news_automation::types::*;
use news_automation::{InMemoryNotificationStore, NotificationService};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn notification(is_read: bool, age_days: i64) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        notification_type: "automation_error".to_string(),
        title: "Something went wrong".to_string(),
        message: "details".to_string(),
        data: json!({}),
        is_read,
        created_at: Utc::now() - Duration::days(age_days),
    }
}

#[tokio::test]
async fn cleanup_deletes_old_read_but_retains_unread() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let store = Arc::new(InMemoryNotificationStore::new());
    let old_read = notification(true, 40);
    let old_unread = notification(false, 40);
    let recent_read = notification(true, 5);
    store.push(old_read.clone()).await;
    store.push(old_unread.clone()).await;
    store.push(recent_read.clone()).await;

    let service = NotificationService::new(store.clone());
    let deleted = service.cleanup_old_notifications(30).await?;
    assert_eq!(deleted, 1);

    let remaining: Vec<Uuid> = store.all().await.into_iter().map(|n| n.id).collect();
    assert!(remaining.contains(&old_unread.id));
    assert!(remaining.contains(&recent_read.id));
    assert!(!remaining.contains(&old_read.id));
    Ok(())
}

#[tokio::test]
async fn unread_count_and_read_flow() -> Result<()> {
    let store = InMemoryNotificationStore::new();

    let first = store
        .create(NewNotification {
            notification_type: "social_error".to_string(),
            title: "Posting failed".to_string(),
            message: "gave up".to_string(),
            data: json!({"queue_item_id": Uuid::new_v4()}),
        })
        .await?;
    store
        .create(NewNotification {
            notification_type: "automation_error".to_string(),
            title: "Enqueue failed".to_string(),
            message: "storage offline".to_string(),
            data: json!({}),
        })
        .await?;

    assert_eq!(store.unread_count().await?, 2);

    store.mark_as_read(first.id).await?;
    assert_eq!(store.unread_count().await?, 1);

    let unread = store.list(true, 1, 10).await?;
    assert_eq!(unread.data.len(), 1);
    assert_eq!(unread.data[0].notification_type, "automation_error");

    store.mark_all_as_read().await?;
    assert_eq!(store.unread_count().await?, 0);

    let all = store.list(false, 1, 10).await?;
    assert_eq!(all.meta.total_items, 2);

    store.delete(first.id).await?;
    let all = store.list(false, 1, 10).await?;
    assert_eq!(all.meta.total_items, 1);
    Ok(())
}

#[tokio::test]
async fn listing_paginates_newest_first() -> Result<()> {
    let store = InMemoryNotificationStore::new();
    for age in [3, 2, 1] {
        store.push(notification(false, age)).await;
    }

    let page = store.list(false, 1, 2).await?;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.meta.total_pages, 2);
    assert!(page.data[0].created_at > page.data[1].created_at);

    let last = store.list(false, 2, 2).await?;
    assert_eq!(last.data.len(), 1);
    Ok(())
}

/// Store whose writes always fail, to verify the service never propagates.
struct BrokenNotificationStore;

#[async_trait]
impl NotificationStore for BrokenNotificationStore {
    async fn create(&self, _new: NewNotification) -> Result<Notification> {
        Err(AutomationError::General("disk full".to_string()))
    }
    async fn unread_count(&self) -> Result<u64> {
        Ok(0)
    }
    async fn list(&self, _unread_only: bool, page: u32, per_page: u32) -> Result<NotificationPage> {
        Ok(NotificationPage {
            data: Vec::new(),
            meta: PageMeta::new(page, per_page, 0),
        })
    }
    async fn mark_as_read(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn mark_all_as_read(&self) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn delete_read_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

#[tokio::test]
async fn notify_is_best_effort_when_persistence_fails() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let service = NotificationService::new(Arc::new(BrokenNotificationStore));
    // Must log and return, not panic or propagate.
    service
        .notify("automation_error", "title", "message", json!({}))
        .await;
}
