use crate::traits::NotificationStore;
use crate::types::{NewNotification, Notification, NotificationPage, PageMeta, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Pool, Postgres, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

/// Postgres-backed notification log.
pub struct PgNotificationStore {
    db: Pool<Postgres>,
}

impl PgNotificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn map_row(row: &PgRow) -> Result<Notification> {
        Ok(Notification {
            id: row.try_get("id")?,
            notification_type: row.try_get("notification_type")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            data: row.try_get("data")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO notifications (id, notification_type, title, message, data, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, false, $6)
            "#,
        )
        .bind(id)
        .bind(&new.notification_type)
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.data)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Notification {
            id,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            data: new.data,
            is_read: false,
            created_at: now,
        })
    }

    async fn unread_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = false")
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self, unread_only: bool, page: u32, per_page: u32) -> Result<NotificationPage> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = (page - 1) as i64 * per_page as i64;

        let (total, rows) = if unread_only {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = false")
                    .fetch_one(&self.db)
                    .await?;
            let rows = sqlx::query(
                r#"
                SELECT * FROM notifications WHERE is_read = false
                ORDER BY created_at DESC LIMIT $1 OFFSET $2
                "#,
            )
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
            (total, rows)
        } else {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
                .fetch_one(&self.db)
                .await?;
            let rows = sqlx::query(
                "SELECT * FROM notifications ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
            (total, rows)
        };

        let data = rows.iter().map(Self::map_row).collect::<Result<Vec<_>>>()?;

        Ok(NotificationPage {
            data,
            meta: PageMeta::new(page, per_page, total.max(0) as u64),
        })
    }

    async fn mark_as_read(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn mark_all_as_read(&self) -> Result<()> {
        sqlx::query("UPDATE notifications SET is_read = true WHERE is_read = false")
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_read_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE is_read = true AND created_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// In-memory notification log for tests and local demo wiring.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-built notification, e.g. one with a backdated timestamp.
    pub async fn push(&self, notification: Notification) {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification);
    }

    pub async fn all(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.notifications.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            data: new.data,
            is_read: false,
            created_at: Utc::now(),
        };
        self.push(notification.clone()).await;
        Ok(notification)
    }

    async fn unread_count(&self) -> Result<u64> {
        let notifications = self.notifications.read().await;
        Ok(notifications.values().filter(|n| !n.is_read).count() as u64)
    }

    async fn list(&self, unread_only: bool, page: u32, per_page: u32) -> Result<NotificationPage> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let notifications = self.notifications.read().await;
        let mut matching: Vec<Notification> = notifications
            .values()
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let start = ((page - 1) * per_page) as usize;
        let data: Vec<Notification> = matching
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Ok(NotificationPage {
            data,
            meta: PageMeta::new(page, per_page, total),
        })
    }

    async fn mark_as_read(&self, id: Uuid) -> Result<()> {
        if let Some(notification) = self.notifications.write().await.get_mut(&id) {
            notification.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_as_read(&self) -> Result<()> {
        for notification in self.notifications.write().await.values_mut() {
            notification.is_read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.notifications.write().await.remove(&id);
        Ok(())
    }

    async fn delete_read_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut notifications = self.notifications.write().await;
        let before = notifications.len();
        notifications.retain(|_, n| !n.is_read || n.created_at >= cutoff);
        Ok((before - notifications.len()) as u64)
    }
}

/// Best-effort facade over the notification store. Notifications must never
/// crash the pipeline that raised them, so persist failures are logged and
/// swallowed here.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub async fn notify(
        &self,
        notification_type: &str,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) {
        let new = NewNotification {
            notification_type: notification_type.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            data,
        };

        match self.store.create(new).await {
            Ok(notification) => {
                info!(
                    "Raised {} notification: {}",
                    notification.notification_type, notification.title
                );
            }
            Err(e) => {
                error!("Failed to persist {} notification: {}", notification_type, e);
            }
        }
    }

    /// Delete read notifications older than `days_old` days. Unread ones are
    /// kept regardless of age.
    pub async fn cleanup_old_notifications(&self, days_old: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days_old);
        let deleted = self.store.delete_read_older_than(cutoff).await?;
        if deleted > 0 {
            info!("Cleaned up {} read notifications older than {} days", deleted, days_old);
        }
        Ok(deleted)
    }
}
