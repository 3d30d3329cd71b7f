use crate::traits::QueueStore;
use crate::types::{
    AutomationError, PageMeta, QueueFilter, QueueItem, QueueItemPatch, QueuePage, QueueStage,
    Result, SocialStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Pool, Postgres, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Postgres-backed automation queue.
pub struct PgQueueStore {
    db: Pool<Postgres>,
}

impl PgQueueStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn map_row(row: &PgRow) -> Result<QueueItem> {
        let stage: String = row.try_get("stage")?;
        let social_status: String = row.try_get("social_status")?;
        let retry_count: i32 = row.try_get("retry_count")?;

        Ok(QueueItem {
            id: row.try_get("id")?,
            source_article_id: row.try_get("source_article_id")?,
            stage: QueueStage::parse(&stage)?,
            ai_rewritten_title: row.try_get("ai_rewritten_title")?,
            ai_rewritten_excerpt: row.try_get("ai_rewritten_excerpt")?,
            ai_rewritten_content: row.try_get("ai_rewritten_content")?,
            ai_processed_at: row.try_get("ai_processed_at")?,
            created_article_id: row.try_get("created_article_id")?,
            published_at: row.try_get("published_at")?,
            social_platform: row.try_get("social_platform")?,
            social_status: SocialStatus::parse(&social_status)?,
            social_scheduled_at: row.try_get("social_scheduled_at")?,
            social_posted_at: row.try_get("social_posted_at")?,
            social_post_id: row.try_get("social_post_id")?,
            error_message: row.try_get("error_message")?,
            retry_count: retry_count.max(0) as u32,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn find_by_source_article(&self, source_article_id: Uuid) -> Result<Option<QueueItem>> {
        let row = sqlx::query("SELECT * FROM automation_queue WHERE source_article_id = $1")
            .bind(source_article_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QueueItem>> {
        let row = sqlx::query("SELECT * FROM automation_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn create(
        &self,
        source_article_id: Uuid,
        stage: QueueStage,
        social_platform: &str,
    ) -> Result<QueueItem> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO automation_queue
                (id, source_article_id, stage, social_platform, social_status,
                 retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7)
            "#,
        )
        .bind(id)
        .bind(source_article_id)
        .bind(stage.as_str())
        .bind(social_platform)
        .bind(SocialStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!(
            "Created queue item {} for source article {}",
            id, source_article_id
        );

        self.find_by_id(id)
            .await?
            .ok_or(AutomationError::QueueItemNotFound { id })
    }

    async fn update(&self, id: Uuid, patch: QueueItemPatch) -> Result<QueueItem> {
        // Fetch-merge-write keeps the patch semantics identical to the
        // in-memory store; all mutation is single-item keyed.
        let mut item = self
            .find_by_id(id)
            .await?
            .ok_or(AutomationError::QueueItemNotFound { id })?;

        patch.apply(&mut item);

        sqlx::query(
            r#"
            UPDATE automation_queue
            SET stage = $1, social_status = $2, ai_rewritten_title = $3,
                ai_rewritten_excerpt = $4, ai_rewritten_content = $5,
                ai_processed_at = $6, created_article_id = $7, published_at = $8,
                social_scheduled_at = $9, social_posted_at = $10,
                social_post_id = $11, error_message = $12, retry_count = $13,
                updated_at = $14
            WHERE id = $15
            "#,
        )
        .bind(item.stage.as_str())
        .bind(item.social_status.as_str())
        .bind(&item.ai_rewritten_title)
        .bind(&item.ai_rewritten_excerpt)
        .bind(&item.ai_rewritten_content)
        .bind(item.ai_processed_at)
        .bind(item.created_article_id)
        .bind(item.published_at)
        .bind(item.social_scheduled_at)
        .bind(item.social_posted_at)
        .bind(&item.social_post_id)
        .bind(&item.error_message)
        .bind(item.retry_count as i32)
        .bind(item.updated_at)
        .bind(id)
        .execute(&self.db)
        .await?;

        debug!("Updated queue item {} (stage: {})", id, item.stage.as_str());
        Ok(item)
    }

    async fn find_due_for_social_posting(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM automation_queue
            WHERE stage = $1 AND social_status = $2 AND social_scheduled_at <= $3
            ORDER BY social_scheduled_at ASC
            LIMIT $4
            "#,
        )
        .bind(QueueStage::SocialPending.as_str())
        .bind(SocialStatus::Pending.as_str())
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list(&self, filter: QueueFilter, page: u32, per_page: u32) -> Result<QueuePage> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let offset = (page - 1) as i64 * per_page as i64;

        let (total, rows) = if let Some(stage) = filter.stage {
            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM automation_queue WHERE stage = $1")
                    .bind(stage.as_str())
                    .fetch_one(&self.db)
                    .await?;
            let rows = sqlx::query(
                r#"
                SELECT * FROM automation_queue WHERE stage = $1
                ORDER BY created_at DESC LIMIT $2 OFFSET $3
                "#,
            )
            .bind(stage.as_str())
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
            (total, rows)
        } else {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM automation_queue")
                .fetch_one(&self.db)
                .await?;
            let rows = sqlx::query(
                "SELECT * FROM automation_queue ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(per_page as i64)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
            (total, rows)
        };

        let data = rows.iter().map(Self::map_row).collect::<Result<Vec<_>>>()?;

        Ok(QueuePage {
            data,
            meta: PageMeta::new(page, per_page, total.max(0) as u64),
        })
    }
}

/// In-memory queue used by tests and local demo wiring.
#[derive(Default)]
pub struct InMemoryQueueStore {
    items: Arc<RwLock<HashMap<Uuid, QueueItem>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn find_by_source_article(&self, source_article_id: Uuid) -> Result<Option<QueueItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .find(|item| item.source_article_id == source_article_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QueueItem>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn create(
        &self,
        source_article_id: Uuid,
        stage: QueueStage,
        social_platform: &str,
    ) -> Result<QueueItem> {
        let now = Utc::now();
        let item = QueueItem {
            id: Uuid::new_v4(),
            source_article_id,
            stage,
            ai_rewritten_title: None,
            ai_rewritten_excerpt: None,
            ai_rewritten_content: None,
            ai_processed_at: None,
            created_article_id: None,
            published_at: None,
            social_platform: social_platform.to_string(),
            social_status: SocialStatus::Pending,
            social_scheduled_at: None,
            social_posted_at: None,
            social_post_id: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.items.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update(&self, id: Uuid, patch: QueueItemPatch) -> Result<QueueItem> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&id)
            .ok_or(AutomationError::QueueItemNotFound { id })?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn find_due_for_social_posting(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueItem>> {
        let items = self.items.read().await;
        let mut due: Vec<QueueItem> = items
            .values()
            .filter(|item| {
                item.stage == QueueStage::SocialPending
                    && item.social_status == SocialStatus::Pending
                    && item
                        .social_scheduled_at
                        .map(|at| at <= now)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|item| item.social_scheduled_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn list(&self, filter: QueueFilter, page: u32, per_page: u32) -> Result<QueuePage> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let items = self.items.read().await;
        let mut matching: Vec<QueueItem> = items
            .values()
            .filter(|item| filter.stage.map(|s| item.stage == s).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let start = ((page - 1) * per_page) as usize;
        let data: Vec<QueueItem> = matching
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Ok(QueuePage {
            data,
            meta: PageMeta::new(page, per_page, total),
        })
    }
}
