use crate::types::{
    ArticleDraft, Author, Category, NewNotification, NewSourceArticle, Notification,
    NotificationPage, PublishedArticle, QueueFilter, QueueItem, QueueItemPatch, QueuePage,
    QueueStage, Result, RewriteOutput, SourceArticle,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistent queue of pipeline runs, one per admitted source article.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Used to enforce the at-most-one-item-per-source invariant.
    async fn find_by_source_article(&self, source_article_id: Uuid) -> Result<Option<QueueItem>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QueueItem>>;

    async fn create(
        &self,
        source_article_id: Uuid,
        stage: QueueStage,
        social_platform: &str,
    ) -> Result<QueueItem>;

    /// Partial update; fails with `QueueItemNotFound` if the id does not exist.
    async fn update(&self, id: Uuid, patch: QueueItemPatch) -> Result<QueueItem>;

    /// Items with stage `SocialPending`, social status `Pending` and a
    /// scheduled time at or before `now`, capped at `limit`.
    async fn find_due_for_social_posting(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<QueueItem>>;

    async fn list(&self, filter: QueueFilter, page: u32, per_page: u32) -> Result<QueuePage>;
}

/// Storage for candidate articles produced by the ingestion source.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SourceArticle>>;

    /// Insert the article unless one with the same guid (or link, when the
    /// guid is absent) already exists. Returns the stored article and whether
    /// it was newly inserted.
    async fn upsert(&self, article: NewSourceArticle) -> Result<(SourceArticle, bool)>;
}

/// Durable log of operator-facing alerts.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification>;

    async fn unread_count(&self) -> Result<u64>;

    async fn list(&self, unread_only: bool, page: u32, per_page: u32) -> Result<NotificationPage>;

    async fn mark_as_read(&self, id: Uuid) -> Result<()>;

    async fn mark_all_as_read(&self) -> Result<()>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Delete notifications that are both read and created before `cutoff`.
    /// Unread notifications are never auto-deleted. Returns the delete count.
    async fn delete_read_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// External AI rewriting collaborator.
#[async_trait]
pub trait ArticleRewriter: Send + Sync {
    async fn rewrite(&self, title: &str, content: &str) -> Result<RewriteOutput>;
}

/// External publication collaborator plus the category/author lookups the
/// publish stage needs. Article creation is idempotent by unique slug.
#[async_trait]
pub trait PublishingPlatform: Send + Sync {
    async fn create_article(&self, draft: &ArticleDraft) -> Result<PublishedArticle>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn find_first_category(&self) -> Result<Option<Category>>;

    /// Idempotent ensure-exists for the fixed authoring identity that all
    /// automated content is attributed to.
    async fn ensure_system_author(&self) -> Result<Author>;
}
