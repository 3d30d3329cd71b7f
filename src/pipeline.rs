use crate::notifications::NotificationService;
use crate::traits::{ArticleRewriter, PublishingPlatform, QueueStore, SourceStore};
use crate::types::{
    ArticleDraft, AutomationError, Category, QueueFilter, QueueItem, QueueItemPatch, QueuePage,
    QueueStage, Result, SocialStatus, SourceArticle,
};
use crate::utils::{default_image_for_category, random_slug_suffix, slugify, truncate_chars};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Maximum stored excerpt length, in characters.
pub const EXCERPT_MAX_CHARS: usize = 500;
/// Delay between publication and the earliest social posting attempt, and
/// between social retry attempts.
pub const SOCIAL_POST_DELAY_MINUTES: i64 = 5;
/// Total social posting attempts before an item fails terminally.
pub const MAX_SOCIAL_ATTEMPTS: u32 = 3;
/// Platform every new queue item targets.
pub const DEFAULT_SOCIAL_PLATFORM: &str = "twitter";
/// Category slug the publish stage falls back to when the source has none.
pub const DEFAULT_CATEGORY_SLUG: &str = "news";
/// Fixed email of the authoring identity used for all automated content.
pub const SYSTEM_AUTHOR_EMAIL: &str = "automation@newsroom.local";
/// Default batch bound for the social posting poll.
pub const DEFAULT_SOCIAL_POLL_LIMIT: u32 = 10;

/// Orchestrator for the ingestion -> AI rewrite -> publish -> social-post
/// workflow. Constructed once at process start and shared by reference; all
/// per-item state lives in the queue store.
#[derive(Clone)]
pub struct AutomationPipeline {
    queue: Arc<dyn QueueStore>,
    sources: Arc<dyn SourceStore>,
    rewriter: Arc<dyn ArticleRewriter>,
    platform: Arc<dyn PublishingPlatform>,
    notifications: NotificationService,
}

impl AutomationPipeline {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        sources: Arc<dyn SourceStore>,
        rewriter: Arc<dyn ArticleRewriter>,
        platform: Arc<dyn PublishingPlatform>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            queue,
            sources,
            rewriter,
            platform,
            notifications,
        }
    }

    /// Admit a source article into the pipeline and kick off processing
    /// without blocking the caller. Errors never propagate out of here: an
    /// enqueue failure raises an `automation_error` notification instead.
    pub async fn start_automation(&self, source_article_id: Uuid) {
        if let Err(e) = self.enqueue(source_article_id).await {
            error!(
                "Failed to start automation for source article {}: {}",
                source_article_id, e
            );
            self.notifications
                .notify(
                    "automation_error",
                    "Automation failed to start",
                    &format!(
                        "Could not enqueue source article {}: {}",
                        source_article_id, e
                    ),
                    json!({ "source_article_id": source_article_id }),
                )
                .await;
        }
    }

    async fn enqueue(&self, source_article_id: Uuid) -> Result<()> {
        if let Some(existing) = self.queue.find_by_source_article(source_article_id).await? {
            info!(
                "Queue item {} already exists for source article {}, skipping",
                existing.id, source_article_id
            );
            return Ok(());
        }

        let item = self
            .queue
            .create(source_article_id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
            .await?;

        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.process_queue(item.id).await {
                error!("Unhandled pipeline error for queue item {}: {}", item.id, e);
            }
        });

        Ok(())
    }

    /// Run the three pipeline stages in strict sequence for one item. A
    /// failure in any stage aborts the rest and leaves the item in `Failed`
    /// with the error recorded; no notification is raised here. Failed items
    /// surface on the dashboard and are retried manually.
    pub async fn process_queue(&self, id: Uuid) -> Result<()> {
        info!("Processing queue item {}", id);

        if let Err(e) = self.run_stages(id).await {
            warn!("Pipeline failed for queue item {}: {}", id, e);
            self.queue
                .update(
                    id,
                    QueueItemPatch {
                        stage: Some(QueueStage::Failed),
                        error_message: Some(Some(e.to_string())),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(())
    }

    async fn run_stages(&self, id: Uuid) -> Result<()> {
        let item = self
            .queue
            .find_by_id(id)
            .await?
            .ok_or(AutomationError::QueueItemNotFound { id })?;

        let item = self.process_ai_rewrite(&item).await?;
        let item = self.publish_to_platform(&item).await?;
        self.queue_for_social(&item).await?;

        info!("Queue item {} scheduled for social posting", id);
        Ok(())
    }

    /// Stage 1: AI rewrite. A rewrite failure is non-fatal; the item carries
    /// the original title and content forward.
    pub async fn process_ai_rewrite(&self, item: &QueueItem) -> Result<QueueItem> {
        self.queue
            .update(
                item.id,
                QueueItemPatch {
                    stage: Some(QueueStage::AiProcessing),
                    ..Default::default()
                },
            )
            .await?;

        let source = self
            .sources
            .find_by_id(item.source_article_id)
            .await?
            .ok_or(AutomationError::SourceArticleNotFound {
                id: item.source_article_id,
            })?;

        // Prefer fields already rewritten in an earlier moderation pass.
        let title = source
            .rewritten_title
            .clone()
            .unwrap_or_else(|| source.title.clone());
        let content = source
            .rewritten_content
            .clone()
            .or_else(|| source.content.clone())
            .or_else(|| source.excerpt.clone())
            .unwrap_or_default();

        let (title, excerpt, content) = match self.rewriter.rewrite(&title, &content).await {
            Ok(output) => (output.title, output.excerpt, format_content(&content)),
            Err(e) => {
                warn!(
                    "AI rewrite failed for queue item {}, keeping original content: {}",
                    item.id, e
                );
                let excerpt = source.excerpt.clone().unwrap_or_else(|| content.clone());
                (title, excerpt, content)
            }
        };

        self.queue
            .update(
                item.id,
                QueueItemPatch {
                    stage: Some(QueueStage::AiCompleted),
                    ai_rewritten_title: Some(title),
                    ai_rewritten_excerpt: Some(truncate_chars(&excerpt, EXCERPT_MAX_CHARS)),
                    ai_rewritten_content: Some(content),
                    ai_processed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
    }

    /// Stage 2: create the published article on the platform.
    pub async fn publish_to_platform(&self, item: &QueueItem) -> Result<QueueItem> {
        let item = self
            .queue
            .update(
                item.id,
                QueueItemPatch {
                    stage: Some(QueueStage::Publishing),
                    ..Default::default()
                },
            )
            .await?;

        let source = self
            .sources
            .find_by_id(item.source_article_id)
            .await?
            .ok_or(AutomationError::SourceArticleNotFound {
                id: item.source_article_id,
            })?;

        let title = item
            .ai_rewritten_title
            .clone()
            .unwrap_or_else(|| source.title.clone());
        let slug = format!("{}-{}", slugify(&title), random_slug_suffix());

        let category = self.resolve_category(&source).await?;
        let image_url = source
            .image_url
            .clone()
            .unwrap_or_else(|| default_image_for_category(&category.slug).to_string());
        let author = self.platform.ensure_system_author().await?;

        let now = Utc::now();
        let draft = ArticleDraft {
            title,
            slug,
            excerpt: item.ai_rewritten_excerpt.clone().unwrap_or_default(),
            content: item.ai_rewritten_content.clone().unwrap_or_default(),
            image_url,
            category_id: category.id,
            author_id: author.id,
            status: "published".to_string(),
            published_at: now,
        };

        let article = self.platform.create_article(&draft).await?;
        info!(
            "Queue item {} published as article {} ({})",
            item.id, article.id, article.slug
        );

        self.queue
            .update(
                item.id,
                QueueItemPatch {
                    stage: Some(QueueStage::Published),
                    created_article_id: Some(article.id),
                    published_at: Some(now),
                    ..Default::default()
                },
            )
            .await
    }

    async fn resolve_category(&self, source: &SourceArticle) -> Result<Category> {
        if let Some(ref slug) = source.category_slug {
            if let Some(category) = self.platform.find_category_by_slug(slug).await? {
                return Ok(category);
            }
        }

        if let Some(category) = self
            .platform
            .find_category_by_slug(DEFAULT_CATEGORY_SLUG)
            .await?
        {
            return Ok(category);
        }

        self.platform
            .find_first_category()
            .await?
            .ok_or(AutomationError::NoCategories)
    }

    /// Stage 3: schedule the social posting attempt.
    pub async fn queue_for_social(&self, item: &QueueItem) -> Result<QueueItem> {
        let scheduled_at = Utc::now() + Duration::minutes(SOCIAL_POST_DELAY_MINUTES);

        self.queue
            .update(
                item.id,
                QueueItemPatch {
                    stage: Some(QueueStage::SocialPending),
                    social_status: Some(SocialStatus::Pending),
                    social_scheduled_at: Some(scheduled_at),
                    ..Default::default()
                },
            )
            .await
    }

    /// Pure read used by the external social dispatcher's poll loop. The
    /// dispatcher is expected to invoke `mark_social_posted` or
    /// `mark_social_failed` at most once per claimed item per cycle; no claim
    /// transition is persisted before handoff.
    pub async fn get_pending_social_posts(&self, limit: Option<u32>) -> Result<Vec<QueueItem>> {
        self.queue
            .find_due_for_social_posting(Utc::now(), limit.unwrap_or(DEFAULT_SOCIAL_POLL_LIMIT))
            .await
    }

    /// Terminal success of the social stage.
    pub async fn mark_social_posted(&self, id: Uuid, external_post_id: &str) -> Result<()> {
        if self.queue.find_by_id(id).await?.is_none() {
            info!("Queue item {} disappeared before social success was recorded", id);
            return Ok(());
        }

        self.queue
            .update(
                id,
                QueueItemPatch {
                    stage: Some(QueueStage::Completed),
                    social_status: Some(SocialStatus::Posted),
                    social_posted_at: Some(Utc::now()),
                    social_post_id: Some(external_post_id.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        info!("Queue item {} completed with social post {}", id, external_post_id);
        Ok(())
    }

    /// Record a social posting failure. Below the attempt bound the item is
    /// rescheduled; on the final failure it becomes terminal and the only
    /// automatic notification besides enqueue failure is raised.
    pub async fn mark_social_failed(&self, id: Uuid, message: &str) -> Result<()> {
        let item = match self.queue.find_by_id(id).await? {
            Some(item) => item,
            None => {
                info!("Queue item {} disappeared before social failure was recorded", id);
                return Ok(());
            }
        };

        let retry_count = item.retry_count + 1;

        if retry_count < MAX_SOCIAL_ATTEMPTS {
            warn!(
                "Social posting failed for queue item {} (attempt {}/{}): {}",
                id, retry_count, MAX_SOCIAL_ATTEMPTS, message
            );
            self.queue
                .update(
                    id,
                    QueueItemPatch {
                        stage: Some(QueueStage::SocialPending),
                        social_status: Some(SocialStatus::Pending),
                        social_scheduled_at: Some(
                            Utc::now() + Duration::minutes(SOCIAL_POST_DELAY_MINUTES),
                        ),
                        error_message: Some(Some(message.to_string())),
                        retry_count: Some(retry_count),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(());
        }

        error!(
            "Social posting failed terminally for queue item {} after {} attempts: {}",
            id, retry_count, message
        );
        self.queue
            .update(
                id,
                QueueItemPatch {
                    stage: Some(QueueStage::Failed),
                    social_status: Some(SocialStatus::Failed),
                    error_message: Some(Some(message.to_string())),
                    retry_count: Some(retry_count),
                    ..Default::default()
                },
            )
            .await?;

        self.notifications
            .notify(
                "social_error",
                "Social posting failed",
                &format!(
                    "Social posting for queue item {} gave up after {} attempts: {}",
                    id, retry_count, message
                ),
                json!({ "queue_item_id": id, "platform": item.social_platform, "error": message }),
            )
            .await;

        Ok(())
    }

    /// Operator-initiated recovery for a `Failed` item. Items that already
    /// published skip straight back to the social stage; anything else
    /// restarts from the top.
    pub async fn retry_automation(&self, id: Uuid) -> Result<()> {
        let item = self
            .queue
            .find_by_id(id)
            .await?
            .ok_or(AutomationError::QueueItemNotFound { id })?;

        if item.stage != QueueStage::Failed {
            warn!(
                "Ignoring retry for queue item {} in stage {}",
                id,
                item.stage.as_str()
            );
            return Ok(());
        }

        if item.created_article_id.is_some() {
            info!("Retrying social posting for already-published queue item {}", id);
            self.queue
                .update(
                    id,
                    QueueItemPatch {
                        stage: Some(QueueStage::SocialPending),
                        social_status: Some(SocialStatus::Pending),
                        social_scheduled_at: Some(Utc::now()),
                        error_message: Some(None),
                        retry_count: Some(0),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(());
        }

        info!("Restarting pipeline for queue item {}", id);
        self.queue
            .update(
                id,
                QueueItemPatch {
                    stage: Some(QueueStage::Pending),
                    error_message: Some(None),
                    retry_count: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.process_queue(id).await {
                error!("Unhandled pipeline error for queue item {}: {}", id, e);
            }
        });

        Ok(())
    }

    /// Paginated queue listing for operator dashboards.
    pub async fn get_queue(
        &self,
        filter: QueueFilter,
        page: u32,
        per_page: u32,
    ) -> Result<QueuePage> {
        self.queue.list(filter, page, per_page).await
    }
}

/// Hook for post-rewrite content formatting. Currently a pass-through; no
/// attribution text is injected.
fn format_content(content: &str) -> String {
    content.to_string()
}
