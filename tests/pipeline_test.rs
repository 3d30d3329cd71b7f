use async_trait::async_trait;
use chrono::{Duration, Utc};
use news_automation::pipeline::{
    DEFAULT_SOCIAL_PLATFORM, EXCERPT_MAX_CHARS, MAX_SOCIAL_ATTEMPTS,
};
use news_automation::traits::{ArticleRewriter, PublishingPlatform, QueueStore};
use news_automation::types::*;
use news_automation::{
    AutomationPipeline, InMemoryNotificationStore, InMemoryPublisher, InMemoryQueueStore,
    InMemorySourceStore, MockRewriter, NotificationService,
};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    pipeline: AutomationPipeline,
    queue: Arc<InMemoryQueueStore>,
    sources: Arc<InMemorySourceStore>,
    publisher: Arc<InMemoryPublisher>,
    notifications: Arc<InMemoryNotificationStore>,
}

async fn harness(rewriter: Arc<dyn ArticleRewriter>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let queue = Arc::new(InMemoryQueueStore::new());
    let sources = Arc::new(InMemorySourceStore::new());
    let publisher = Arc::new(InMemoryPublisher::new());
    let notifications = Arc::new(InMemoryNotificationStore::new());

    publisher.add_category("News", "news").await;
    publisher.add_category("Technology", "tech").await;

    let pipeline = AutomationPipeline::new(
        queue.clone(),
        sources.clone(),
        rewriter,
        publisher.clone(),
        NotificationService::new(notifications.clone()),
    );

    Harness {
        pipeline,
        queue,
        sources,
        publisher,
        notifications,
    }
}

fn sample_article(title: &str, category_slug: Option<&str>) -> SourceArticle {
    SourceArticle {
        id: Uuid::new_v4(),
        guid: Some(format!("guid-{}", Uuid::new_v4())),
        link: format!("https://news.example.com/{}", Uuid::new_v4()),
        title: title.to_string(),
        excerpt: Some("A short summary of the story.".to_string()),
        content: Some("Full body of the story. It has several sentences.".to_string()),
        image_url: None,
        category_slug: category_slug.map(|s| s.to_string()),
        rewritten_title: None,
        rewritten_content: None,
        published_at: Some(Utc::now()),
        created_at: Utc::now(),
    }
}

async fn wait_for_stage(queue: &InMemoryQueueStore, source_article_id: Uuid, stage: QueueStage) -> QueueItem {
    for _ in 0..200 {
        if let Some(item) = queue
            .find_by_source_article(source_article_id)
            .await
            .expect("queue lookup")
        {
            if item.stage == stage {
                return item;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("queue item never reached stage {:?}", stage);
}

#[tokio::test]
async fn enqueue_is_idempotent_per_source_article() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let article = sample_article("Breaking story", Some("news"));
    h.sources.insert(article.clone()).await;

    h.pipeline.start_automation(article.id).await;
    h.pipeline.start_automation(article.id).await;

    wait_for_stage(&h.queue, article.id, QueueStage::SocialPending).await;
    assert_eq!(h.queue.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn ai_failure_is_non_fatal() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::failing())).await;
    let article = sample_article("Original headline", Some("news"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    let item = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(item.stage, QueueStage::SocialPending);
    assert_eq!(item.ai_rewritten_title.as_deref(), Some("Original headline"));
    assert!(item.ai_processed_at.is_some());
    assert!(item.created_article_id.is_some());
    Ok(())
}

#[tokio::test]
async fn excerpt_is_truncated_to_the_cap() -> Result<()> {
    let long_excerpt = "x".repeat(EXCERPT_MAX_CHARS + 100);
    let h = harness(Arc::new(MockRewriter::new().with_excerpt(long_excerpt))).await;
    let article = sample_article("Long excerpt story", Some("news"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    let item = h.queue.find_by_id(item.id).await?.unwrap();
    let excerpt = item.ai_rewritten_excerpt.expect("excerpt stored");
    assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS);
    Ok(())
}

#[tokio::test]
async fn social_failure_reschedules_then_fails_terminally() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let article = sample_article("Flaky social story", Some("news"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    // First failure: rescheduled roughly five minutes out.
    let before = Utc::now();
    h.pipeline.mark_social_failed(item.id, "rate limited").await?;
    let after_first = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(after_first.stage, QueueStage::SocialPending);
    assert_eq!(after_first.social_status, SocialStatus::Pending);
    assert_eq!(after_first.retry_count, 1);
    assert_eq!(after_first.error_message.as_deref(), Some("rate limited"));
    let scheduled = after_first.social_scheduled_at.expect("rescheduled");
    assert!(scheduled >= before + Duration::minutes(4));
    assert!(scheduled <= Utc::now() + Duration::minutes(6));

    h.pipeline.mark_social_failed(item.id, "rate limited").await?;
    h.pipeline.mark_social_failed(item.id, "rate limited").await?;

    let terminal = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(terminal.stage, QueueStage::Failed);
    assert_eq!(terminal.social_status, SocialStatus::Failed);
    assert_eq!(terminal.retry_count, MAX_SOCIAL_ATTEMPTS);

    let social_errors: Vec<Notification> = h
        .notifications
        .all()
        .await
        .into_iter()
        .filter(|n| n.notification_type == "social_error")
        .collect();
    assert_eq!(social_errors.len(), 1);
    Ok(())
}

#[tokio::test]
async fn social_mark_calls_are_noops_for_missing_items() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;

    h.pipeline.mark_social_failed(Uuid::new_v4(), "gone").await?;
    h.pipeline.mark_social_posted(Uuid::new_v4(), "post1").await?;

    assert!(h.notifications.all().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn due_polling_excludes_future_items() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let due_article = sample_article("Due story", Some("news"));
    let future_article = sample_article("Future story", Some("news"));
    h.sources.insert(due_article.clone()).await;
    h.sources.insert(future_article.clone()).await;

    for article in [&due_article, &future_article] {
        let item = h
            .queue
            .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
            .await?;
        h.pipeline.process_queue(item.id).await?;
    }

    let due_item = h.queue.find_by_source_article(due_article.id).await?.unwrap();
    h.queue
        .update(
            due_item.id,
            QueueItemPatch {
                social_scheduled_at: Some(Utc::now() - Duration::minutes(1)),
                ..Default::default()
            },
        )
        .await?;

    let due = h.pipeline.get_pending_social_posts(None).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, due_item.id);
    Ok(())
}

#[tokio::test]
async fn retry_after_publish_skips_straight_to_social() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let article = sample_article("Published but unposted", Some("news"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    for _ in 0..MAX_SOCIAL_ATTEMPTS {
        h.pipeline.mark_social_failed(item.id, "network down").await?;
    }
    assert_eq!(
        h.queue.find_by_id(item.id).await?.unwrap().stage,
        QueueStage::Failed
    );
    let published_before = h.publisher.article_count().await;

    h.pipeline.retry_automation(item.id).await?;

    let retried = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(retried.stage, QueueStage::SocialPending);
    assert_eq!(retried.social_status, SocialStatus::Pending);
    assert_eq!(retried.retry_count, 0);
    assert!(retried.error_message.is_none());
    assert!(retried.social_scheduled_at.unwrap() <= Utc::now());
    // Publication must not run again.
    assert_eq!(h.publisher.article_count().await, published_before);

    // Immediately eligible for the next poll.
    let due = h.pipeline.get_pending_social_posts(None).await?;
    assert!(due.iter().any(|d| d.id == item.id));
    Ok(())
}

#[tokio::test]
async fn retry_before_publish_restarts_the_pipeline() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;

    // No source article stored yet, so the first run fails mid-pipeline.
    let missing_source = Uuid::new_v4();
    let item = h
        .queue
        .create(missing_source, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    let failed = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(failed.stage, QueueStage::Failed);
    assert!(failed.error_message.is_some());
    assert!(failed.created_article_id.is_none());

    // Operator fixes the data, then retries.
    let mut article = sample_article("Recovered story", Some("news"));
    article.id = missing_source;
    h.sources.insert(article).await;

    h.pipeline.retry_automation(item.id).await?;
    let recovered = wait_for_stage(&h.queue, missing_source, QueueStage::SocialPending).await;
    assert!(recovered.created_article_id.is_some());
    assert!(recovered.error_message.is_none());
    Ok(())
}

#[tokio::test]
async fn retry_on_non_failed_item_is_a_noop() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let article = sample_article("Healthy story", Some("news"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    h.pipeline.retry_automation(item.id).await?;

    let unchanged = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(unchanged.stage, QueueStage::SocialPending);
    Ok(())
}

#[tokio::test]
async fn missing_category_catalog_fails_the_publish_stage() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let queue = Arc::new(InMemoryQueueStore::new());
    let sources = Arc::new(InMemorySourceStore::new());
    let publisher = Arc::new(InMemoryPublisher::new()); // empty catalog
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let pipeline = AutomationPipeline::new(
        queue.clone(),
        sources.clone(),
        Arc::new(MockRewriter::new()),
        publisher,
        NotificationService::new(notifications.clone()),
    );

    let article = sample_article("Uncategorizable story", None);
    sources.insert(article.clone()).await;
    let item = queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    pipeline.process_queue(item.id).await?;

    let failed = queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(failed.stage, QueueStage::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("No categories"));
    // Mid-pipeline failures are dashboard-visible only, never notified.
    assert!(notifications.all().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_category_falls_back_to_default() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let article = sample_article("Sports story", Some("sports"));
    h.sources.insert(article.clone()).await;

    let item = h
        .queue
        .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
        .await?;
    h.pipeline.process_queue(item.id).await?;

    let news = h
        .publisher
        .find_category_by_slug("news")
        .await?
        .expect("default category seeded");
    let drafts = h.publisher.drafts().await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].category_id, news.id);
    Ok(())
}

#[tokio::test]
async fn same_title_twice_yields_distinct_slugs() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;

    for _ in 0..2 {
        let article = sample_article("Identical headline", Some("news"));
        h.sources.insert(article.clone()).await;
        let item = h
            .queue
            .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
            .await?;
        h.pipeline.process_queue(item.id).await?;
    }

    assert_eq!(h.publisher.article_count().await, 2);
    Ok(())
}

/// Queue store whose writes always fail, for exercising the enqueue error path.
struct BrokenQueueStore;

#[async_trait]
impl QueueStore for BrokenQueueStore {
    async fn find_by_source_article(&self, _id: Uuid) -> Result<Option<QueueItem>> {
        Ok(None)
    }
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<QueueItem>> {
        Ok(None)
    }
    async fn create(&self, _id: Uuid, _stage: QueueStage, _platform: &str) -> Result<QueueItem> {
        Err(AutomationError::General("storage offline".to_string()))
    }
    async fn update(&self, id: Uuid, _patch: QueueItemPatch) -> Result<QueueItem> {
        Err(AutomationError::QueueItemNotFound { id })
    }
    async fn find_due_for_social_posting(
        &self,
        _now: chrono::DateTime<Utc>,
        _limit: u32,
    ) -> Result<Vec<QueueItem>> {
        Ok(Vec::new())
    }
    async fn list(&self, _filter: QueueFilter, page: u32, per_page: u32) -> Result<QueuePage> {
        Ok(QueuePage {
            data: Vec::new(),
            meta: PageMeta::new(page, per_page, 0),
        })
    }
}

#[tokio::test]
async fn enqueue_failure_raises_notification_instead_of_error() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let notifications = Arc::new(InMemoryNotificationStore::new());
    let pipeline = AutomationPipeline::new(
        Arc::new(BrokenQueueStore),
        Arc::new(InMemorySourceStore::new()),
        Arc::new(MockRewriter::new()),
        Arc::new(InMemoryPublisher::new()),
        NotificationService::new(notifications.clone()),
    );

    // Must not panic or surface the storage error.
    pipeline.start_automation(Uuid::new_v4()).await;

    let all = notifications.all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].notification_type, "automation_error");
    Ok(())
}

#[tokio::test]
async fn end_to_end_tech_story_reaches_completed() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;
    let mut article = sample_article("Chip startup raises funding", Some("tech"));
    article.image_url = None;
    h.sources.insert(article.clone()).await;

    h.pipeline.start_automation(article.id).await;
    let item = wait_for_stage(&h.queue, article.id, QueueStage::SocialPending).await;

    // Published with a slug derived from the rewritten title and the
    // category-default tech image.
    let drafts = h.publisher.drafts().await;
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0].slug.starts_with("chip-startup-raises-funding-rewritten-"));
    assert_eq!(drafts[0].image_url, "/images/defaults/tech.jpg");
    assert_eq!(drafts[0].status, "published");

    // Not yet due.
    assert!(h.pipeline.get_pending_social_posts(None).await?.is_empty());

    h.queue
        .update(
            item.id,
            QueueItemPatch {
                social_scheduled_at: Some(Utc::now() - Duration::seconds(1)),
                ..Default::default()
            },
        )
        .await?;

    let due = h.pipeline.get_pending_social_posts(None).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, item.id);

    h.pipeline.mark_social_posted(item.id, "post123").await?;

    let done = h.queue.find_by_id(item.id).await?.unwrap();
    assert_eq!(done.stage, QueueStage::Completed);
    assert_eq!(done.social_status, SocialStatus::Posted);
    assert_eq!(done.social_post_id.as_deref(), Some("post123"));
    assert!(done.social_posted_at.is_some());
    Ok(())
}

#[tokio::test]
async fn queue_listing_paginates_and_filters_by_stage() -> Result<()> {
    let h = harness(Arc::new(MockRewriter::new())).await;

    for i in 0..3 {
        let article = sample_article(&format!("Story {}", i), Some("news"));
        h.sources.insert(article.clone()).await;
        let item = h
            .queue
            .create(article.id, QueueStage::Pending, DEFAULT_SOCIAL_PLATFORM)
            .await?;
        h.pipeline.process_queue(item.id).await?;
    }

    let page = h
        .pipeline
        .get_queue(QueueFilter::default(), 1, 2)
        .await?;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.meta.total_items, 3);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.meta.per_page, 2);

    let filtered = h
        .pipeline
        .get_queue(
            QueueFilter {
                stage: Some(QueueStage::Failed),
            },
            1,
            10,
        )
        .await?;
    assert!(filtered.data.is_empty());
    assert_eq!(filtered.meta.total_items, 0);
    Ok(())
}
