use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse pipeline position of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStage {
    Pending,
    AiProcessing,
    AiCompleted,
    Publishing,
    Published,
    SocialPending,
    SocialPosting,
    Completed,
    Failed,
}

impl QueueStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStage::Pending => "pending",
            QueueStage::AiProcessing => "ai_processing",
            QueueStage::AiCompleted => "ai_completed",
            QueueStage::Publishing => "publishing",
            QueueStage::Published => "published",
            QueueStage::SocialPending => "social_pending",
            QueueStage::SocialPosting => "social_posting",
            QueueStage::Completed => "completed",
            QueueStage::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(QueueStage::Pending),
            "ai_processing" => Ok(QueueStage::AiProcessing),
            "ai_completed" => Ok(QueueStage::AiCompleted),
            "publishing" => Ok(QueueStage::Publishing),
            "published" => Ok(QueueStage::Published),
            "social_pending" => Ok(QueueStage::SocialPending),
            "social_posting" => Ok(QueueStage::SocialPosting),
            "completed" => Ok(QueueStage::Completed),
            "failed" => Ok(QueueStage::Failed),
            other => Err(AutomationError::Parse(format!(
                "unknown queue stage: {}",
                other
            ))),
        }
    }
}

/// Fine-grained sub-state of the social-posting stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialStatus {
    Pending,
    Processing,
    Posted,
    Failed,
}

impl SocialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialStatus::Pending => "pending",
            SocialStatus::Processing => "processing",
            SocialStatus::Posted => "posted",
            SocialStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SocialStatus::Pending),
            "processing" => Ok(SocialStatus::Processing),
            "posted" => Ok(SocialStatus::Posted),
            "failed" => Ok(SocialStatus::Failed),
            other => Err(AutomationError::Parse(format!(
                "unknown social status: {}",
                other
            ))),
        }
    }
}

/// One tracked unit of work: a single source article moving through the
/// automation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub source_article_id: Uuid,
    pub stage: QueueStage,
    pub ai_rewritten_title: Option<String>,
    pub ai_rewritten_excerpt: Option<String>,
    pub ai_rewritten_content: Option<String>,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub created_article_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub social_platform: String,
    pub social_status: SocialStatus,
    pub social_scheduled_at: Option<DateTime<Utc>>,
    pub social_posted_at: Option<DateTime<Utc>>,
    pub social_post_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a queue item. Unset fields are left untouched;
/// `error_message` uses a nested Option so it can be cleared explicitly.
#[derive(Debug, Clone, Default)]
pub struct QueueItemPatch {
    pub stage: Option<QueueStage>,
    pub social_status: Option<SocialStatus>,
    pub ai_rewritten_title: Option<String>,
    pub ai_rewritten_excerpt: Option<String>,
    pub ai_rewritten_content: Option<String>,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub created_article_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub social_scheduled_at: Option<DateTime<Utc>>,
    pub social_posted_at: Option<DateTime<Utc>>,
    pub social_post_id: Option<String>,
    pub error_message: Option<Option<String>>,
    pub retry_count: Option<u32>,
}

impl QueueItemPatch {
    pub fn apply(&self, item: &mut QueueItem) {
        if let Some(stage) = self.stage {
            item.stage = stage;
        }
        if let Some(status) = self.social_status {
            item.social_status = status;
        }
        if let Some(ref title) = self.ai_rewritten_title {
            item.ai_rewritten_title = Some(title.clone());
        }
        if let Some(ref excerpt) = self.ai_rewritten_excerpt {
            item.ai_rewritten_excerpt = Some(excerpt.clone());
        }
        if let Some(ref content) = self.ai_rewritten_content {
            item.ai_rewritten_content = Some(content.clone());
        }
        if let Some(at) = self.ai_processed_at {
            item.ai_processed_at = Some(at);
        }
        if let Some(article_id) = self.created_article_id {
            item.created_article_id = Some(article_id);
        }
        if let Some(at) = self.published_at {
            item.published_at = Some(at);
        }
        if let Some(at) = self.social_scheduled_at {
            item.social_scheduled_at = Some(at);
        }
        if let Some(at) = self.social_posted_at {
            item.social_posted_at = Some(at);
        }
        if let Some(ref post_id) = self.social_post_id {
            item.social_post_id = Some(post_id.clone());
        }
        if let Some(ref error) = self.error_message {
            item.error_message = error.clone();
        }
        if let Some(count) = self.retry_count {
            item.retry_count = count;
        }
        item.updated_at = Utc::now();
    }
}

/// Filter for operator dashboard queue listings.
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub stage: Option<QueueStage>,
}

/// Pagination metadata returned alongside dashboard listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub per_page: u32,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total_items: u64) -> Self {
        let per = per_page.max(1);
        let total_pages = ((total_items + per as u64 - 1) / per as u64) as u32;
        Self {
            current_page,
            total_pages,
            total_items,
            per_page: per,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePage {
    pub data: Vec<QueueItem>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    pub meta: PageMeta,
}

/// Operator-facing alert raised by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// A candidate article admitted from an external ingestion source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceArticle {
    pub id: Uuid,
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category_slug: Option<String>,
    /// Rewritten fields carried over from an earlier moderation pass, if any.
    pub rewritten_title: Option<String>,
    pub rewritten_content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSourceArticle {
    pub guid: Option<String>,
    pub link: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category_slug: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Fields handed to the publication collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub image_url: String,
    pub category_id: Uuid,
    pub author_id: Uuid,
    pub status: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedArticle {
    pub id: Uuid,
    pub slug: String,
}

/// Output of the AI rewrite collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteOutput {
    pub title: String,
    pub excerpt: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue item not found: {id}")]
    QueueItemNotFound { id: Uuid },

    #[error("Source article not found: {id}")]
    SourceArticleNotFound { id: Uuid },

    #[error("No categories available for automated publishing")]
    NoCategories,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;
