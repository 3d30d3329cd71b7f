pub mod ingest;
pub mod notifications;
pub mod pipeline;
pub mod publisher;
pub mod queue_store;
pub mod rewriter;
pub mod source_store;
pub mod traits;
pub mod types;
pub mod utils;

pub use ingest::{parse_feed, FeedIngestor};
pub use notifications::{InMemoryNotificationStore, NotificationService, PgNotificationStore};
pub use pipeline::AutomationPipeline;
pub use publisher::InMemoryPublisher;
pub use queue_store::{InMemoryQueueStore, PgQueueStore};
pub use rewriter::{HttpRewriter, MockRewriter};
pub use source_store::{InMemorySourceStore, PgSourceStore};
pub use traits::{
    ArticleRewriter, NotificationStore, PublishingPlatform, QueueStore, SourceStore,
};
pub use types::*;
