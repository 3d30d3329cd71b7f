use anyhow::Result;
use clap::Parser;
use news_automation::{
    AutomationPipeline, FeedIngestor, HttpRewriter, InMemoryNotificationStore,
    InMemoryPublisher, InMemoryQueueStore, InMemorySourceStore, MockRewriter,
    NotificationService, PgNotificationStore, PgQueueStore, PgSourceStore, PublishingPlatform,
    QueueFilter,
};
use news_automation::traits::{ArticleRewriter, NotificationStore, QueueStore, SourceStore};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "news-automation", about = "RSS -> AI rewrite -> publish -> social automation pipeline")]
struct Args {
    /// Postgres connection string; falls back to in-memory stores when unset.
    #[arg(long)]
    database_url: Option<String>,

    /// Feed to ingest on startup.
    #[arg(long, default_value = "https://feeds.bbci.co.uk/news/rss.xml")]
    feed_url: String,

    /// AI rewrite service endpoint; a mock rewriter is used when unset.
    #[arg(long)]
    rewrite_endpoint: Option<String>,

    /// Seconds between social posting polls.
    #[arg(long, default_value_t = 30)]
    poll_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("Starting news automation pipeline");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok());
    let rewrite_endpoint = args
        .rewrite_endpoint
        .or_else(|| std::env::var("REWRITE_ENDPOINT").ok());

    let (queue, sources, notifications): (
        Arc<dyn QueueStore>,
        Arc<dyn SourceStore>,
        Arc<dyn NotificationStore>,
    ) = match database_url {
        Some(ref url) => {
            info!("Connecting to Postgres");
            let db = PgPool::connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            (
                Arc::new(PgQueueStore::new(db.clone())),
                Arc::new(PgSourceStore::new(db.clone())),
                Arc::new(PgNotificationStore::new(db)),
            )
        }
        None => {
            warn!("No DATABASE_URL set, using in-memory stores");
            (
                Arc::new(InMemoryQueueStore::new()),
                Arc::new(InMemorySourceStore::new()),
                Arc::new(InMemoryNotificationStore::new()),
            )
        }
    };

    let rewriter: Arc<dyn ArticleRewriter> = match rewrite_endpoint {
        Some(endpoint) => {
            info!("Using rewrite service at {}", endpoint);
            Arc::new(HttpRewriter::new(endpoint, 60)?)
        }
        None => {
            warn!("No REWRITE_ENDPOINT set, using mock rewriter");
            Arc::new(MockRewriter::new())
        }
    };

    // The real CMS backend is an external collaborator; the demo publishes
    // into an in-memory stand-in seeded with a small category catalog.
    let publisher = Arc::new(InMemoryPublisher::new());
    publisher.add_category("News", "news").await;
    publisher.add_category("Technology", "tech").await;
    publisher.add_category("Business", "business").await;

    let pipeline = AutomationPipeline::new(
        queue,
        sources.clone(),
        rewriter,
        publisher.clone() as Arc<dyn PublishingPlatform>,
        NotificationService::new(notifications),
    );

    let ingestor = FeedIngestor::new(sources, pipeline.clone())?;
    match ingestor.ingest_feed(&args.feed_url).await {
        Ok(admitted) => info!("Ingested feed, {} new articles admitted", admitted),
        Err(e) => error!("Feed ingestion failed: {}", e),
    }

    // Demo dispatcher: poll for due items and record them as posted.
    let mut ticker = tokio::time::interval(Duration::from_secs(args.poll_interval));
    loop {
        ticker.tick().await;

        match pipeline.get_pending_social_posts(None).await {
            Ok(due) => {
                for item in due {
                    let post_id = format!("demo-{}", &item.id.simple().to_string()[..8]);
                    info!(
                        "Dispatching queue item {} to {} as {}",
                        item.id, item.social_platform, post_id
                    );
                    if let Err(e) = pipeline.mark_social_posted(item.id, &post_id).await {
                        error!("Failed to record social post for {}: {}", item.id, e);
                    }
                }
            }
            Err(e) => error!("Social poll failed: {}", e),
        }

        match pipeline.get_queue(QueueFilter::default(), 1, 5).await {
            Ok(page) => info!(
                "Queue: {} items total, showing {} on page {}",
                page.meta.total_items,
                page.data.len(),
                page.meta.current_page
            ),
            Err(e) => error!("Queue listing failed: {}", e),
        }
    }
}
