use crate::pipeline::AutomationPipeline;
use crate::traits::SourceStore;
use crate::types::{AutomationError, NewSourceArticle, Result};
use crate::utils::slugify;
use feed_rs::parser;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Pulls an RSS/Atom feed and admits its entries into the automation
/// pipeline. Fetching and parsing are separate so parsing is testable on
/// static feed content.
pub struct FeedIngestor {
    client: reqwest::Client,
    sources: Arc<dyn SourceStore>,
    pipeline: AutomationPipeline,
}

impl FeedIngestor {
    pub fn new(sources: Arc<dyn SourceStore>, pipeline: AutomationPipeline) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("news-automation/0.1")
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            sources,
            pipeline,
        })
    }

    /// Fetch the feed, store any new entries, and start automation for each
    /// newly admitted article. Returns the number of articles admitted.
    pub async fn ingest_feed(&self, feed_url: &str) -> Result<usize> {
        let parsed = Url::parse(feed_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AutomationError::General(format!(
                "Unsupported feed URL scheme: {}",
                parsed.scheme()
            )));
        }

        info!("Fetching feed: {}", feed_url);
        let response = self.client.get(feed_url).send().await?;

        if !response.status().is_success() {
            return Err(AutomationError::General(format!(
                "Feed fetch returned HTTP {}",
                response.status()
            )));
        }

        let content = response.text().await?;
        let candidates = parse_feed(&content)?;
        info!("Parsed {} entries from {}", candidates.len(), feed_url);

        let mut admitted = 0;
        for candidate in candidates {
            let (article, is_new) = self.sources.upsert(candidate).await?;
            if is_new {
                debug!("Admitted source article {} ({})", article.id, article.link);
                self.pipeline.start_automation(article.id).await;
                admitted += 1;
            }
        }

        info!("Admitted {} new articles from {}", admitted, feed_url);
        Ok(admitted)
    }
}

/// Parse RSS/Atom content into candidate source articles, deduplicating by
/// guid and link within the document.
pub fn parse_feed(content: &str) -> Result<Vec<NewSourceArticle>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| AutomationError::Parse(format!("Failed to parse feed: {}", e)))?;

    let mut seen_guids = HashSet::new();
    let mut seen_links = HashSet::new();
    let mut candidates = Vec::new();

    for entry in feed.entries {
        let link = match entry.links.first() {
            Some(link) => link.href.clone(),
            None => {
                warn!("Skipping feed entry without a link: {}", entry.id);
                continue;
            }
        };

        let guid = if entry.id.is_empty() {
            None
        } else {
            Some(entry.id.clone())
        };

        if let Some(ref guid) = guid {
            if !seen_guids.insert(guid.clone()) {
                debug!("Skipping duplicate entry with guid {}", guid);
                continue;
            }
        }
        if !seen_links.insert(link.clone()) {
            debug!("Skipping duplicate entry with link {}", link);
            continue;
        }

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let excerpt = entry.summary.map(|s| s.content);
        let content_body = entry
            .content
            .and_then(|c| c.body)
            .or_else(|| excerpt.clone());

        let image_url = entry
            .media
            .iter()
            .flat_map(|media| media.thumbnails.iter().map(|t| t.image.uri.clone()))
            .next()
            .or_else(|| {
                entry
                    .media
                    .iter()
                    .flat_map(|media| media.content.iter())
                    .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
                    .next()
            });

        let category_slug = entry.categories.first().map(|c| slugify(&c.term));

        candidates.push(NewSourceArticle {
            guid,
            link,
            title,
            excerpt,
            content: content_body,
            image_url,
            category_slug,
            published_at: entry.published.map(|dt| dt.with_timezone(&chrono::Utc)),
        });
    }

    Ok(candidates)
}
