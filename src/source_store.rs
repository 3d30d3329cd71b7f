use crate::traits::SourceStore;
use crate::types::{NewSourceArticle, Result, SourceArticle};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Pool, Postgres, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed store for candidate source articles.
pub struct PgSourceStore {
    db: Pool<Postgres>,
}

impl PgSourceStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn map_row(row: &PgRow) -> Result<SourceArticle> {
        Ok(SourceArticle {
            id: row.try_get("id")?,
            guid: row.try_get("guid")?,
            link: row.try_get("link")?,
            title: row.try_get("title")?,
            excerpt: row.try_get("excerpt")?,
            content: row.try_get("content")?,
            image_url: row.try_get("image_url")?,
            category_slug: row.try_get("category_slug")?,
            rewritten_title: row.try_get("rewritten_title")?,
            rewritten_content: row.try_get("rewritten_content")?,
            published_at: row.try_get("published_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn find_existing(&self, article: &NewSourceArticle) -> Result<Option<SourceArticle>> {
        let row = if let Some(ref guid) = article.guid {
            sqlx::query("SELECT * FROM source_articles WHERE guid = $1")
                .bind(guid)
                .fetch_optional(&self.db)
                .await?
        } else {
            sqlx::query("SELECT * FROM source_articles WHERE link = $1")
                .bind(&article.link)
                .fetch_optional(&self.db)
                .await?
        };

        row.as_ref().map(Self::map_row).transpose()
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SourceArticle>> {
        let row = sqlx::query("SELECT * FROM source_articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn upsert(&self, article: NewSourceArticle) -> Result<(SourceArticle, bool)> {
        if let Some(existing) = self.find_existing(&article).await? {
            debug!("Source article already stored: {}", existing.link);
            return Ok((existing, false));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO source_articles
                (id, guid, link, title, excerpt, content, image_url,
                 category_slug, published_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (link) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(&article.guid)
        .bind(&article.link)
        .bind(&article.title)
        .bind(&article.excerpt)
        .bind(&article.content)
        .bind(&article.image_url)
        .bind(&article.category_slug)
        .bind(article.published_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        let stored = SourceArticle {
            id,
            guid: article.guid,
            link: article.link,
            title: article.title,
            excerpt: article.excerpt,
            content: article.content,
            image_url: article.image_url,
            category_slug: article.category_slug,
            rewritten_title: None,
            rewritten_content: None,
            published_at: article.published_at,
            created_at: now,
        };

        Ok((stored, true))
    }
}

/// In-memory source store for tests and local demo wiring.
#[derive(Default)]
pub struct InMemorySourceStore {
    articles: Arc<RwLock<HashMap<Uuid, SourceArticle>>>,
}

impl InMemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed article, e.g. one carrying moderation rewrites.
    pub async fn insert(&self, article: SourceArticle) {
        self.articles.write().await.insert(article.id, article);
    }
}

#[async_trait]
impl SourceStore for InMemorySourceStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SourceArticle>> {
        Ok(self.articles.read().await.get(&id).cloned())
    }

    async fn upsert(&self, article: NewSourceArticle) -> Result<(SourceArticle, bool)> {
        let mut articles = self.articles.write().await;

        let existing = articles
            .values()
            .find(|stored| match (&stored.guid, &article.guid) {
                (Some(a), Some(b)) => a == b,
                _ => stored.link == article.link,
            })
            .cloned();

        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        let stored = SourceArticle {
            id: Uuid::new_v4(),
            guid: article.guid,
            link: article.link,
            title: article.title,
            excerpt: article.excerpt,
            content: article.content,
            image_url: article.image_url,
            category_slug: article.category_slug,
            rewritten_title: None,
            rewritten_content: None,
            published_at: article.published_at,
            created_at: Utc::now(),
        };
        articles.insert(stored.id, stored.clone());
        Ok((stored, true))
    }
}
