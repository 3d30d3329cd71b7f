use crate::pipeline::SYSTEM_AUTHOR_EMAIL;
use crate::traits::PublishingPlatform;
use crate::types::{ArticleDraft, Author, Category, PublishedArticle, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// In-memory stand-in for the CMS publication backend. Article creation is
/// idempotent by slug and the system author is provisioned lazily on first
/// use, matching the contract the pipeline relies on.
#[derive(Default)]
pub struct InMemoryPublisher {
    categories: Arc<RwLock<Vec<Category>>>,
    articles: Arc<RwLock<HashMap<String, PublishedArticle>>>,
    drafts: Arc<RwLock<Vec<ArticleDraft>>>,
    system_author: Arc<RwLock<Option<Author>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_category(&self, name: &str, slug: &str) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        self.categories.write().await.push(category.clone());
        category
    }

    pub async fn article_count(&self) -> usize {
        self.articles.read().await.len()
    }

    /// Drafts in creation order, for asserting on what the pipeline sent.
    pub async fn drafts(&self) -> Vec<ArticleDraft> {
        self.drafts.read().await.clone()
    }
}

#[async_trait]
impl PublishingPlatform for InMemoryPublisher {
    async fn create_article(&self, draft: &ArticleDraft) -> Result<PublishedArticle> {
        let mut articles = self.articles.write().await;

        if let Some(existing) = articles.get(&draft.slug) {
            debug!("Article already exists for slug {}", draft.slug);
            return Ok(existing.clone());
        }

        let article = PublishedArticle {
            id: Uuid::new_v4(),
            slug: draft.slug.clone(),
        };
        articles.insert(draft.slug.clone(), article.clone());
        self.drafts.write().await.push(draft.clone());

        info!("Published article {} ({})", article.id, article.slug);
        Ok(article)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let categories = self.categories.read().await;
        Ok(categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn find_first_category(&self) -> Result<Option<Category>> {
        Ok(self.categories.read().await.first().cloned())
    }

    async fn ensure_system_author(&self) -> Result<Author> {
        let mut author = self.system_author.write().await;

        if let Some(existing) = author.as_ref() {
            return Ok(existing.clone());
        }

        let created = Author {
            id: Uuid::new_v4(),
            email: SYSTEM_AUTHOR_EMAIL.to_string(),
            name: "Automation Bot".to_string(),
        };
        info!("Provisioned system author {}", created.email);
        *author = Some(created.clone());
        Ok(created)
    }
}
