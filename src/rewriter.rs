use crate::traits::ArticleRewriter;
use crate::types::{AutomationError, Result, RewriteOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RewriteRequest<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    rewritten_title: String,
    rewritten_excerpt: String,
}

/// AI rewrite collaborator reached over HTTP. The request carries a bounded
/// timeout so a stalled rewrite service cannot block a pipeline run forever.
pub struct HttpRewriter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRewriter {
    pub fn new(endpoint: String, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .gzip(true)
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ArticleRewriter for HttpRewriter {
    async fn rewrite(&self, title: &str, content: &str) -> Result<RewriteOutput> {
        debug!("Requesting rewrite for: {}", title);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RewriteRequest { title, content })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AutomationError::General(format!(
                "Rewrite service returned HTTP {}",
                response.status()
            )));
        }

        let body: RewriteResponse = response.json().await?;
        Ok(RewriteOutput {
            title: body.rewritten_title,
            excerpt: body.rewritten_excerpt,
        })
    }
}

/// Mock rewriter for development and testing.
pub struct MockRewriter {
    fail: bool,
    excerpt_override: Option<String>,
    response_delay_ms: u64,
}

impl MockRewriter {
    pub fn new() -> Self {
        Self {
            fail: false,
            excerpt_override: None,
            response_delay_ms: 0,
        }
    }

    /// Every call returns an error, exercising the non-fatal AI path.
    pub fn failing() -> Self {
        Self {
            fail: true,
            excerpt_override: None,
            response_delay_ms: 0,
        }
    }

    pub fn with_excerpt(mut self, excerpt: String) -> Self {
        self.excerpt_override = Some(excerpt);
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }
}

impl Default for MockRewriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleRewriter for MockRewriter {
    async fn rewrite(&self, title: &str, content: &str) -> Result<RewriteOutput> {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }

        if self.fail {
            return Err(AutomationError::General(
                "mock rewriter configured to fail".to_string(),
            ));
        }

        let excerpt = self
            .excerpt_override
            .clone()
            .unwrap_or_else(|| content.split('.').next().unwrap_or(content).to_string());

        Ok(RewriteOutput {
            title: format!("{} (rewritten)", title),
            excerpt,
        })
    }
}
