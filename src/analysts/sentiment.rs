//! Community sentiment specialist
//!
//! Degraded data never fails the analyst: insufficient posts and fetch
//! errors fall back to dedicated prompts that yield a conservative
//! Neutral signal.

use crate::analysts::{signal_from_llm, Analyst};
use crate::data::MarketDataProvider;
use crate::error::Result;
use crate::llm::ReasoningClient;
use crate::models::{AnalystKey, AnalystSignal};
use crate::prompts;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

pub(crate) const RELEVANT_POST_LIMIT: usize = 15;
pub(crate) const MIN_POSTS: usize = 5;

pub struct SentimentAnalyst {
    data: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn ReasoningClient>,
}

impl SentimentAnalyst {
    pub fn new(data: Arc<dyn MarketDataProvider>, llm: Arc<dyn ReasoningClient>) -> Self {
        Self { data, llm }
    }
}

#[async_trait]
impl Analyst for SentimentAnalyst {
    fn key(&self) -> AnalystKey {
        AnalystKey::Sentiment
    }

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal> {
        let (prompt, metrics) = match self
            .data
            .community_posts(ticker, date, RELEVANT_POST_LIMIT)
            .await
        {
            Ok(posts) if posts.len() >= MIN_POSTS => {
                let posts_json = serde_json::to_string_pretty(&posts)?;
                (
                    prompts::sentiment_prompt(ticker, posts.len(), &posts_json),
                    Some(json!({ "post_count": posts.len() })),
                )
            }
            Ok(posts) => {
                warn!(
                    %ticker,
                    post_count = posts.len(),
                    min_posts = MIN_POSTS,
                    "Insufficient community posts, using degraded prompt"
                );
                (
                    prompts::sentiment_insufficient_data_prompt(ticker, posts.len(), MIN_POSTS),
                    Some(json!({ "post_count": posts.len(), "insufficient_data": true })),
                )
            }
            Err(e) => {
                warn!(%ticker, error = %e, "Community post fetch failed, using degraded prompt");
                (
                    prompts::sentiment_fetch_error_prompt(ticker),
                    Some(json!({ "fetch_error": true })),
                )
            }
        };

        signal_from_llm(self.llm.as_ref(), self.key(), ticker, date, &prompt, metrics).await
    }
}
