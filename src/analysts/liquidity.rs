//! Liquidity specialist
//!
//! Assesses how easily the item trades: recent volume plus community
//! engagement against fixed thresholds, summarized for the reasoning
//! service.

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

const VOLUME_WINDOW_DAYS: u32 = 7;
const VOLUME_HIGH: f64 = 100.0;
const VOLUME_LOW: f64 = 10.0;
const ENGAGEMENT_HIGH_SCORE: i64 = 50;
const ENGAGEMENT_LOW_SCORE: i64 = 5;
const ENGAGEMENT_HIGH_COMMENTS: i64 = 20;
const ENGAGEMENT_LOW_COMMENTS: i64 = 2;
const MIN_POSTS: usize = 3;
const RELEVANT_POST_LIMIT: usize = 15;

pub struct LiquidityAnalyst {
    data: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn ReasoningClient>,
}

impl LiquidityAnalyst {
    pub fn new(data: Arc<dyn MarketDataProvider>, llm: Arc<dyn ReasoningClient>) -> Self {
        Self { data, llm }
    }
}

#[async_trait]
impl Analyst for LiquidityAnalyst {
    fn key(&self) -> AnalystKey {
        AnalystKey::Liquidity
    }

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal> {
        // Volume side; a fetch failure degrades to "no data", it does not
        // fail the analyst.
        let (volume_analysis, avg_volume) = match self
            .data
            .daily_candles(ticker, date, VOLUME_WINDOW_DAYS)
            .await
        {
            Ok(candles) if !candles.is_empty() => {
                let avg =
                    candles.iter().map(|c| c.volume).sum::<f64>() / candles.len() as f64;
                let latest = candles.last().map(|c| c.volume).unwrap_or(0.0);
                let status = if avg >= VOLUME_HIGH {
                    "High"
                } else if avg < VOLUME_LOW {
                    "Low"
                } else {
                    "Moderate"
                };
                (
                    format!(
                        "Trading volume data is available.\n\
                         - {}-day average volume: {:.0}\n\
                         - Latest volume: {:.0}\n\
                         - Volume status: {}",
                        VOLUME_WINDOW_DAYS, avg, latest, status
                    ),
                    Some(avg),
                )
            }
            Ok(_) => (
                "Trading volume data is NOT available; treat this as a potential liquidity risk."
                    .to_string(),
                None,
            ),
            Err(e) => {
                warn!(%ticker, error = %e, "Volume fetch failed");
                (
                    "Trading volume data is NOT available; treat this as a potential liquidity risk."
                        .to_string(),
                    None,
                )
            }
        };

        // Engagement side.
        let (engagement_analysis, engagement) = match self
            .data
            .community_posts(ticker, date, RELEVANT_POST_LIMIT)
            .await
        {
            Ok(posts) if posts.len() >= MIN_POSTS => {
                let count = posts.len();
                let avg_score =
                    posts.iter().map(|p| p.score).sum::<i64>() as f64 / count as f64;
                let avg_comments =
                    posts.iter().map(|p| p.num_comments).sum::<i64>() as f64 / count as f64;

                let level = if avg_score >= ENGAGEMENT_HIGH_SCORE as f64
                    || avg_comments >= ENGAGEMENT_HIGH_COMMENTS as f64
                {
                    "High"
                } else if avg_score < ENGAGEMENT_LOW_SCORE as f64
                    && avg_comments < ENGAGEMENT_LOW_COMMENTS as f64
                {
                    "Low"
                } else {
                    "Moderate"
                };

                (
                    format!(
                        "Community engagement data is available.\n\
                         - Relevant posts: {}\n\
                         - Average upvotes per post: {:.1}\n\
                         - Average comments per post: {:.1}\n\
                         - Engagement level: {}",
                        count, avg_score, avg_comments, level
                    ),
                    Some(json!({
                        "post_count": count,
                        "avg_score": avg_score,
                        "avg_comments": avg_comments,
                    })),
                )
            }
            Ok(posts) => (
                format!(
                    "Community engagement data is INSUFFICIENT: {} relevant posts found (min {}).",
                    posts.len(),
                    MIN_POSTS
                ),
                None,
            ),
            Err(e) => {
                warn!(%ticker, error = %e, "Engagement fetch failed");
                (
                    "Community engagement data could not be fetched.".to_string(),
                    None,
                )
            }
        };

        let prompt = prompts::liquidity_prompt(
            ticker,
            &volume_analysis,
            &engagement_analysis,
            VOLUME_HIGH,
            VOLUME_LOW,
            ENGAGEMENT_HIGH_SCORE,
            ENGAGEMENT_HIGH_COMMENTS,
            ENGAGEMENT_LOW_SCORE,
            ENGAGEMENT_LOW_COMMENTS,
            MIN_POSTS,
        );

        let metrics = json!({
            "avg_volume": avg_volume,
            "engagement": engagement,
        });

        signal_from_llm(
            self.llm.as_ref(),
            self.key(),
            ticker,
            date,
            &prompt,
            Some(metrics),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, CommunityPost, FixtureDataProvider};
    use crate::llm::ScriptedReasoningClient;
    use crate::models::Signal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_liquidity_with_full_data() {
        let data = Arc::new(FixtureDataProvider::new());
        data.set_candles(
            "item",
            (14..=20)
                .map(|day| Candle {
                    date: date(&format!("2025-09-{:02}", day)),
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.0,
                    volume: 150.0,
                })
                .collect(),
        )
        .await;
        data.set_posts(
            "item",
            (0..5)
                .map(|i| CommunityPost {
                    title: format!("post {}", i),
                    body: String::new(),
                    score: 60,
                    num_comments: 25,
                    created: date("2025-09-19"),
                })
                .collect(),
        )
        .await;

        let llm = Arc::new(ScriptedReasoningClient::new(
            r#"{"signal": "Bullish", "confidence": 0.8, "justification": "high volume and engagement"}"#,
        ));

        let analyst = LiquidityAnalyst::new(data, llm);
        let signal = analyst.analyze("item", date("2025-09-20")).await.unwrap();
        assert_eq!(signal.signal, Signal::Bullish);

        let metrics = signal.metrics.unwrap();
        assert_eq!(metrics["avg_volume"], 150.0);
        assert_eq!(metrics["engagement"]["post_count"], 5);
    }

    #[tokio::test]
    async fn test_liquidity_without_data_still_signals() {
        let data = Arc::new(FixtureDataProvider::new());
        let llm = Arc::new(ScriptedReasoningClient::new(
            r#"{"signal": "Bearish", "confidence": 0.5, "justification": "no activity observable"}"#,
        ));

        let analyst = LiquidityAnalyst::new(data, llm);
        let signal = analyst.analyze("item", date("2025-09-20")).await.unwrap();
        assert_eq!(signal.signal, Signal::Bearish);
    }
}
