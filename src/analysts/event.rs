//! Event specialist
//!
//! Reads official news in a 7-day window and scores its price impact:
//! supply mechanism first, visibility second, sentiment last.

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

const NEWS_WINDOW_DAYS: u32 = 7;
const NEWS_LIMIT: usize = 15;

pub struct EventAnalyst {
    data: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn ReasoningClient>,
}

impl EventAnalyst {
    pub fn new(data: Arc<dyn MarketDataProvider>, llm: Arc<dyn ReasoningClient>) -> Self {
        Self { data, llm }
    }
}

#[async_trait]
impl Analyst for EventAnalyst {
    fn key(&self) -> AnalystKey {
        AnalystKey::Event
    }

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal> {
        let news = match self
            .data
            .official_news(ticker, date, NEWS_WINDOW_DAYS, NEWS_LIMIT)
            .await
        {
            Ok(news) => news,
            Err(e) => {
                warn!(%ticker, error = %e, "News fetch failed, analyzing with empty set");
                Vec::new()
            }
        };

        let news_json = serde_json::to_string_pretty(&news)?;
        let prompt = prompts::event_prompt(ticker, news.len(), &news_json);
        let metrics = json!({ "news_count": news.len() });

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
    use crate::data::{FixtureDataProvider, NewsItem};
    use crate::llm::ScriptedReasoningClient;
    use crate::models::Signal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_event_analysis_counts_windowed_news() {
        let data = Arc::new(FixtureDataProvider::new());
        data.set_news(
            "item",
            vec![
                NewsItem {
                    title: "New crate released".to_string(),
                    contents: "Adds the item to a new drop pool".to_string(),
                    date: date("2025-09-18"),
                },
                NewsItem {
                    title: "Old update".to_string(),
                    contents: "Outside the window".to_string(),
                    date: date("2025-08-01"),
                },
            ],
        )
        .await;

        let llm = Arc::new(ScriptedReasoningClient::new(
            r#"{"signal": "Bearish", "confidence": 0.6, "justification": "supply increase"}"#,
        ));

        let analyst = EventAnalyst::new(data, llm);
        let signal = analyst.analyze("item", date("2025-09-20")).await.unwrap();
        assert_eq!(signal.signal, Signal::Bearish);
        assert_eq!(signal.metrics.unwrap()["news_count"], 1);
    }

    #[tokio::test]
    async fn test_event_analysis_with_no_news() {
        let data = Arc::new(FixtureDataProvider::new());
        let llm = Arc::new(ScriptedReasoningClient::new(
            r#"{"signal": "Neutral", "confidence": 0.3, "justification": "no news"}"#,
        ));

        let analyst = EventAnalyst::new(data, llm);
        let signal = analyst.analyze("item", date("2025-09-20")).await.unwrap();
        assert_eq!(signal.signal, Signal::Neutral);
    }
}
