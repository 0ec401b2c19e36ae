//! Contrarian sentiment specialist
//!
//! Runs the base sentiment analysis first, then asks the reasoning
//! service to invert it: overly bullish chatter reads as overheating,
//! negative chatter as overselling, Neutral stays Neutral.

use crate::analysts::{signal_from_llm, sentiment::SentimentAnalyst, Analyst};
use crate::data::MarketDataProvider;
use crate::error::Result;
use crate::llm::ReasoningClient;
use crate::models::{AnalystKey, AnalystSignal};
use crate::prompts;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

pub struct SentimentReverseAnalyst {
    base: SentimentAnalyst,
    llm: Arc<dyn ReasoningClient>,
}

impl SentimentReverseAnalyst {
    pub fn new(data: Arc<dyn MarketDataProvider>, llm: Arc<dyn ReasoningClient>) -> Self {
        Self {
            base: SentimentAnalyst::new(data, llm.clone()),
            llm,
        }
    }
}

#[async_trait]
impl Analyst for SentimentReverseAnalyst {
    fn key(&self) -> AnalystKey {
        AnalystKey::SentimentReverse
    }

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal> {
        let original = self.base.analyze(ticker, date).await?;

        let prompt = prompts::sentiment_reverse_prompt(
            ticker,
            original.signal.as_str(),
            &original.justification,
        );
        let metrics = json!({
            "original_signal": original.signal.as_str(),
            "original_confidence": original.confidence,
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
    use crate::data::{CommunityPost, FixtureDataProvider};
    use crate::llm::ScriptedReasoningClient;
    use crate::models::Signal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_reversed_signal_keeps_original_in_metrics() {
        let data = Arc::new(FixtureDataProvider::new());
        data.set_posts(
            "item",
            (0..6)
                .map(|i| CommunityPost {
                    title: format!("hype {}", i),
                    body: "to the moon".to_string(),
                    score: 100,
                    num_comments: 40,
                    created: date("2025-09-20"),
                })
                .collect(),
        )
        .await;

        let llm = Arc::new(ScriptedReasoningClient::new("unused"));
        // First call: base sentiment. Second call: contrarian inversion.
        llm.push(r#"{"signal": "Bullish", "confidence": 0.9, "justification": "euphoric chatter"}"#);
        llm.push(r#"{"signal": "Bearish", "confidence": 0.7, "justification": "overheated market"}"#);

        let analyst = SentimentReverseAnalyst::new(data, llm);
        let signal = analyst.analyze("item", date("2025-09-21")).await.unwrap();

        assert_eq!(signal.analyst, AnalystKey::SentimentReverse);
        assert_eq!(signal.signal, Signal::Bearish);
        assert_eq!(signal.metrics.unwrap()["original_signal"], "Bullish");
    }
}
