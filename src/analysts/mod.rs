//! Analyst pool: a closed set of specialists behind one capability trait
//!
//! Analysts are stateless with respect to workflow state: they read
//! market/community/news context, call the reasoning service once or
//! twice, and emit exactly one signal. They never see the portfolio and
//! never observe each other's output, which is what makes fan-out
//! parallelism safe.

use crate::data::MarketDataProvider;
use crate::error::{FundError, Result};
use crate::llm::{parse_structured, ReasoningClient};
use crate::models::{AnalystKey, AnalystSignal, Signal};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub mod event;
pub mod liquidity;
pub mod sentiment;
pub mod sentiment_reverse;
pub mod technical;

pub use event::EventAnalyst;
pub use liquidity::LiquidityAnalyst;
pub use sentiment::SentimentAnalyst;
pub use sentiment_reverse::SentimentReverseAnalyst;
pub use technical::TechnicalAnalyst;

/// One analyst specialist. `analyze` is per-ticker, per-date; malformed
/// reasoning output is a recoverable `SignalParse` failure.
#[async_trait]
pub trait Analyst: Send + Sync {
    fn key(&self) -> AnalystKey;

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal>;
}

/// Static mapping from analyst key to implementation, built at startup.
pub struct AnalystRegistry {
    analysts: HashMap<AnalystKey, Arc<dyn Analyst>>,
}

impl AnalystRegistry {
    pub fn new() -> Self {
        Self {
            analysts: HashMap::new(),
        }
    }

    pub fn register(&mut self, analyst: Arc<dyn Analyst>) {
        self.analysts.insert(analyst.key(), analyst);
    }

    pub fn get(&self, key: AnalystKey) -> Option<Arc<dyn Analyst>> {
        self.analysts.get(&key).cloned()
    }

    pub fn keys(&self) -> Vec<AnalystKey> {
        let mut keys: Vec<AnalystKey> = self.analysts.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl Default for AnalystRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry with every analyst variant wired to the shared
/// data provider and reasoning client.
pub fn build_registry(
    data: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn ReasoningClient>,
) -> AnalystRegistry {
    let mut registry = AnalystRegistry::new();

    registry.register(Arc::new(TechnicalAnalyst::new(data.clone(), llm.clone())));
    registry.register(Arc::new(SentimentAnalyst::new(data.clone(), llm.clone())));
    registry.register(Arc::new(SentimentReverseAnalyst::new(
        data.clone(),
        llm.clone(),
    )));
    registry.register(Arc::new(LiquidityAnalyst::new(data.clone(), llm.clone())));
    registry.register(Arc::new(EventAnalyst::new(data, llm)));

    registry
}

/// Shape every analyst asks the reasoning service to return.
#[derive(Debug, Deserialize)]
struct RawSignal {
    signal: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    justification: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Issue one reasoning call and parse the structured signal out of it.
pub(crate) async fn signal_from_llm(
    llm: &dyn ReasoningClient,
    key: AnalystKey,
    ticker: &str,
    date: NaiveDate,
    prompt: &str,
    metrics: Option<serde_json::Value>,
) -> Result<AnalystSignal> {
    let raw = llm.complete(prompt).await?;

    let parsed: RawSignal = parse_structured(&raw).map_err(|e| FundError::SignalParse {
        analyst: key.to_string(),
        reason: format!("{} | raw={}", e, raw),
    })?;

    let signal: Signal = parsed
        .signal
        .parse()
        .map_err(|e: String| FundError::SignalParse {
            analyst: key.to_string(),
            reason: e,
        })?;

    debug!(analyst = %key, %ticker, %signal, confidence = parsed.confidence, "Signal parsed");

    Ok(AnalystSignal {
        analyst: key,
        ticker: ticker.to_string(),
        trading_date: date,
        signal,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        justification: parsed.justification,
        metrics,
    })
}
