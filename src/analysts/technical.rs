//! Technical analysis specialist
//!
//! Computes deterministic indicator summaries from daily candles, then
//! asks the reasoning service for the directional read.

use crate::analysts::{signal_from_llm, Analyst};
use crate::data::{Candle, MarketDataProvider};
use crate::error::Result;
use crate::llm::ReasoningClient;
use crate::models::{AnalystKey, AnalystSignal};
use crate::prompts;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

const CANDLE_WINDOW_DAYS: u32 = 30;
const RSI_PERIOD: usize = 14;
const MIN_CANDLES: usize = 5;

pub struct TechnicalAnalyst {
    data: Arc<dyn MarketDataProvider>,
    llm: Arc<dyn ReasoningClient>,
}

impl TechnicalAnalyst {
    pub fn new(data: Arc<dyn MarketDataProvider>, llm: Arc<dyn ReasoningClient>) -> Self {
        Self { data, llm }
    }
}

#[async_trait]
impl Analyst for TechnicalAnalyst {
    fn key(&self) -> AnalystKey {
        AnalystKey::Technical
    }

    async fn analyze(&self, ticker: &str, date: NaiveDate) -> Result<AnalystSignal> {
        let candles = self
            .data
            .daily_candles(ticker, date, CANDLE_WINDOW_DAYS)
            .await?;

        let (prompt, metrics) = if candles.len() < MIN_CANDLES {
            let note = format!(
                "Insufficient price history: {} candles (min {})",
                candles.len(),
                MIN_CANDLES
            );
            (
                prompts::technical_prompt(&note, &note, &note, &note, &note, &note),
                None,
            )
        } else {
            let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
            let last = *closes.last().unwrap_or(&0.0);
            let sma = mean(&closes);
            let trend_pct = if sma > 0.0 { (last - sma) / sma * 100.0 } else { 0.0 };
            let z = z_score(&closes);
            let rsi_value = rsi(&closes, RSI_PERIOD);
            let vol = return_volatility(&closes) * 100.0;
            let (support, resistance) = price_levels(&candles);
            let avg_volume = mean(&candles.iter().map(|c| c.volume).collect::<Vec<_>>());

            let trend = format!(
                "last close {:.2} is {:+.1}% versus the {}-day average {:.2}",
                last,
                trend_pct,
                closes.len(),
                sma
            );
            let mean_reversion = format!("z-score of last close versus window mean: {:+.2}", z);
            let rsi_text = format!("{}-period RSI: {:.1}", RSI_PERIOD, rsi_value);
            let volatility = format!("daily return volatility: {:.2}%", vol);
            let volume = format!(
                "average daily volume over the window: {:.0}, latest: {:.0}",
                avg_volume,
                candles.last().map(|c| c.volume).unwrap_or(0.0)
            );
            let levels = format!("support near {:.2}, resistance near {:.2}", support, resistance);

            let metrics = json!({
                "trend_pct": trend_pct,
                "z_score": z,
                "rsi": rsi_value,
                "volatility_pct": vol,
                "support": support,
                "resistance": resistance,
            });

            (
                prompts::technical_prompt(
                    &trend,
                    &mean_reversion,
                    &rsi_text,
                    &volatility,
                    &volume,
                    &levels,
                ),
                Some(metrics),
            )
        };

        signal_from_llm(self.llm.as_ref(), self.key(), ticker, date, &prompt, metrics).await
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn z_score(closes: &[f64]) -> f64 {
    let m = mean(closes);
    let variance = mean(&closes.iter().map(|c| (c - m).powi(2)).collect::<Vec<_>>());
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    (closes.last().copied().unwrap_or(m) - m) / std
}

/// Classic RSI over up/down closes; 50 when there is not enough history.
fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < 2 {
        return 50.0;
    }
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = deltas.len().min(period);
    let recent = &deltas[deltas.len() - window..];

    let gains: f64 = recent.iter().filter(|d| **d > 0.0).sum();
    let losses: f64 = -recent.iter().filter(|d| **d < 0.0).sum::<f64>();

    if losses == 0.0 && gains == 0.0 {
        return 50.0;
    }
    if losses == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + gains / losses)
}

fn return_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return 0.0;
    }
    let m = mean(&returns);
    mean(&returns.iter().map(|r| (r - m).powi(2)).collect::<Vec<_>>()).sqrt()
}

fn price_levels(candles: &[Candle]) -> (f64, f64) {
    let support = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = candles
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    (support, resistance)
}
