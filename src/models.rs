//! Core data models for the trading fund

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tolerance for float comparisons on cash and quantities.
pub const EPSILON: f64 = 1e-9;

//
// ================= Enums =================
//

/// Directional opinion emitted by an analyst.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Bullish => "Bullish",
            Signal::Bearish => "Bearish",
            Signal::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" => Ok(Signal::Bullish),
            "bearish" => Ok(Signal::Bearish),
            "neutral" => Ok(Signal::Neutral),
            other => Err(format!("unknown signal '{}'", other)),
        }
    }
}

/// Final trading action for one ticker on one date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "Buy",
            Action::Sell => "Sell",
            Action::Hold => "Hold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of analyst identifiers. Adding an analyst means adding a
/// variant here plus a registry entry, not runtime discovery.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum AnalystKey {
    Technical,
    Sentiment,
    SentimentReverse,
    Liquidity,
    Event,
}

impl AnalystKey {
    pub const ALL: [AnalystKey; 5] = [
        AnalystKey::Technical,
        AnalystKey::Sentiment,
        AnalystKey::SentimentReverse,
        AnalystKey::Liquidity,
        AnalystKey::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystKey::Technical => "technical",
            AnalystKey::Sentiment => "sentiment",
            AnalystKey::SentimentReverse => "sentiment_reverse",
            AnalystKey::Liquidity => "liquidity",
            AnalystKey::Event => "event",
        }
    }

    /// Short description used in the planner prompt.
    pub fn doc(&self) -> &'static str {
        match self {
            AnalystKey::Technical => {
                "Technical analysis specialist using multiple technical analysis strategies."
            }
            AnalystKey::Sentiment => {
                "Sentiment analysis specialist analyzing community discussion sentiment for market items."
            }
            AnalystKey::SentimentReverse => {
                "Contrarian sentiment specialist: overly bullish chatter may indicate overheating and yields a bearish signal, and vice versa."
            }
            AnalystKey::Liquidity => {
                "Liquidity analysis specialist analyzing trading volume and community engagement."
            }
            AnalystKey::Event => {
                "Event analysis specialist analyzing official news and game updates for price impact (supply mechanism, visibility, market sentiment)."
            }
        }
    }
}

impl fmt::Display for AnalystKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnalystKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(AnalystKey::Technical),
            "sentiment" => Ok(AnalystKey::Sentiment),
            "sentiment_reverse" => Ok(AnalystKey::SentimentReverse),
            "liquidity" => Ok(AnalystKey::Liquidity),
            "event" => Ok(AnalystKey::Event),
            other => Err(format!("unknown analyst key '{}'", other)),
        }
    }
}

//
// ================= Analyst output =================
//

/// One analyst's opinion for one ticker on one date. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystSignal {
    pub analyst: AnalystKey,
    pub ticker: String,
    pub trading_date: NaiveDate,
    pub signal: Signal,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub justification: String,
    /// Optional structured sub-metrics (trend strength, engagement, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

/// A selected analyst that failed to produce a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystFailure {
    pub analyst: AnalystKey,
    pub reason: String,
}

/// The fan-in result for one ticker/day: surviving signals plus
/// bookkeeping of which analysts ran and which failed.
///
/// Invariant: `signals` is non-empty; the all-failed case is represented
/// by `Evidence::NoEvidence`, never by an empty bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub ticker: String,
    pub trading_date: NaiveDate,
    pub signals: Vec<AnalystSignal>,
    pub invoked: Vec<AnalystKey>,
    pub failed: Vec<AnalystFailure>,
}

/// Aggregator output. "No evidence" is an explicit branch the portfolio
/// manager must handle, not a default falling through numeric logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Evidence {
    Signals(EvidenceBundle),
    NoEvidence {
        invoked: Vec<AnalystKey>,
        failed: Vec<AnalystFailure>,
    },
}

//
// ================= Decision =================
//

/// Why a decision came out the way it did. Forced holds are
/// distinguishable in the log from signal-driven ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    SignalDriven,
    NoEvidence,
    TieBreak,
    InsufficientFunds,
    DrawdownGuard,
}

/// Cash and per-ticker quantity at a single point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub cash: f64,
    pub quantity: f64,
}

/// Output of the portfolio manager for one ticker/date. Immutable and
/// append-only; the decision log alone is sufficient to replay the
/// portfolio from its initial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub ticker: String,
    pub trading_date: NaiveDate,
    pub action: Action,
    /// Signed quantity delta (positive buys, negative sells).
    pub quantity_delta: f64,
    /// Signed cash delta, fee-inclusive.
    pub cash_delta: f64,
    pub fee_paid: f64,
    /// Execution price for the ticker on this date.
    pub price: f64,
    pub reason: DecisionReason,
    pub pre: PositionSnapshot,
    pub post: PositionSnapshot,
    pub justification: String,
}

impl Decision {
    /// A zero-delta hold with an explicit reason.
    pub fn hold(
        ticker: &str,
        trading_date: NaiveDate,
        price: f64,
        reason: DecisionReason,
        snapshot: PositionSnapshot,
        justification: String,
    ) -> Self {
        Decision {
            id: Uuid::new_v4(),
            ticker: ticker.to_string(),
            trading_date,
            action: Action::Hold,
            quantity_delta: 0.0,
            cash_delta: 0.0,
            fee_paid: 0.0,
            price,
            reason,
            pre: snapshot,
            post: snapshot,
            justification,
        }
    }
}

//
// ================= Portfolio =================
//

/// A held position in one ticker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub quantity: f64,
    /// Quantity marked at the last execution price seen for this ticker.
    pub value: f64,
}

/// The system's sole mutable entity. Owned exclusively by the workflow
/// engine during a run; every other component sees read-only snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub id: Uuid,
    pub experiment: String,
    pub trading_date: NaiveDate,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    /// Append-only decision history for this run lineage.
    pub decisions: Vec<Decision>,
}

impl PortfolioState {
    pub fn new(experiment: &str, initial_cash: f64, trading_date: NaiveDate) -> Self {
        PortfolioState {
            id: Uuid::new_v4(),
            experiment: experiment.to_string(),
            trading_date,
            cash: initial_cash,
            positions: BTreeMap::new(),
            decisions: Vec::new(),
        }
    }

    pub fn quantity(&self, ticker: &str) -> f64 {
        self.positions.get(ticker).map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Cash plus position values at their last-known prices.
    pub fn total_value(&self) -> f64 {
        self.cash + self.positions.values().map(|p| p.value).sum::<f64>()
    }

    /// Total value with `ticker` marked at `price` instead of its
    /// last-known value.
    pub fn total_value_marked(&self, ticker: &str, price: f64) -> f64 {
        let rest: f64 = self
            .positions
            .iter()
            .filter(|(t, _)| t.as_str() != ticker)
            .map(|(_, p)| p.value)
            .sum();
        self.cash + rest + self.quantity(ticker) * price
    }

    /// Commit a decision: the only operation that mutates cash and
    /// positions. Zero positions are pruned.
    pub fn apply(&mut self, decision: &Decision) {
        self.cash += decision.cash_delta;

        let quantity = self.quantity(&decision.ticker) + decision.quantity_delta;
        if quantity.abs() < EPSILON {
            self.positions.remove(&decision.ticker);
        } else {
            self.positions.insert(
                decision.ticker.clone(),
                Position {
                    quantity,
                    value: quantity * decision.price,
                },
            );
        }

        self.trading_date = decision.trading_date;
        self.decisions.push(decision.clone());
    }

    /// Rebuild a portfolio purely from its decision log. Applying the
    /// same log to the same initial state always yields the same result.
    pub fn replay(
        experiment: &str,
        initial_cash: f64,
        start_date: NaiveDate,
        decisions: &[Decision],
    ) -> Self {
        let mut portfolio = PortfolioState::new(experiment, initial_cash, start_date);
        for decision in decisions {
            portfolio.apply(decision);
        }
        portfolio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_signal_round_trip() {
        assert_eq!("Bullish".parse::<Signal>().unwrap(), Signal::Bullish);
        assert_eq!("neutral".parse::<Signal>().unwrap(), Signal::Neutral);
        assert!("sideways".parse::<Signal>().is_err());
    }

    #[test]
    fn test_analyst_key_round_trip() {
        for key in AnalystKey::ALL {
            assert_eq!(key.as_str().parse::<AnalystKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_apply_prunes_zero_positions() {
        let mut portfolio = PortfolioState::new("test", 1000.0, date("2025-09-25"));

        let buy = Decision {
            id: Uuid::new_v4(),
            ticker: "AK-47 | Redline".to_string(),
            trading_date: date("2025-09-25"),
            action: Action::Buy,
            quantity_delta: 5.0,
            cash_delta: -510.0,
            fee_paid: 10.0,
            price: 100.0,
            reason: DecisionReason::SignalDriven,
            pre: PositionSnapshot { cash: 1000.0, quantity: 0.0 },
            post: PositionSnapshot { cash: 490.0, quantity: 5.0 },
            justification: String::new(),
        };
        portfolio.apply(&buy);
        assert_eq!(portfolio.quantity("AK-47 | Redline"), 5.0);
        assert!((portfolio.cash - 490.0).abs() < EPSILON);

        let sell = Decision {
            quantity_delta: -5.0,
            cash_delta: 490.0,
            action: Action::Sell,
            post: PositionSnapshot { cash: 980.0, quantity: 0.0 },
            pre: PositionSnapshot { cash: 490.0, quantity: 5.0 },
            id: Uuid::new_v4(),
            ..buy.clone()
        };
        portfolio.apply(&sell);
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut portfolio = PortfolioState::new("test", 10000.0, date("2025-09-25"));
        let decision = Decision {
            id: Uuid::new_v4(),
            ticker: "item".to_string(),
            trading_date: date("2025-09-25"),
            action: Action::Buy,
            quantity_delta: 50.0,
            cash_delta: -5100.0,
            fee_paid: 100.0,
            price: 100.0,
            reason: DecisionReason::SignalDriven,
            pre: PositionSnapshot { cash: 10000.0, quantity: 0.0 },
            post: PositionSnapshot { cash: 4900.0, quantity: 50.0 },
            justification: String::new(),
        };
        portfolio.apply(&decision);

        let replayed =
            PortfolioState::replay("test", 10000.0, date("2025-09-25"), &portfolio.decisions);
        assert_eq!(replayed.cash, portfolio.cash);
        assert_eq!(replayed.positions, portfolio.positions);
    }

    #[test]
    fn test_total_value_marked() {
        let mut portfolio = PortfolioState::new("test", 100.0, date("2025-09-25"));
        portfolio.positions.insert(
            "a".to_string(),
            Position { quantity: 2.0, value: 200.0 },
        );
        portfolio.positions.insert(
            "b".to_string(),
            Position { quantity: 1.0, value: 50.0 },
        );

        assert!((portfolio.total_value() - 350.0).abs() < EPSILON);
        // Re-mark "a" at 150 per unit.
        assert!((portfolio.total_value_marked("a", 150.0) - 450.0).abs() < EPSILON);
    }
}
