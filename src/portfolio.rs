//! Portfolio manager: evidence in, one committed-ready decision out
//!
//! The manager is pure over its inputs: it never mutates the portfolio
//! and never talks to the reasoning service. Confidence-weighted
//! majority voting picks a direction, risk limits size the order, and
//! every forced hold carries a reason distinguishable in the log.

use crate::config::RiskLimits;
use crate::models::{
    Action, AnalystSignal, Decision, DecisionReason, Evidence, PositionSnapshot, PortfolioState,
    Signal, EPSILON,
};
use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

/// Peak tracking for the drawdown guard. Loss is measured against
/// initial capital, not against the peak.
#[derive(Debug, Clone, Copy)]
pub struct DrawdownState {
    pub initial_capital: f64,
    pub peak_value: f64,
}

impl DrawdownState {
    pub fn new(initial_capital: f64, current_value: f64) -> Self {
        DrawdownState {
            initial_capital,
            peak_value: initial_capital.max(current_value),
        }
    }

    /// Ratchet the peak up; it never falls.
    pub fn observe(&mut self, total_value: f64) {
        if total_value > self.peak_value {
            self.peak_value = total_value;
        }
    }

    pub fn breached(&self, limit: f64, total_value: f64) -> bool {
        if self.initial_capital <= 0.0 {
            return false;
        }
        (self.peak_value - total_value) / self.initial_capital > limit
    }
}

/// Confidence mass behind each direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub bull: f64,
    pub bear: f64,
    pub total: f64,
}

/// Sum confidence per direction. Neutral signals carry no directional
/// weight but still dilute the aggregate confidence through `total`.
pub fn weigh_signals(signals: &[AnalystSignal]) -> SignalWeights {
    let mut weights = SignalWeights {
        bull: 0.0,
        bear: 0.0,
        total: 0.0,
    };
    for signal in signals {
        weights.total += signal.confidence;
        match signal.signal {
            Signal::Bullish => weights.bull += signal.confidence,
            Signal::Bearish => weights.bear += signal.confidence,
            Signal::Neutral => {}
        }
    }
    weights
}

pub struct PortfolioManager {
    limits: RiskLimits,
}

impl PortfolioManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Decide for one ticker at one price. The returned decision is
    /// ready to persist and apply; this method itself changes nothing.
    pub fn decide(
        &self,
        ticker: &str,
        date: NaiveDate,
        price: f64,
        evidence: &Evidence,
        portfolio: &PortfolioState,
        drawdown: &DrawdownState,
    ) -> Decision {
        let pre = PositionSnapshot {
            cash: portfolio.cash,
            quantity: portfolio.quantity(ticker),
        };

        let bundle = match evidence {
            Evidence::Signals(bundle) => bundle,
            Evidence::NoEvidence { invoked, failed } => {
                warn!(%ticker, %date, "No evidence, holding");
                return Decision::hold(
                    ticker,
                    date,
                    price,
                    DecisionReason::NoEvidence,
                    pre,
                    format!(
                        "all {} selected analysts failed ({} failures)",
                        invoked.len(),
                        failed.len()
                    ),
                );
            }
        };

        let weights = weigh_signals(&bundle.signals);
        debug!(
            %ticker,
            bull = weights.bull,
            bear = weights.bear,
            total = weights.total,
            "Signals weighed"
        );

        if weights.total < EPSILON || (weights.bull - weights.bear).abs() < EPSILON {
            return Decision::hold(
                ticker,
                date,
                price,
                DecisionReason::TieBreak,
                pre,
                format!(
                    "no directional majority: bull {:.3} vs bear {:.3}",
                    weights.bull, weights.bear
                ),
            );
        }

        let confidence = (weights.bull - weights.bear).abs() / weights.total;
        let justification = format!(
            "{} of {} signals bullish ({:.3}) vs bearish ({:.3}), aggregate confidence {:.3}",
            bundle
                .signals
                .iter()
                .filter(|s| s.signal == Signal::Bullish)
                .count(),
            bundle.signals.len(),
            weights.bull,
            weights.bear,
            confidence,
        );

        if weights.bull > weights.bear {
            self.size_buy(ticker, date, price, confidence, portfolio, drawdown, pre, justification)
        } else {
            self.size_sell(ticker, date, price, pre, justification)
        }
    }

    /// Size a buy toward `confidence * max_position_ratio` of total
    /// value. Never partial on a funding shortfall: either the full
    /// sized order fits in cash or the decision is a forced hold.
    #[allow(clippy::too_many_arguments)]
    fn size_buy(
        &self,
        ticker: &str,
        date: NaiveDate,
        price: f64,
        confidence: f64,
        portfolio: &PortfolioState,
        drawdown: &DrawdownState,
        pre: PositionSnapshot,
        justification: String,
    ) -> Decision {
        let total_value = portfolio.total_value_marked(ticker, price);

        if let Some(limit) = self.limits.max_drawdown_ratio {
            if drawdown.breached(limit, total_value) {
                warn!(
                    %ticker,
                    peak = drawdown.peak_value,
                    current = total_value,
                    limit,
                    "Drawdown guard active, blocking new exposure"
                );
                return Decision::hold(
                    ticker,
                    date,
                    price,
                    DecisionReason::DrawdownGuard,
                    pre,
                    format!(
                        "drawdown {:.3} of initial capital exceeds limit {:.3}",
                        (drawdown.peak_value - total_value) / drawdown.initial_capital,
                        limit
                    ),
                );
            }
        }

        let target_value = confidence * self.limits.max_position_ratio * total_value;
        let current_value = pre.quantity * price;
        let delta_value = target_value - current_value;

        if delta_value <= price * EPSILON {
            return Decision::hold(
                ticker,
                date,
                price,
                DecisionReason::SignalDriven,
                pre,
                format!("{}; position already at target", justification),
            );
        }

        let quantity = delta_value / price;
        let fee = quantity * price * self.limits.transaction_fee_rate;
        let cost = quantity * price + fee;

        if cost > pre.cash + EPSILON {
            warn!(%ticker, cost, cash = pre.cash, "Insufficient funds, holding");
            return Decision::hold(
                ticker,
                date,
                price,
                DecisionReason::InsufficientFunds,
                pre,
                format!(
                    "buy of {:.4} units needs {:.2} against {:.2} cash",
                    quantity, cost, pre.cash
                ),
            );
        }

        Decision {
            id: Uuid::new_v4(),
            ticker: ticker.to_string(),
            trading_date: date,
            action: Action::Buy,
            quantity_delta: quantity,
            cash_delta: -cost,
            fee_paid: fee,
            price,
            reason: DecisionReason::SignalDriven,
            pre,
            post: PositionSnapshot {
                cash: pre.cash - cost,
                quantity: pre.quantity + quantity,
            },
            justification,
        }
    }

    /// A bearish majority always liquidates the full position: the
    /// signed target fraction is negative and quantities never go below
    /// zero, so the clamped target is zero units.
    fn size_sell(
        &self,
        ticker: &str,
        date: NaiveDate,
        price: f64,
        pre: PositionSnapshot,
        justification: String,
    ) -> Decision {
        if pre.quantity < EPSILON {
            return Decision::hold(
                ticker,
                date,
                price,
                DecisionReason::SignalDriven,
                pre,
                format!("{}; no position to reduce", justification),
            );
        }

        let quantity = pre.quantity;
        let fee = quantity * price * self.limits.transaction_fee_rate;
        let proceeds = quantity * price - fee;

        Decision {
            id: Uuid::new_v4(),
            ticker: ticker.to_string(),
            trading_date: date,
            action: Action::Sell,
            quantity_delta: -quantity,
            cash_delta: proceeds,
            fee_paid: fee,
            price,
            reason: DecisionReason::SignalDriven,
            pre,
            post: PositionSnapshot {
                cash: pre.cash + proceeds,
                quantity: 0.0,
            },
            justification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalystKey, EvidenceBundle};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn limits() -> RiskLimits {
        RiskLimits {
            max_position_ratio: 0.5,
            transaction_fee_rate: 0.02,
            max_drawdown_ratio: None,
        }
    }

    fn signal(direction: Signal, confidence: f64) -> AnalystSignal {
        AnalystSignal {
            analyst: AnalystKey::Technical,
            ticker: "item".to_string(),
            trading_date: date("2025-09-20"),
            signal: direction,
            confidence,
            justification: String::new(),
            metrics: None,
        }
    }

    fn evidence(signals: Vec<AnalystSignal>) -> Evidence {
        Evidence::Signals(EvidenceBundle {
            ticker: "item".to_string(),
            trading_date: date("2025-09-20"),
            invoked: signals.iter().map(|s| s.analyst).collect(),
            failed: vec![],
            signals,
        })
    }

    fn fresh_portfolio(cash: f64) -> PortfolioState {
        PortfolioState::new("test", cash, date("2025-09-20"))
    }

    #[test]
    fn test_full_confidence_buy_targets_half_the_portfolio() {
        let manager = PortfolioManager::new(limits());
        let portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bullish, 1.0)]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Buy);
        assert!((decision.quantity_delta - 50.0).abs() < 1e-6);
        assert!((decision.post.cash - 4_900.0).abs() < 1e-6);
        assert!((decision.fee_paid - 100.0).abs() < 1e-6);
        assert_eq!(decision.reason, DecisionReason::SignalDriven);
    }

    #[test]
    fn test_bearish_majority_liquidates_fully() {
        let manager = PortfolioManager::new(limits());
        let mut portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let buy = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bullish, 1.0)]),
            &portfolio,
            &drawdown,
        );
        portfolio.apply(&buy);

        let sell = manager.decide(
            "item",
            date("2025-09-21"),
            100.0,
            &evidence(vec![signal(Signal::Bearish, 1.0)]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(sell.action, Action::Sell);
        assert!((sell.quantity_delta + 50.0).abs() < 1e-6);
        assert!((sell.post.quantity).abs() < 1e-9);
        // 50 * 100 * 0.98 proceeds on top of 4900 cash.
        assert!((sell.post.cash - 9_800.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_confidence_scales_the_target() {
        let manager = PortfolioManager::new(limits());
        let portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        // bull 0.8, bear 0.2, total 1.0 -> confidence 0.6.
        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![
                signal(Signal::Bullish, 0.8),
                signal(Signal::Bearish, 0.2),
            ]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Buy);
        // 0.6 * 0.5 * 10000 = 3000 target -> 30 units.
        assert!((decision.quantity_delta - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_neutral_signals_dilute_confidence() {
        let signals = vec![
            signal(Signal::Bullish, 0.6),
            signal(Signal::Neutral, 0.6),
        ];
        let weights = weigh_signals(&signals);
        assert!((weights.bull - 0.6).abs() < 1e-9);
        assert!((weights.total - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_tie_holds_with_tie_break_reason() {
        let manager = PortfolioManager::new(limits());
        let portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![
                signal(Signal::Bullish, 0.5),
                signal(Signal::Bearish, 0.5),
            ]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, DecisionReason::TieBreak);
    }

    #[test]
    fn test_no_evidence_holds_with_its_own_reason() {
        let manager = PortfolioManager::new(limits());
        let portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &Evidence::NoEvidence {
                invoked: vec![AnalystKey::Technical],
                failed: vec![],
            },
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, DecisionReason::NoEvidence);
    }

    #[test]
    fn test_insufficient_funds_forces_hold() {
        let manager = PortfolioManager::new(limits());
        let mut portfolio = fresh_portfolio(10_000.0);
        // Nearly all value tied up in another ticker; cash cannot cover
        // the sized order for this one.
        portfolio.cash = 100.0;
        portfolio.positions.insert(
            "other".to_string(),
            crate::models::Position {
                quantity: 99.0,
                value: 9_900.0,
            },
        );
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bullish, 1.0)]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, DecisionReason::InsufficientFunds);
        assert_eq!(decision.pre, decision.post);
    }

    #[test]
    fn test_drawdown_guard_blocks_buys_not_sells() {
        let mut guarded = limits();
        guarded.max_drawdown_ratio = Some(0.1);
        let manager = PortfolioManager::new(guarded);

        // Peak 10000, current value 8900: drawdown 0.11 > 0.1.
        let mut portfolio = fresh_portfolio(8_400.0);
        portfolio.positions.insert(
            "item".to_string(),
            crate::models::Position {
                quantity: 5.0,
                value: 500.0,
            },
        );
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let buy = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bullish, 1.0)]),
            &portfolio,
            &drawdown,
        );
        assert_eq!(buy.action, Action::Hold);
        assert_eq!(buy.reason, DecisionReason::DrawdownGuard);

        let sell = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bearish, 1.0)]),
            &portfolio,
            &drawdown,
        );
        assert_eq!(sell.action, Action::Sell);
    }

    #[test]
    fn test_sell_without_position_holds() {
        let manager = PortfolioManager::new(limits());
        let portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        let decision = manager.decide(
            "item",
            date("2025-09-20"),
            100.0,
            &evidence(vec![signal(Signal::Bearish, 0.9)]),
            &portfolio,
            &drawdown,
        );

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, DecisionReason::SignalDriven);
    }

    #[test]
    fn test_position_never_exceeds_max_ratio() {
        let manager = PortfolioManager::new(limits());
        let mut portfolio = fresh_portfolio(10_000.0);
        let drawdown = DrawdownState::new(10_000.0, 10_000.0);

        // Repeated max-confidence buys converge on the cap instead of
        // blowing past it.
        for day in 20..25 {
            let decision = manager.decide(
                "item",
                date(&format!("2025-09-{}", day)),
                100.0,
                &evidence(vec![signal(Signal::Bullish, 1.0)]),
                &portfolio,
                &drawdown,
            );
            portfolio.apply(&decision);

            let total = portfolio.total_value_marked("item", 100.0);
            let position_value = portfolio.quantity("item") * 100.0;
            assert!(position_value <= 0.5 * total + 1e-6);
        }
    }

    #[test]
    fn test_peak_only_ratchets_up() {
        let mut drawdown = DrawdownState::new(10_000.0, 10_000.0);
        drawdown.observe(12_000.0);
        assert_eq!(drawdown.peak_value, 12_000.0);
        drawdown.observe(9_000.0);
        assert_eq!(drawdown.peak_value, 12_000.0);
    }
}
