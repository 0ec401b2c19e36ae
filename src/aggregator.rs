//! Fan-in of analyst outcomes into evidence
//!
//! Individual analyst failures are recoverable: they are logged, kept
//! for the record, and dropped from the signal set. Only when every
//! selected analyst fails does the evidence degrade to `NoEvidence`.

use crate::models::{AnalystFailure, AnalystKey, AnalystSignal, Evidence, EvidenceBundle};
use chrono::NaiveDate;
use tracing::{info, warn};

/// What one selected analyst produced: a signal, or the error that
/// kept it out of the bundle.
pub struct AnalystOutcome {
    pub analyst: AnalystKey,
    pub result: crate::error::Result<AnalystSignal>,
}

/// Collapse per-analyst outcomes into a single evidence value for the
/// portfolio manager. Outcome order is preserved in the bundle.
pub fn aggregate(ticker: &str, date: NaiveDate, outcomes: Vec<AnalystOutcome>) -> Evidence {
    let invoked: Vec<AnalystKey> = outcomes.iter().map(|o| o.analyst).collect();
    let mut signals = Vec::new();
    let mut failed = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(signal) => signals.push(signal),
            Err(e) => {
                warn!(
                    %ticker,
                    analyst = %outcome.analyst,
                    error = %e,
                    "Analyst dropped from evidence"
                );
                failed.push(AnalystFailure {
                    analyst: outcome.analyst,
                    reason: e.to_string(),
                });
            }
        }
    }

    if signals.is_empty() {
        info!(%ticker, %date, invoked = invoked.len(), "All selected analysts failed");
        return Evidence::NoEvidence { invoked, failed };
    }

    Evidence::Signals(EvidenceBundle {
        ticker: ticker.to_string(),
        trading_date: date,
        signals,
        invoked,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FundError;
    use crate::models::Signal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn signal(analyst: AnalystKey, direction: Signal, confidence: f64) -> AnalystSignal {
        AnalystSignal {
            analyst,
            ticker: "item".to_string(),
            trading_date: date("2025-09-20"),
            signal: direction,
            confidence,
            justification: String::new(),
            metrics: None,
        }
    }

    #[test]
    fn test_failures_are_dropped_but_recorded() {
        let outcomes = vec![
            AnalystOutcome {
                analyst: AnalystKey::Technical,
                result: Ok(signal(AnalystKey::Technical, Signal::Bullish, 0.8)),
            },
            AnalystOutcome {
                analyst: AnalystKey::Sentiment,
                result: Err(FundError::SignalParse {
                    analyst: "sentiment".to_string(),
                    reason: "not json".to_string(),
                }),
            },
        ];

        match aggregate("item", date("2025-09-20"), outcomes) {
            Evidence::Signals(bundle) => {
                assert_eq!(bundle.signals.len(), 1);
                assert_eq!(bundle.invoked.len(), 2);
                assert_eq!(bundle.failed.len(), 1);
                assert_eq!(bundle.failed[0].analyst, AnalystKey::Sentiment);
            }
            Evidence::NoEvidence { .. } => panic!("expected a signal bundle"),
        }
    }

    #[test]
    fn test_all_failed_becomes_no_evidence() {
        let outcomes = vec![AnalystOutcome {
            analyst: AnalystKey::Event,
            result: Err(FundError::SignalParse {
                analyst: "event".to_string(),
                reason: "timed out".to_string(),
            }),
        }];

        match aggregate("item", date("2025-09-20"), outcomes) {
            Evidence::NoEvidence { invoked, failed } => {
                assert_eq!(invoked, vec![AnalystKey::Event]);
                assert_eq!(failed.len(), 1);
            }
            Evidence::Signals(_) => panic!("expected no evidence"),
        }
    }

    #[test]
    fn test_outcome_order_is_preserved() {
        let outcomes = vec![
            AnalystOutcome {
                analyst: AnalystKey::Liquidity,
                result: Ok(signal(AnalystKey::Liquidity, Signal::Neutral, 0.4)),
            },
            AnalystOutcome {
                analyst: AnalystKey::Technical,
                result: Ok(signal(AnalystKey::Technical, Signal::Bearish, 0.6)),
            },
        ];

        match aggregate("item", date("2025-09-20"), outcomes) {
            Evidence::Signals(bundle) => {
                assert_eq!(bundle.signals[0].analyst, AnalystKey::Liquidity);
                assert_eq!(bundle.signals[1].analyst, AnalystKey::Technical);
            }
            Evidence::NoEvidence { .. } => panic!("expected a signal bundle"),
        }
    }
}
