//! Planner trait and implementations
//!
//! The planner selects which analysts to run for one ticker on one
//! trading date. Selection is advisory: the workflow falls back to the
//! full enabled set when planning fails.

use crate::error::{FundError, Result};
use crate::models::AnalystKey;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod llm;
pub use llm::LlmPlanner;

/// Trait for analyst selection (optionally LLM controlled)
#[async_trait]
pub trait AnalystPlanner: Send + Sync {
    /// Pick the analysts worth running. The returned set must be a
    /// non-empty subset of `enabled`, in `enabled` order.
    async fn select(
        &self,
        ticker: &str,
        date: NaiveDate,
        enabled: &[AnalystKey],
    ) -> Result<Vec<AnalystKey>>;
}

/// Deterministic planner: runs every enabled analyst. Keeps the system
/// functional without a reasoning service.
pub struct PassthroughPlanner;

#[async_trait]
impl AnalystPlanner for PassthroughPlanner {
    async fn select(
        &self,
        _ticker: &str,
        _date: NaiveDate,
        enabled: &[AnalystKey],
    ) -> Result<Vec<AnalystKey>> {
        if enabled.is_empty() {
            return Err(FundError::Planning("no analysts enabled".to_string()));
        }
        Ok(enabled.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_returns_full_set() {
        let planner = PassthroughPlanner;
        let enabled = vec![AnalystKey::Technical, AnalystKey::Liquidity];
        let selected = planner
            .select("item", date("2025-09-20"), &enabled)
            .await
            .unwrap();
        assert_eq!(selected, enabled);
    }

    #[tokio::test]
    async fn test_passthrough_rejects_empty_set() {
        let planner = PassthroughPlanner;
        let err = planner
            .select("item", date("2025-09-20"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, FundError::Planning(_)));
    }
}
