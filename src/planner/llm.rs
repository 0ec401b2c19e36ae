//! LLM-backed analyst selection
//!
//! Asks the reasoning service which analysts are worth running for a
//! ticker. The response is validated against the enabled set: unknown
//! names are dropped with a warning, and an empty selection is a
//! planning error the workflow recovers from.

use crate::error::{FundError, Result};
use crate::llm::{parse_structured, ReasoningClient};
use crate::models::AnalystKey;
use crate::planner::AnalystPlanner;
use crate::prompts;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LlmPlanner {
    llm: Arc<dyn ReasoningClient>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn ReasoningClient>) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct RawSelection {
    analysts: Vec<String>,
    #[serde(default)]
    justification: String,
}

#[async_trait]
impl AnalystPlanner for LlmPlanner {
    async fn select(
        &self,
        ticker: &str,
        date: NaiveDate,
        enabled: &[AnalystKey],
    ) -> Result<Vec<AnalystKey>> {
        if enabled.is_empty() {
            return Err(FundError::Planning("no analysts enabled".to_string()));
        }

        let prompt = prompts::planner_prompt(ticker, date, enabled);
        let raw = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| FundError::Planning(e.to_string()))?;

        let parsed: RawSelection = parse_structured(&raw)
            .map_err(|e| FundError::Planning(format!("{} | raw={}", e, raw)))?;

        let mut requested = Vec::new();
        for name in &parsed.analysts {
            match name.parse::<AnalystKey>() {
                Ok(key) if enabled.contains(&key) => requested.push(key),
                Ok(key) => {
                    warn!(%ticker, analyst = %key, "Planner selected a disabled analyst, dropping")
                }
                Err(_) => warn!(%ticker, analyst = %name, "Planner selected an unknown analyst, dropping"),
            }
        }

        // Canonicalize: enabled order, duplicates collapsed.
        let selected: Vec<AnalystKey> = enabled
            .iter()
            .copied()
            .filter(|key| requested.contains(key))
            .collect();

        if selected.is_empty() {
            return Err(FundError::Planning(format!(
                "no valid analysts in selection {:?}",
                parsed.analysts
            )));
        }

        debug!(
            %ticker,
            selected = ?selected,
            justification = %parsed.justification,
            "Analyst plan ready"
        );

        Ok(selected)
    }
}
