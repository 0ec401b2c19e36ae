//! Experiment configuration
//!
//! Experiments are described by YAML files; secrets (API keys, database
//! URL) come from the environment.

use crate::error::{FundError, Result};
use crate::llm::Provider;
use crate::models::AnalystKey;
use serde::Deserialize;
use std::path::Path;

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_fee_rate() -> f64 {
    0.02
}

fn default_max_position_ratio() -> f64 {
    0.5
}

/// Reasoning service selection plus its retry/timeout budget.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// One experiment: ticker universe, enabled analysts, risk limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub exp_name: String,
    /// Initial cash for a fresh portfolio.
    pub cashflow: f64,
    /// Ticker universe; processing order within a day follows this list.
    pub tickers: Vec<String>,
    /// Enabled analyst set. Empty means all registered analysts.
    #[serde(default)]
    pub workflow_analysts: Vec<AnalystKey>,
    /// When true, a reasoning call selects a subset of the enabled
    /// analysts per ticker; when false the full enabled set runs.
    #[serde(default)]
    pub planner_mode: bool,
    pub llm: LlmConfig,
    #[serde(default = "default_fee_rate")]
    pub transaction_fee_rate: f64,
    #[serde(default = "default_max_position_ratio")]
    pub max_position_ratio: f64,
    /// Optional drawdown guard: maximum fraction of initial capital that
    /// may be lost from peak before new long exposure is blocked.
    #[serde(default)]
    pub max_drawdown_ratio: Option<f64>,
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ExperimentConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exp_name.trim().is_empty() {
            return Err(FundError::Config("exp_name must not be empty".to_string()));
        }
        if self.cashflow <= 0.0 {
            return Err(FundError::Config(format!(
                "cashflow must be positive, got {}",
                self.cashflow
            )));
        }
        if self.tickers.is_empty() {
            return Err(FundError::Config("tickers must not be empty".to_string()));
        }
        if !(0.0..1.0).contains(&self.transaction_fee_rate) {
            return Err(FundError::Config(format!(
                "transaction_fee_rate must be in [0, 1), got {}",
                self.transaction_fee_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.max_position_ratio) || self.max_position_ratio == 0.0 {
            return Err(FundError::Config(format!(
                "max_position_ratio must be in (0, 1], got {}",
                self.max_position_ratio
            )));
        }
        if let Some(limit) = self.max_drawdown_ratio {
            if !(0.0..1.0).contains(&limit) || limit == 0.0 {
                return Err(FundError::Config(format!(
                    "max_drawdown_ratio must be in (0, 1), got {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Enabled analyst set with duplicates removed; defaults to every
    /// registered analyst when the config lists none.
    pub fn enabled_analysts(&self) -> Vec<AnalystKey> {
        if self.workflow_analysts.is_empty() {
            return AnalystKey::ALL.to_vec();
        }
        let mut seen = Vec::new();
        for key in &self.workflow_analysts {
            if !seen.contains(key) {
                seen.push(*key);
            }
        }
        seen
    }

    /// Risk constraints handed to the portfolio manager.
    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            max_position_ratio: self.max_position_ratio,
            transaction_fee_rate: self.transaction_fee_rate,
            max_drawdown_ratio: self.max_drawdown_ratio,
        }
    }
}

/// Constraints the portfolio manager sizes decisions under.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub max_position_ratio: f64,
    pub transaction_fee_rate: f64,
    pub max_drawdown_ratio: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
exp_name: TSLE-ds
cashflow: 10000.0
tickers:
  - "AK-47 | Redline (Field-Tested)"
  - "AWP | Asiimov (Field-Tested)"
workflow_analysts: [technical, sentiment, liquidity, event]
planner_mode: true
llm:
  provider: DeepSeek
  model: deepseek-chat
transaction_fee_rate: 0.02
max_position_ratio: 0.5
max_drawdown_ratio: 0.1
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: ExperimentConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.exp_name, "TSLE-ds");
        assert_eq!(config.tickers.len(), 2);
        assert!(config.planner_mode);
        assert_eq!(config.enabled_analysts().len(), 4);
        assert_eq!(config.max_drawdown_ratio, Some(0.1));
    }

    #[test]
    fn test_empty_analyst_list_enables_all() {
        let mut config: ExperimentConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.workflow_analysts.clear();
        assert_eq!(config.enabled_analysts(), AnalystKey::ALL.to_vec());
    }

    #[test]
    fn test_rejects_bad_fee_rate() {
        let mut config: ExperimentConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.transaction_fee_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_universe() {
        let mut config: ExperimentConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.tickers.clear();
        assert!(config.validate().is_err());
    }
}
