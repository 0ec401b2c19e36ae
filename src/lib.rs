//! CS2 Skin Fund Orchestrator
//!
//! An LLM-driven trading fund for game-skin market items:
//! - Plans which analysts to consult per ticker (optional LLM planner)
//! - Fans analysts out concurrently, aggregates their signals
//! - Sizes decisions with confidence-weighted voting under risk limits
//! - Persists portfolios, decisions and signals per experiment
//! - Replays any portfolio from its append-only decision log
//!
//! DAILY LOOP (per ticker):
//! PLAN → ANALYZE → AGGREGATE → DECIDE → COMMIT

pub mod aggregator;
pub mod analysts;
pub mod config;
pub mod data;
pub mod error;
pub mod llm;
pub mod models;
pub mod planner;
pub mod portfolio;
pub mod prompts;
pub mod state;
pub mod workflow;

pub use error::{FundError, Result};

// Re-export common types
pub use models::*;
pub use workflow::FundWorkflow;
