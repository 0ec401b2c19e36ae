//! Decision workflow engine
//!
//! Drives the per-ticker, per-day pipeline: plan, fan analysts out,
//! aggregate evidence, decide, commit. The engine owns the portfolio
//! for the duration of a run; everything else sees snapshots.
//!
//! Commit ordering is persist-then-apply: a decision that cannot be
//! written never mutates the in-memory portfolio.

use crate::aggregator::{aggregate, AnalystOutcome};
use crate::analysts::AnalystRegistry;
use crate::config::ExperimentConfig;
use crate::data::MarketDataProvider;
use crate::error::{FundError, Result};
use crate::models::{AnalystKey, PortfolioState};
use crate::planner::AnalystPlanner;
use crate::portfolio::{DrawdownState, PortfolioManager};
use crate::state::FundStore;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub struct FundWorkflow {
    config: ExperimentConfig,
    planner: Arc<dyn AnalystPlanner>,
    registry: Arc<AnalystRegistry>,
    manager: PortfolioManager,
    data: Arc<dyn MarketDataProvider>,
    store: Arc<dyn FundStore>,
    analyst_timeout: Duration,
}

impl FundWorkflow {
    pub fn new(
        config: ExperimentConfig,
        planner: Arc<dyn AnalystPlanner>,
        registry: Arc<AnalystRegistry>,
        data: Arc<dyn MarketDataProvider>,
        store: Arc<dyn FundStore>,
    ) -> Self {
        let manager = PortfolioManager::new(config.risk_limits());
        // An analyst may issue more than one reasoning call, each with
        // its own retry budget, so the fan-out deadline is a multiple.
        let analyst_timeout = Duration::from_secs(
            config.llm.timeout_secs * (config.llm.max_retries as u64 + 1) * 2,
        );

        Self {
            config,
            planner,
            registry,
            manager,
            data,
            store,
            analyst_timeout,
        }
    }

    pub fn with_analyst_timeout(mut self, timeout: Duration) -> Self {
        self.analyst_timeout = timeout;
        self
    }

    /// Run every trading day in `[start, end]`, resuming from the
    /// experiment's persisted portfolio when one exists. Days must be
    /// processed in chronological order across runs.
    pub async fn run_range(&self, start: NaiveDate, end: NaiveDate) -> Result<PortfolioState> {
        if start > end {
            return Err(FundError::Config(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let experiment = match self.store.find_experiment(&self.config.exp_name).await? {
            Some(record) => record,
            None => {
                self.store
                    .create_experiment(&self.config.exp_name, self.config.cashflow)
                    .await?
            }
        };

        let mut portfolio = match self.store.load_latest_portfolio(&experiment.name).await? {
            Some(existing) => {
                if existing.trading_date >= start {
                    return Err(FundError::Config(format!(
                        "experiment {} already processed {}; start must be later",
                        experiment.name, existing.trading_date
                    )));
                }
                existing
            }
            None => PortfolioState::new(&experiment.name, experiment.initial_cash, start),
        };

        let mut drawdown = DrawdownState::new(experiment.initial_cash, portfolio.total_value());

        info!(
            experiment = %experiment.name,
            %start,
            %end,
            cash = portfolio.cash,
            "Starting run"
        );

        for date in start.iter_days().take_while(|d| *d <= end) {
            self.run_day(date, &mut portfolio, &mut drawdown).await?;
            portfolio.trading_date = date;
            self.store.save_snapshot(&portfolio).await?;
        }

        Ok(portfolio)
    }

    /// One trading day: tickers in config order, sequentially. Only the
    /// analyst fan-out within a ticker is concurrent.
    async fn run_day(
        &self,
        date: NaiveDate,
        portfolio: &mut PortfolioState,
        drawdown: &mut DrawdownState,
    ) -> Result<()> {
        let enabled = self.config.enabled_analysts();

        for ticker in &self.config.tickers {
            let selected = if self.config.planner_mode {
                match self.planner.select(ticker, date, &enabled).await {
                    Ok(selected) => selected,
                    Err(e) => {
                        warn!(%ticker, error = %e, "Planning failed, running full analyst set");
                        enabled.clone()
                    }
                }
            } else {
                enabled.clone()
            };

            // A ticker without a price cannot be decided on; skip it
            // rather than record a meaningless hold.
            let price = match self.data.latest_price(ticker, date).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(%ticker, %date, error = %e, "No price, skipping ticker");
                    continue;
                }
            };

            let outcomes = self.fan_out(ticker, date, &selected).await;
            let evidence = aggregate(ticker, date, outcomes);

            if let crate::models::Evidence::Signals(bundle) = &evidence {
                for signal in &bundle.signals {
                    self.store
                        .record_signal(&self.config.exp_name, signal)
                        .await?;
                }
            }

            let decision = self
                .manager
                .decide(ticker, date, price, &evidence, portfolio, drawdown);

            info!(
                %ticker,
                %date,
                action = %decision.action,
                reason = ?decision.reason,
                quantity_delta = decision.quantity_delta,
                cash = decision.post.cash,
                "Decision"
            );

            if let Err(e) = self
                .store
                .append_decision(&self.config.exp_name, &decision)
                .await
            {
                error!(%ticker, error = %e, "Decision could not be persisted, aborting run");
                return Err(e);
            }
            portfolio.apply(&decision);
            drawdown.observe(portfolio.total_value());
        }

        Ok(())
    }

    /// Run the selected analysts concurrently with a shared deadline.
    /// Outcomes come back in selection order regardless of completion
    /// order, keeping the evidence bundle deterministic.
    async fn fan_out(
        &self,
        ticker: &str,
        date: NaiveDate,
        selected: &[AnalystKey],
    ) -> Vec<AnalystOutcome> {
        let mut set = JoinSet::new();

        for (index, key) in selected.iter().copied().enumerate() {
            let Some(analyst) = self.registry.get(key) else {
                warn!(%ticker, analyst = %key, "Selected analyst is not registered");
                continue;
            };
            let ticker = ticker.to_string();
            let timeout = self.analyst_timeout;

            set.spawn(async move {
                let result =
                    match tokio::time::timeout(timeout, analyst.analyze(&ticker, date)).await {
                        Ok(result) => result,
                        Err(_) => Err(FundError::SignalParse {
                            analyst: key.to_string(),
                            reason: format!("timed out after {:?}", timeout),
                        }),
                    };
                (index, AnalystOutcome {
                    analyst: key,
                    result,
                })
            });
        }

        let mut indexed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => indexed.push(outcome),
                Err(e) => error!(%ticker, error = %e, "Analyst task failed to join"),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }
}
