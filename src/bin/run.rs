//! Run an experiment over a trading-date range.

use clap::Parser;
use cs2_fund_orchestrator::analysts::build_registry;
use cs2_fund_orchestrator::config::ExperimentConfig;
use cs2_fund_orchestrator::data::HttpMarketDataProvider;
use cs2_fund_orchestrator::llm::OpenAiCompatClient;
use cs2_fund_orchestrator::planner::{AnalystPlanner, LlmPlanner, PassthroughPlanner};
use cs2_fund_orchestrator::state::{decision_log_hash, PgFundStore};
use cs2_fund_orchestrator::workflow::FundWorkflow;
use cs2_fund_orchestrator::FundError;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Run the fund workflow over a trading-date range")]
struct Args {
    /// Experiment YAML config
    #[arg(short, long)]
    config: PathBuf,

    /// First trading date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last trading date, inclusive (YYYY-MM-DD); defaults to start
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let end = args.end.unwrap_or(args.start);

    let config = ExperimentConfig::load(&args.config)?;
    info!(experiment = %config.exp_name, tickers = config.tickers.len(), "Config loaded");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| FundError::Config("DATABASE_URL not configured".to_string()))?;
    let store = Arc::new(PgFundStore::connect(&database_url).await?);

    let llm = Arc::new(OpenAiCompatClient::from_config(&config.llm)?);
    let data = Arc::new(HttpMarketDataProvider::from_env()?);
    let registry = Arc::new(build_registry(data.clone(), llm.clone()));

    let planner: Arc<dyn AnalystPlanner> = if config.planner_mode {
        Arc::new(LlmPlanner::new(llm))
    } else {
        Arc::new(PassthroughPlanner)
    };

    let workflow = FundWorkflow::new(config, planner, registry, data, store);
    let portfolio = workflow.run_range(args.start, end).await?;

    println!("\n=== RUN COMPLETE ===");
    println!("Experiment:  {}", portfolio.experiment);
    println!("As of:       {}", portfolio.trading_date);
    println!("Cash:        {:.2}", portfolio.cash);
    println!("Total value: {:.2}", portfolio.total_value());
    for (ticker, position) in &portfolio.positions {
        println!(
            "  {:40} qty {:>10.4}  value {:>10.2}",
            ticker, position.quantity, position.value
        );
    }
    println!("Decision log hash: {}", decision_log_hash(&portfolio.decisions));

    Ok(())
}
