//! Inspect an experiment: portfolio, decision log, integrity hash.

use clap::Parser;
use cs2_fund_orchestrator::state::{decision_log_hash, FundStore, PgFundStore};
use cs2_fund_orchestrator::FundError;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Show an experiment's portfolio and decision log")]
struct Args {
    /// Experiment name
    #[arg(short, long)]
    experiment: String,

    /// Also print every recorded analyst signal
    #[arg(long)]
    signals: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| FundError::Config("DATABASE_URL not configured".to_string()))?;
    let store: Arc<dyn FundStore> = Arc::new(PgFundStore::connect(&database_url).await?);

    let Some(experiment) = store.find_experiment(&args.experiment).await? else {
        eprintln!("No experiment named '{}'", args.experiment);
        std::process::exit(1);
    };

    println!("=== EXPERIMENT {} ===", experiment.name);
    println!("Initial cash: {:.2}", experiment.initial_cash);
    println!("Created:      {}", experiment.created_at);

    if let Some(portfolio) = store.load_latest_portfolio(&experiment.name).await? {
        println!("\nPortfolio as of {}:", portfolio.trading_date);
        println!("  Cash:        {:.2}", portfolio.cash);
        println!("  Total value: {:.2}", portfolio.total_value());
        for (ticker, position) in &portfolio.positions {
            println!(
                "  {:40} qty {:>10.4}  value {:>10.2}",
                ticker, position.quantity, position.value
            );
        }
    } else {
        println!("\nNo portfolio snapshot yet.");
    }

    let decisions = store.load_decisions(&experiment.name).await?;
    println!("\nDecisions ({}):", decisions.len());
    for decision in &decisions {
        println!(
            "  {} {:40} {:5} qty {:>+10.4} cash {:>+10.2} fee {:>8.2} [{:?}]",
            decision.trading_date,
            decision.ticker,
            decision.action,
            decision.quantity_delta,
            decision.cash_delta,
            decision.fee_paid,
            decision.reason,
        );
    }
    println!("\nDecision log hash: {}", decision_log_hash(&decisions));

    if args.signals {
        let signals = store.load_signals(&experiment.name).await?;
        println!("\nSignals ({}):", signals.len());
        for signal in &signals {
            println!(
                "  {} {:40} {:17} {:7} conf {:.2}  {}",
                signal.trading_date,
                signal.ticker,
                signal.analyst,
                signal.signal,
                signal.confidence,
                signal.justification,
            );
        }
    }

    Ok(())
}
