//! Delete an experiment and all its persisted state.

use clap::Parser;
use cs2_fund_orchestrator::state::{FundStore, PgFundStore};
use cs2_fund_orchestrator::FundError;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Delete an experiment's portfolio, decisions and signals")]
struct Args {
    /// Experiment name
    #[arg(short, long)]
    experiment: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
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

    if store.find_experiment(&args.experiment).await?.is_none() {
        eprintln!("No experiment named '{}'", args.experiment);
        std::process::exit(1);
    }

    if !args.yes {
        print!("Delete ALL state for '{}'? [y/N] ", args.experiment);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.clear_experiment(&args.experiment).await?;
    println!("Experiment '{}' cleared.", args.experiment);

    Ok(())
}
