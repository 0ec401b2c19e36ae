//! Fund persistence layer
//!
//! Two implementations behind one trait: in-memory for tests and
//! development, Postgres for real runs. Rows carry whole documents as
//! JSON text; the relational columns exist for lookup, not for joins.

use crate::error::Result;
use crate::models::{AnalystSignal, Decision, PortfolioState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One named experiment lineage. The name is the lookup key; the id
/// pins the lineage against accidental re-creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub id: Uuid,
    pub name: String,
    pub initial_cash: f64,
    pub created_at: DateTime<Utc>,
}

/// Trait for fund persistence. Decisions and signals are append-only;
/// portfolio snapshots are one-per-trading-date.
#[async_trait]
pub trait FundStore: Send + Sync {
    async fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>>;
    async fn create_experiment(&self, name: &str, initial_cash: f64) -> Result<ExperimentRecord>;

    /// Most recent portfolio snapshot for an experiment, if any.
    async fn load_latest_portfolio(&self, experiment: &str) -> Result<Option<PortfolioState>>;
    async fn save_snapshot(&self, portfolio: &PortfolioState) -> Result<()>;

    async fn append_decision(&self, experiment: &str, decision: &Decision) -> Result<()>;
    async fn load_decisions(&self, experiment: &str) -> Result<Vec<Decision>>;

    async fn record_signal(&self, experiment: &str, signal: &AnalystSignal) -> Result<()>;
    async fn load_signals(&self, experiment: &str) -> Result<Vec<AnalystSignal>>;

    /// Remove every trace of an experiment.
    async fn clear_experiment(&self, name: &str) -> Result<()>;
}

/// SHA256 over the serialized decision log, streamed straight into the
/// hasher. Two logs hash equal iff they replay to the same portfolio.
pub fn decision_log_hash(decisions: &[Decision]) -> String {
    let mut hasher = Sha256::new();
    if serde_json::to_writer(&mut HashWriter(&mut hasher), decisions).is_err() {
        return String::new();
    }
    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//
// ================= In-memory store =================
//

/// In-memory store for development and tests.
pub struct InMemoryFundStore {
    experiments: Arc<RwLock<HashMap<String, ExperimentRecord>>>,
    snapshots: Arc<RwLock<HashMap<String, Vec<PortfolioState>>>>,
    decisions: Arc<RwLock<HashMap<String, Vec<Decision>>>>,
    signals: Arc<RwLock<HashMap<String, Vec<AnalystSignal>>>>,
}

impl InMemoryFundStore {
    pub fn new() -> Self {
        Self {
            experiments: Arc::new(RwLock::new(HashMap::new())),
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            decisions: Arc::new(RwLock::new(HashMap::new())),
            signals: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryFundStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundStore for InMemoryFundStore {
    async fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        let experiments = self.experiments.read().await;
        Ok(experiments.get(name).cloned())
    }

    async fn create_experiment(&self, name: &str, initial_cash: f64) -> Result<ExperimentRecord> {
        let record = ExperimentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            initial_cash,
            created_at: Utc::now(),
        };
        let mut experiments = self.experiments.write().await;
        experiments.insert(name.to_string(), record.clone());
        Ok(record)
    }

    async fn load_latest_portfolio(&self, experiment: &str) -> Result<Option<PortfolioState>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(experiment)
            .and_then(|list| {
                list.iter()
                    .max_by_key(|portfolio| portfolio.trading_date)
            })
            .cloned())
    }

    async fn save_snapshot(&self, portfolio: &PortfolioState) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        let list = snapshots
            .entry(portfolio.experiment.clone())
            .or_insert_with(Vec::new);
        // One snapshot per trading date; a re-run of the same day
        // replaces the earlier snapshot.
        list.retain(|existing| existing.trading_date != portfolio.trading_date);
        list.push(portfolio.clone());
        Ok(())
    }

    async fn append_decision(&self, experiment: &str, decision: &Decision) -> Result<()> {
        let mut decisions = self.decisions.write().await;
        decisions
            .entry(experiment.to_string())
            .or_insert_with(Vec::new)
            .push(decision.clone());
        Ok(())
    }

    async fn load_decisions(&self, experiment: &str) -> Result<Vec<Decision>> {
        let decisions = self.decisions.read().await;
        Ok(decisions.get(experiment).cloned().unwrap_or_default())
    }

    async fn record_signal(&self, experiment: &str, signal: &AnalystSignal) -> Result<()> {
        let mut signals = self.signals.write().await;
        signals
            .entry(experiment.to_string())
            .or_insert_with(Vec::new)
            .push(signal.clone());
        Ok(())
    }

    async fn load_signals(&self, experiment: &str) -> Result<Vec<AnalystSignal>> {
        let signals = self.signals.read().await;
        Ok(signals.get(experiment).cloned().unwrap_or_default())
    }

    async fn clear_experiment(&self, name: &str) -> Result<()> {
        self.experiments.write().await.remove(name);
        self.snapshots.write().await.remove(name);
        self.decisions.write().await.remove(name);
        self.signals.write().await.remove(name);
        Ok(())
    }
}

//
// ================= Postgres store =================
//

/// Postgres-backed store. `init_schema` is idempotent and runs on
/// every connect.
pub struct PgFundStore {
    pool: PgPool,
}

impl PgFundStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fund_experiment (
                id UUID PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                initial_cash DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fund_portfolio (
                id UUID PRIMARY KEY,
                experiment TEXT NOT NULL,
                trading_date DATE NOT NULL,
                payload TEXT NOT NULL,
                UNIQUE (experiment, trading_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fund_decision (
                id UUID PRIMARY KEY,
                experiment TEXT NOT NULL,
                ticker TEXT NOT NULL,
                trading_date DATE NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fund_signal (
                id UUID PRIMARY KEY,
                experiment TEXT NOT NULL,
                analyst TEXT NOT NULL,
                ticker TEXT NOT NULL,
                trading_date DATE NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl FundStore for PgFundStore {
    async fn find_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        let row = sqlx::query(
            "SELECT id, name, initial_cash, created_at FROM fund_experiment WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ExperimentRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                initial_cash: row.try_get("initial_cash")?,
                created_at: row.try_get("created_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn create_experiment(&self, name: &str, initial_cash: f64) -> Result<ExperimentRecord> {
        let record = ExperimentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            initial_cash,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO fund_experiment (id, name, initial_cash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.initial_cash)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn load_latest_portfolio(&self, experiment: &str) -> Result<Option<PortfolioState>> {
        let row = sqlx::query(
            "SELECT payload FROM fund_portfolio WHERE experiment = $1 \
             ORDER BY trading_date DESC LIMIT 1",
        )
        .bind(experiment)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn save_snapshot(&self, portfolio: &PortfolioState) -> Result<()> {
        let payload = serde_json::to_string(portfolio)?;
        sqlx::query(
            r#"
            INSERT INTO fund_portfolio (id, experiment, trading_date, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (experiment, trading_date)
            DO UPDATE SET payload = EXCLUDED.payload, id = EXCLUDED.id
            "#,
        )
        .bind(portfolio.id)
        .bind(&portfolio.experiment)
        .bind(portfolio.trading_date)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_decision(&self, experiment: &str, decision: &Decision) -> Result<()> {
        let payload = serde_json::to_string(decision)?;
        sqlx::query(
            "INSERT INTO fund_decision (id, experiment, ticker, trading_date, payload) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(decision.id)
        .bind(experiment)
        .bind(&decision.ticker)
        .bind(decision.trading_date)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_decisions(&self, experiment: &str) -> Result<Vec<Decision>> {
        let rows = sqlx::query(
            "SELECT payload FROM fund_decision WHERE experiment = $1 ORDER BY trading_date ASC",
        )
        .bind(experiment)
        .fetch_all(&self.pool)
        .await?;

        let mut decisions = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload")?;
            decisions.push(serde_json::from_str(&payload)?);
        }
        Ok(decisions)
    }

    async fn record_signal(&self, experiment: &str, signal: &AnalystSignal) -> Result<()> {
        let payload = serde_json::to_string(signal)?;
        sqlx::query(
            "INSERT INTO fund_signal (id, experiment, analyst, ticker, trading_date, payload) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(experiment)
        .bind(signal.analyst.as_str())
        .bind(&signal.ticker)
        .bind(signal.trading_date)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_signals(&self, experiment: &str) -> Result<Vec<AnalystSignal>> {
        let rows = sqlx::query(
            "SELECT payload FROM fund_signal WHERE experiment = $1 ORDER BY trading_date ASC",
        )
        .bind(experiment)
        .fetch_all(&self.pool)
        .await?;

        let mut signals = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload")?;
            signals.push(serde_json::from_str(&payload)?);
        }
        Ok(signals)
    }

    async fn clear_experiment(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM fund_signal WHERE experiment = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM fund_decision WHERE experiment = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM fund_portfolio WHERE experiment = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM fund_experiment WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DecisionReason, PositionSnapshot};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn hold(day: &str) -> Decision {
        Decision::hold(
            "item",
            date(day),
            100.0,
            DecisionReason::SignalDriven,
            PositionSnapshot {
                cash: 1_000.0,
                quantity: 0.0,
            },
            String::new(),
        )
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryFundStore::new();
        store.create_experiment("exp", 10_000.0).await.unwrap();

        assert!(store.find_experiment("exp").await.unwrap().is_some());
        assert!(store.find_experiment("other").await.unwrap().is_none());

        store.append_decision("exp", &hold("2025-09-20")).await.unwrap();
        store.append_decision("exp", &hold("2025-09-21")).await.unwrap();
        assert_eq!(store.load_decisions("exp").await.unwrap().len(), 2);

        store.clear_experiment("exp").await.unwrap();
        assert!(store.find_experiment("exp").await.unwrap().is_none());
        assert!(store.load_decisions("exp").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_one_per_date() {
        let store = InMemoryFundStore::new();
        let mut portfolio = PortfolioState::new("exp", 10_000.0, date("2025-09-20"));
        store.save_snapshot(&portfolio).await.unwrap();

        portfolio.cash = 9_000.0;
        store.save_snapshot(&portfolio).await.unwrap();

        let loaded = store.load_latest_portfolio("exp").await.unwrap().unwrap();
        assert_eq!(loaded.cash, 9_000.0);

        portfolio.trading_date = date("2025-09-21");
        store.save_snapshot(&portfolio).await.unwrap();
        let loaded = store.load_latest_portfolio("exp").await.unwrap().unwrap();
        assert_eq!(loaded.trading_date, date("2025-09-21"));
    }

    #[test]
    fn test_decision_log_hash_tracks_content() {
        let a = vec![hold("2025-09-20")];
        let b = vec![hold("2025-09-20")];

        // Same content except ids, which are random per decision.
        assert_ne!(decision_log_hash(&a), decision_log_hash(&b));
        assert_eq!(decision_log_hash(&a), decision_log_hash(&a));
        assert_ne!(decision_log_hash(&a), decision_log_hash(&[]));
    }
}
