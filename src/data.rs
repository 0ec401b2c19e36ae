//! Market, community and news data access
//!
//! Analysts read these feeds; nothing here ever touches the portfolio.
//! Within one run the same ticker/date query must return stable data.

use crate::error::{FundError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tokio::sync::RwLock;

/// One daily OHLCV bar for a market item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A community discussion post about an item (or the market in general).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityPost {
    pub title: String,
    pub body: String,
    pub score: i64,
    pub num_comments: i64,
    pub created: NaiveDate,
}

/// An official news item (game updates, drops, balance changes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub contents: String,
    pub date: NaiveDate,
}

/// Read-only data source queried by analysts.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Market price observable for the ticker on the trading date.
    async fn latest_price(&self, ticker: &str, date: NaiveDate) -> Result<f64>;

    /// Daily candles for the `window_days` up to and including `date`.
    async fn daily_candles(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<Candle>>;

    /// Ticker-relevant community posts within a week of `date`.
    async fn community_posts(
        &self,
        ticker: &str,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CommunityPost>>;

    /// Official news within `window_days` of `date`.
    async fn official_news(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<NewsItem>>;
}

/// HTTP-backed provider against the data API service.
pub struct HttpMarketDataProvider {
    client: Client,
    base_url: String,
}

impl HttpMarketDataProvider {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("MARKET_DATA_BASE_URL")
            .map_err(|_| FundError::Config("MARKET_DATA_BASE_URL not configured".to_string()))?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FundError::Data(format!("request failed for {}: {}", path, e)))?;

        if !response.status().is_success() {
            return Err(FundError::Data(format!(
                "data API returned {} for {}",
                response.status(),
                path
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FundError::Data(format!("invalid JSON from {}: {}", path, e)))
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn latest_price(&self, ticker: &str, date: NaiveDate) -> Result<f64> {
        #[derive(Deserialize)]
        struct PriceResponse {
            price: f64,
        }

        let response: PriceResponse = self
            .get_json(
                "/api/v1/price",
                &[
                    ("ticker", ticker.to_string()),
                    ("date", date.to_string()),
                ],
            )
            .await?;
        Ok(response.price)
    }

    async fn daily_candles(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<Candle>> {
        self.get_json(
            "/api/v1/candles",
            &[
                ("ticker", ticker.to_string()),
                ("date", date.to_string()),
                ("window_days", window_days.to_string()),
            ],
        )
        .await
    }

    async fn community_posts(
        &self,
        ticker: &str,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CommunityPost>> {
        self.get_json(
            "/api/v1/community/posts",
            &[
                ("ticker", ticker.to_string()),
                ("date", date.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn official_news(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        self.get_json(
            "/api/v1/news",
            &[
                ("ticker", ticker.to_string()),
                ("date", date.to_string()),
                ("window_days", window_days.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}

/// In-memory provider for tests and offline experiments.
#[derive(Default)]
pub struct FixtureDataProvider {
    prices: RwLock<HashMap<(String, NaiveDate), f64>>,
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    posts: RwLock<HashMap<String, Vec<CommunityPost>>>,
    news: RwLock<HashMap<String, Vec<NewsItem>>>,
}

impl FixtureDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, ticker: &str, date: NaiveDate, price: f64) {
        self.prices
            .write()
            .await
            .insert((ticker.to_string(), date), price);
    }

    pub async fn set_candles(&self, ticker: &str, candles: Vec<Candle>) {
        self.candles
            .write()
            .await
            .insert(ticker.to_string(), candles);
    }

    pub async fn set_posts(&self, ticker: &str, posts: Vec<CommunityPost>) {
        self.posts
            .write()
            .await
            .insert(ticker.to_string(), posts);
    }

    pub async fn set_news(&self, ticker: &str, news: Vec<NewsItem>) {
        self.news
            .write()
            .await
            .insert(ticker.to_string(), news);
    }
}

#[async_trait]
impl MarketDataProvider for FixtureDataProvider {
    async fn latest_price(&self, ticker: &str, date: NaiveDate) -> Result<f64> {
        self.prices
            .read()
            .await
            .get(&(ticker.to_string(), date))
            .copied()
            .ok_or_else(|| {
                FundError::Data(format!("no fixture price for {} on {}", ticker, date))
            })
    }

    async fn daily_candles(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<Candle>> {
        let all = self
            .candles
            .read()
            .await
            .get(ticker)
            .cloned()
            .unwrap_or_default();
        let cutoff = date - chrono::Duration::days(window_days as i64);
        Ok(all
            .into_iter()
            .filter(|c| c.date > cutoff && c.date <= date)
            .collect())
    }

    async fn community_posts(
        &self,
        ticker: &str,
        _date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CommunityPost>> {
        let mut posts = self
            .posts
            .read()
            .await
            .get(ticker)
            .cloned()
            .unwrap_or_default();
        posts.truncate(limit);
        Ok(posts)
    }

    async fn official_news(
        &self,
        ticker: &str,
        date: NaiveDate,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let cutoff = date - chrono::Duration::days(window_days as i64);
        let mut news: Vec<NewsItem> = self
            .news
            .read()
            .await
            .get(ticker)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|n| n.date > cutoff && n.date <= date)
            .collect();
        news.truncate(limit);
        Ok(news)
    }
}
