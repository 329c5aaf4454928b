//! Specialist agents invoked by `AgentRouter` after `Orchestrator` routing.
//! Each produces one named JSON blob that `ExplainabilityAgent` reads by
//! field. News/fundamental/twitter sources are out of scope (the original's
//! Zerodha/Twitter scraping integrations); callers inject their own via the
//! trait seams below.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::TradeSignal;
use crate::store::MongoStore;

#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ticker: &str) -> anyhow::Result<Value>;
}

/// Aggregates sentiment across summarized articles already in the
/// `summarize` collection for `ticker`, grounded on `news_agent.py`'s
/// MongoDB-first lookup.
pub struct NewsSpecialist {
    store: Arc<MongoStore>,
}

#[derive(Debug, Serialize)]
struct NewsSummary {
    ticker: String,
    article_count: usize,
    overall_sentiment: String,
}

impl NewsSpecialist {
    pub fn new(store: Arc<MongoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SpecialistAgent for NewsSpecialist {
    fn name(&self) -> &'static str {
        "news_agent"
    }

    async fn run(&self, ticker: &str) -> anyhow::Result<Value> {
        let articles: Vec<mongodb::bson::Document> = self
            .store
            .find_many(crate::store::mongo::SUMMARIZE, mongodb::bson::doc! { "company": ticker })
            .await?;

        let bullish = articles.iter().filter(|a| a.get_str("sentiment_label").unwrap_or("") == "bullish").count();
        let bearish = articles.iter().filter(|a| a.get_str("sentiment_label").unwrap_or("") == "bearish").count();
        let overall_sentiment = if bullish > bearish {
            "bullish"
        } else if bearish > bullish {
            "bearish"
        } else {
            "neutral"
        };

        Ok(serde_json::to_value(NewsSummary {
            ticker: ticker.to_string(),
            article_count: articles.len(),
            overall_sentiment: overall_sentiment.to_string(),
        })?)
    }
}

/// Social sentiment source. No scraper ships with this crate; production
/// wires a real `TwitterSentimentSource` (e.g. an X API client).
#[async_trait]
pub trait TwitterSentimentSource: Send + Sync {
    async fn sentiment_score(&self, ticker: &str, hours: u32) -> anyhow::Result<f64>;
}

pub struct TwitterSpecialist {
    source: Arc<dyn TwitterSentimentSource>,
    hours: u32,
}

impl TwitterSpecialist {
    pub fn new(source: Arc<dyn TwitterSentimentSource>, hours: u32) -> Self {
        Self { source, hours }
    }
}

#[async_trait]
impl SpecialistAgent for TwitterSpecialist {
    fn name(&self) -> &'static str {
        "twitter_agent"
    }

    async fn run(&self, ticker: &str) -> anyhow::Result<Value> {
        let score = self.source.sentiment_score(ticker, self.hours).await?;
        Ok(json!({ "ticker": ticker, "sentiment_score": score, "hours_delta": self.hours }))
    }
}

/// Surfaces the most recent `TradeSignal` already computed by
/// `PipelineRuntime`; the technical agent does not recompute indicators.
pub struct TechnicalSpecialist {
    store: Arc<MongoStore>,
}

impl TechnicalSpecialist {
    pub fn new(store: Arc<MongoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SpecialistAgent for TechnicalSpecialist {
    fn name(&self) -> &'static str {
        "technical_agent"
    }

    async fn run(&self, ticker: &str) -> anyhow::Result<Value> {
        let latest: Option<TradeSignal> = self
            .store
            .find_one(crate::store::mongo::INDICATORS, mongodb::bson::doc! { "ticker": ticker })
            .await?;
        match latest {
            Some(signal) => Ok(serde_json::to_value(signal)?),
            None => Ok(json!({ "ticker": ticker, "signal": "HOLD", "note": "no indicator snapshot available yet" })),
        }
    }
}

/// Discounted-cash-flow valuation source. Out of scope (the original's DCF
/// pipeline over financial statements); callers inject their own.
#[async_trait]
pub trait FundamentalValuationSource: Send + Sync {
    async fn intrinsic_value(&self, ticker: &str) -> anyhow::Result<f64>;
}

pub struct FundamentalSpecialist {
    source: Arc<dyn FundamentalValuationSource>,
}

impl FundamentalSpecialist {
    pub fn new(source: Arc<dyn FundamentalValuationSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SpecialistAgent for FundamentalSpecialist {
    fn name(&self) -> &'static str {
        "fundamental_agent"
    }

    async fn run(&self, ticker: &str) -> anyhow::Result<Value> {
        let intrinsic_value = self.source.intrinsic_value(ticker).await?;
        Ok(json!({ "ticker": ticker, "intrinsic_value": intrinsic_value }))
    }
}

/// Bootstrap Monte Carlo over historical daily log returns, grounded on
/// `agents/accessories/montecarlo.py::MonteCarloSimulator.bootstrap_simulation`.
pub struct MonteCarloSpecialist {
    num_simulations: usize,
    simulation_days: usize,
    /// `(ticker) -> (initial_price, historical log returns)`, backed by the
    /// same candle history `WindowedSeries` draws from.
    history: Arc<dyn HistoricalReturnsSource>,
}

#[async_trait]
pub trait HistoricalReturnsSource: Send + Sync {
    async fn log_returns(&self, ticker: &str) -> anyhow::Result<(f64, Vec<f64>)>;
}

impl MonteCarloSpecialist {
    pub fn new(history: Arc<dyn HistoricalReturnsSource>, num_simulations: usize, simulation_days: usize) -> Self {
        Self { history, num_simulations, simulation_days }
    }

    fn bootstrap(&self, initial_price: f64, log_returns: &[f64]) -> Vec<f64> {
        let mut rng = rand::rng();
        let mut final_returns_pct = Vec::with_capacity(self.num_simulations);
        for _ in 0..self.num_simulations {
            let mut log_price = 0.0;
            for _ in 0..self.simulation_days {
                let idx = rng.random_range(0..log_returns.len());
                log_price += log_returns[idx];
            }
            let final_price = initial_price * log_price.exp();
            final_returns_pct.push((final_price - initial_price) / initial_price * 100.0);
        }
        final_returns_pct
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

#[async_trait]
impl SpecialistAgent for MonteCarloSpecialist {
    fn name(&self) -> &'static str {
        "montecarlo_agent"
    }

    async fn run(&self, ticker: &str) -> anyhow::Result<Value> {
        let (initial_price, log_returns) = self.history.log_returns(ticker).await?;
        if log_returns.len() < 2 || initial_price <= 0.0 {
            anyhow::bail!("insufficient history for monte carlo simulation of {ticker}");
        }

        let mut results = self.bootstrap(initial_price, &log_returns);
        results.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mean: f64 = results.iter().sum::<f64>() / results.len() as f64;
        let prob_loss = results.iter().filter(|r| **r < 0.0).count() as f64 / results.len() as f64;

        Ok(json!({
            "ticker": ticker,
            "num_simulations": self.num_simulations,
            "simulation_days": self.simulation_days,
            "expected_return_pct": mean,
            "probability_of_loss": prob_loss,
            "5th_percentile": percentile(&results, 5.0),
            "10th_percentile": percentile(&results, 10.0),
            "90th_percentile": percentile(&results, 90.0),
            "95th_percentile": percentile(&results, 95.0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHistory;

    #[async_trait]
    impl HistoricalReturnsSource for FixedHistory {
        async fn log_returns(&self, _ticker: &str) -> anyhow::Result<(f64, Vec<f64>)> {
            Ok((100.0, vec![0.01, -0.01, 0.02, -0.02, 0.0]))
        }
    }

    #[tokio::test]
    async fn monte_carlo_returns_percentiles_bracketing_mean() {
        let specialist = MonteCarloSpecialist::new(Arc::new(FixedHistory), 2000, 10);
        let result = specialist.run("RELIANCE").await.unwrap();
        let p5 = result["5th_percentile"].as_f64().unwrap();
        let p95 = result["95th_percentile"].as_f64().unwrap();
        assert!(p5 < p95);
    }

    #[tokio::test]
    async fn monte_carlo_rejects_insufficient_history() {
        struct Empty;
        #[async_trait]
        impl HistoricalReturnsSource for Empty {
            async fn log_returns(&self, _ticker: &str) -> anyhow::Result<(f64, Vec<f64>)> {
                Ok((100.0, vec![0.01]))
            }
        }
        let specialist = MonteCarloSpecialist::new(Arc::new(Empty), 100, 5);
        assert!(specialist.run("RELIANCE").await.is_err());
    }
}
