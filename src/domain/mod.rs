//! Shared data model: Article, StoryCluster, Candle, IndicatorSnapshot,
//! TradeSignal, Portfolio, Holding, Transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentQuality {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
    pub confidence: Confidence,
    /// Full three-class distribution, indexed by [positive, negative, neutral].
    pub class_scores: [f64; 3],
}

/// `liquidity_impact`, `critical_events`, `decisions` — computed in
/// `news::features` from a `SentimentResult` plus article text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleFeatures {
    pub liquidity_impact: String,
    pub critical_events: Vec<String>,
    pub decisions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub title: String,
    pub original_url: String,
    pub canonical_url: String,
    pub company_code: String,
    pub factor_type: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub content: String,
    pub content_hash: String,
    pub content_quality: ContentQuality,
    pub publisher_name: Option<String>,
    pub author: Option<String>,
    pub publisher_icon: Option<String>,
    pub sentiment: Option<SentimentResult>,
    pub features: ArticleFeatures,
    pub cluster_id: Option<String>,
    pub processed: bool,
    pub summarized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryCluster {
    pub cluster_id: String,
    pub title: String,
    pub company: String,
    pub factor_type: String,
    pub published_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub urls: Vec<String>,
    pub publishers: Vec<String>,
    pub article_count: u32,
    pub aggregated_sentiment: Option<SentimentResult>,
    pub aggregated_impact: Option<String>,
    pub aggregated_events: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StoryCluster {
    pub fn append_publisher(&mut self, publisher: impl Into<String>) {
        self.publishers.push(publisher.into());
        self.article_count += 1;
        self.last_updated = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub ticker_timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ticker: String,
    pub close: f64,
    pub open: f64,
    pub volume: f64,
    pub high: f64,
    pub low: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub rsi: f64,
    pub adl: f64,
    pub obv: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub std20: f64,
    pub bb_low: f64,
    pub bb_high: f64,
    pub vwap: f64,
    pub atr14: f64,
    pub cmo: f64,
    pub crsi: f64,
    pub klinger: f64,
    pub klinger_signal: f64,
    pub klinger_trend: f64,
    pub keltner_mid: f64,
    pub keltner_low: f64,
    pub keltner_high: f64,
    pub day_change_abs: f64,
    pub day_change_pct: f64,
    pub window_min_low: f64,
    pub window_max_high: f64,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub ticker: String,
    pub date: String,
    pub close_price: f64,
    pub open_price: f64,
    pub volume: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub action: TradeAction,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub signal_strength: u32,
    pub limit_order: Option<f64>,
    pub current_price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub vwap: f64,
    pub bol_bands: [f64; 2],
    pub sma: [f64; 2],
    pub crsi: f64,
    pub klinger: [f64; 3],
    pub keltner: [f64; 3],
    pub cmo: f64,
    pub reason: String,
    pub abs_change: f64,
    pub pct_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionAction {
    Buy,
    Sell,
    Dividend,
    Split,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub portfolio_id: String,
    pub ticker: String,
    pub action: TransactionAction,
    pub quantity: f64,
    pub price: f64,
    pub fees: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub weight: f64,
    pub beta: f64,
    pub sector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub portfolio_id: String,
    pub user_id: String,
    pub cash: f64,
    pub total_value: f64,
    pub currency: String,
    pub portfolio_beta: f64,
    pub sector_exposures: std::collections::HashMap<String, f64>,
    pub holdings: Vec<Holding>,
    pub last_updated: DateTime<Utc>,
}

impl Portfolio {
    /// Wealth Conservation invariant: total_value == cash + sum(market_value)
    /// and sum(weight) + cash_share == 1.0 within epsilon.
    pub fn check_conservation(&self, epsilon: f64) -> bool {
        let holdings_value: f64 = self.holdings.iter().map(|h| h.market_value).sum();
        if (self.total_value - (self.cash + holdings_value)).abs() > epsilon {
            return false;
        }
        if self.total_value <= 0.0 {
            return true;
        }
        let cash_share = self.cash / self.total_value;
        let weight_sum: f64 = self.holdings.iter().map(|h| h.weight).sum::<f64>() + cash_share;
        (weight_sum - 1.0).abs() <= epsilon
    }
}
