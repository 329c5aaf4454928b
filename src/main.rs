//! Entry point: bootstraps the `Runtime` then dispatches into either
//! pipeline mode (indicator engine over live/backtest candles) or agent
//! mode (Kafka-triggered multi-agent analysis), per `LIVE_MODE`.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use marketpulse::agents::fuzzy_ticker::{FuzzyTickerResolver, NoRemoteLookup};
use marketpulse::agents::specialists::{
    FundamentalSpecialist, FundamentalValuationSource, HistoricalReturnsSource, MonteCarloSpecialist, NewsSpecialist,
    TechnicalSpecialist, TwitterSentimentSource, TwitterSpecialist,
};
use marketpulse::agents::{AgentRouter, DefaultConflictPolicy, ExplainabilityAgent, Orchestrator};
use marketpulse::agents::explainability::{PortfolioLookupTool, PortfolioPosition};
use marketpulse::agents::router::SpecialistSet;
use marketpulse::agents::specialists::SpecialistAgent;
use marketpulse::config::Settings;
use marketpulse::messaging::{KafkaConsumerService, KafkaSettings, TOPIC_STOCK_ANALYSIS, TOPIC_SUMMARIZED_NEWS, TOPIC_TRADE_SIGNALS};
use marketpulse::portfolio::PortfolioService;
use marketpulse::Runtime;

struct UnavailablePortfolioLookup;

#[async_trait::async_trait]
impl PortfolioLookupTool for UnavailablePortfolioLookup {
    async fn get_portfolio(&self, _user_id: &str) -> anyhow::Result<Vec<PortfolioPosition>> {
        Ok(vec![])
    }
}

struct UnavailableMarketAggregator;

#[async_trait::async_trait]
impl marketpulse::agents::explainability::MarketDataAggregator for UnavailableMarketAggregator {
    async fn aggregate(&self, tickers: &[String], _query: &str) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({ "tickers": tickers, "note": "aggregated market data source not configured" }))
    }
}

struct UnavailableTwitterSource;

#[async_trait::async_trait]
impl TwitterSentimentSource for UnavailableTwitterSource {
    async fn sentiment_score(&self, _ticker: &str, _hours: u32) -> anyhow::Result<f64> {
        anyhow::bail!("twitter sentiment source not configured")
    }
}

struct UnavailableFundamentalSource;

#[async_trait::async_trait]
impl FundamentalValuationSource for UnavailableFundamentalSource {
    async fn intrinsic_value(&self, _ticker: &str) -> anyhow::Result<f64> {
        anyhow::bail!("fundamental valuation source not configured")
    }
}

struct UnavailableHistoricalReturns;

#[async_trait::async_trait]
impl HistoricalReturnsSource for UnavailableHistoricalReturns {
    async fn log_returns(&self, _ticker: &str) -> anyhow::Result<(f64, Vec<f64>)> {
        anyhow::bail!("historical returns source not configured")
    }
}

fn build_specialist_set(runtime: &Runtime) -> Arc<SpecialistSet> {
    Arc::new(SpecialistSet {
        news: Arc::new(NewsSpecialist::new(runtime.mongo.clone())) as Arc<dyn SpecialistAgent>,
        twitter: Arc::new(TwitterSpecialist::new(Arc::new(UnavailableTwitterSource), 24)) as Arc<dyn SpecialistAgent>,
        technical: Arc::new(TechnicalSpecialist::new(runtime.mongo.clone())) as Arc<dyn SpecialistAgent>,
        fundamental: Arc::new(FundamentalSpecialist::new(Arc::new(UnavailableFundamentalSource))) as Arc<dyn SpecialistAgent>,
        montecarlo: Arc::new(MonteCarloSpecialist::new(Arc::new(UnavailableHistoricalReturns), 100_000, 15)) as Arc<dyn SpecialistAgent>,
    })
}

async fn run_agent_mode(runtime: Arc<Runtime>) -> Result<()> {
    let tickers = FuzzyTickerResolver::load_csv("./data/instruments.csv", Box::new(NoRemoteLookup))
        .unwrap_or_else(|e| {
            info!(error = %e, "instrument CSV not found, starting with an empty ticker table");
            FuzzyTickerResolver::new(vec![], Box::new(NoRemoteLookup))
        });

    let orchestrator = Arc::new(Orchestrator::new(runtime.decision_llm.clone(), tickers));
    let specialists = build_specialist_set(&runtime);
    let explainability = Arc::new(ExplainabilityAgent::new(
        runtime.llm.clone(),
        Arc::new(UnavailablePortfolioLookup),
        Arc::new(UnavailableMarketAggregator),
    ));

    let router = Arc::new(AgentRouter::new(
        orchestrator,
        specialists,
        explainability,
        Arc::new(DefaultConflictPolicy),
        runtime.settings.max_concurrent_agents,
        runtime.settings.thread_pool_size,
    ));

    let kafka_settings = KafkaSettings::from_env();
    let consumer = KafkaConsumerService::connect(&kafka_settings, &[TOPIC_TRADE_SIGNALS, TOPIC_SUMMARIZED_NEWS])?;

    info!("agent router listening for trade_signals / summarized_news");
    loop {
        let (topic, payload) = match consumer.recv().await {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "kafka consume failed");
                continue;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&payload) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "skipping malformed message");
                continue;
            }
        };

        let ticker = value.get("ticker").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        if ticker.is_empty() {
            continue;
        }

        let message = if topic == TOPIC_TRADE_SIGNALS {
            let action_str = value.get("action").and_then(|v| v.as_str()).unwrap_or("HOLD");
            let action = match action_str {
                "BUY" => marketpulse::domain::TradeAction::Buy,
                "SELL" => marketpulse::domain::TradeAction::Sell,
                _ => marketpulse::domain::TradeAction::Hold,
            };
            marketpulse::agents::RouterMessage::TechnicalSignal { ticker, action }
        } else {
            let liquidity_impact = value.get("liquidity_impact").and_then(|v| v.as_str()).unwrap_or("");
            if liquidity_impact != "HIGH_POSITIVE" && liquidity_impact != "HIGH_NEGATIVE" {
                continue;
            }
            marketpulse::agents::RouterMessage::NewsSignal { ticker }
        };

        let router = router.clone();
        let kafka_producer = runtime.kafka_producer.clone();
        let handle = router.dispatch(message);
        tokio::spawn(async move {
            match handle.await {
                Ok(marketpulse::agents::RouterOutcome::Published(report)) => {
                    if let Ok(payload) = serde_json::to_string(&report) {
                        let key = report.tickers.first().cloned().unwrap_or_default();
                        let _ = kafka_producer.send(TOPIC_STOCK_ANALYSIS, &key, &payload).await;
                    }
                }
                Ok(marketpulse::agents::RouterOutcome::Withheld { ticker, reason }) => {
                    info!(ticker, reason, "analysis withheld");
                }
                Err(e) => error!(error = %e, "agent graph task panicked"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    marketpulse::telemetry::init();

    let settings = Settings::from_env()?;
    let live_mode = settings.live_mode;
    let runtime = Arc::new(Runtime::bootstrap(settings).await?);

    let _portfolios = PortfolioService::new(runtime.mongo.clone());

    if live_mode {
        info!("starting in pipeline mode (LIVE_MODE=true)");
        info!("no broker client is bundled; wire a BrokerPoll implementation to run PipelineRuntime");
        Ok(())
    } else {
        run_agent_mode(runtime).await
    }
}
