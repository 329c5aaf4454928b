//! Parses a user query (or a Kafka-triggered signal) into an
//! `AgentRoutingDecision`. Grounded on `orchestrator.py::Orchestrator`; the
//! LLM call goes through the same `LlmClient` seam as `news::summarizer`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agents::fuzzy_ticker::FuzzyTickerResolver;
use crate::error::OrchestratorError;
use crate::news::summarizer::LlmClient;

/// Interval granularity for the technical agent's candle fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute,
    ThreeMinute,
    FiveMinute,
    TenMinute,
    FifteenMinute,
    ThirtyMinute,
    SixtyMinute,
    Day,
}

impl Interval {
    fn from_str_loose(s: &str) -> Self {
        match s {
            "minute" => Interval::Minute,
            "3minute" => Interval::ThreeMinute,
            "5minute" => Interval::FiveMinute,
            "10minute" => Interval::TenMinute,
            "15minute" => Interval::FifteenMinute,
            "30minute" => Interval::ThirtyMinute,
            "60minute" => Interval::SixtyMinute,
            "day" => Interval::Day,
            _ => Interval::FiveMinute,
        }
    }
}

/// The raw decision an LLM (or a Kafka short-circuit) produces, before
/// start/end date defaulting and ticker resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRoutingDecision {
    pub tickers: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe_hours: u32,
    pub run_news: bool,
    pub run_twitter: bool,
    pub run_technical: bool,
    pub run_fundamental: bool,
    pub run_montecarlo: bool,
    #[serde(default = "default_interval")]
    pub interval: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn default_timeframe() -> u32 {
    24
}

fn default_interval() -> String {
    "5minute".to_string()
}

/// Fully resolved routing decision: dates defaulted, tickers fuzzy-matched
/// to exchange symbols, specialist agents disabled if resolution is
/// ambiguous.
#[derive(Debug, Clone)]
pub struct AgentRoutingDecision {
    pub tickers: Vec<String>,
    pub company_names: Vec<String>,
    pub timeframe_hours: u32,
    pub interval: Interval,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub run_news: bool,
    pub run_twitter: bool,
    pub run_technical: bool,
    pub run_fundamental: bool,
    pub run_montecarlo: bool,
}

/// How the orchestrator was invoked: a terminal/chat query, or a
/// Kafka-triggered short-circuit that skips the LLM entirely.
pub enum TriggerContext<'a> {
    Query(&'a str),
    TechnicalSignal { ticker: &'a str },
    NewsSignal { ticker: &'a str },
}

fn technical_signal_decision(ticker: &str) -> RawRoutingDecision {
    RawRoutingDecision {
        tickers: vec![ticker.to_string()],
        timeframe_hours: 24,
        run_news: true,
        run_twitter: true,
        run_technical: false,
        run_fundamental: false,
        run_montecarlo: true,
        interval: default_interval(),
        start_date: None,
        end_date: None,
    }
}

fn news_signal_decision(ticker: &str) -> RawRoutingDecision {
    RawRoutingDecision {
        tickers: vec![ticker.to_string()],
        timeframe_hours: 24,
        run_news: false,
        run_twitter: false,
        run_technical: true,
        run_fundamental: false,
        run_montecarlo: true,
        interval: default_interval(),
        start_date: None,
        end_date: None,
    }
}

fn routing_prompt(query: &str) -> String {
    format!(
        r#"You are a financial query router. Parse the user's request into STRICT JSON:
{{"tickers": [string], "timeframe_hours": int, "run_news": bool, "run_twitter": bool, "run_technical": bool, "run_fundamental": bool, "run_montecarlo": bool, "interval": string, "start_date": string|null, "end_date": string|null}}

Rules:
- tickers: company names or ticker symbols mentioned; empty list if none.
- timeframe_hours: lookback window for news/twitter in hours (default 24).
- interval: one of "minute", "3minute", "5minute", "10minute", "15minute", "30minute", "60minute", "day".
- start_date/end_date: ISO8601 if the user implies a date range, else null.
- run_news: true if the query needs headlines or market catalysts.
- run_twitter: true only if the user asks for social/retail sentiment.
- run_technical: true if the query is about price action, patterns, or indicators.
- run_fundamental: true if the query is about fair value or financial health.
- run_montecarlo: true if the query is about risk, probability, or a buy/sell call.

Query: {query}"#
    )
}

fn fallback_decision(query: &str) -> RawRoutingDecision {
    let fallback_tickers: Vec<String> = query
        .split_whitespace()
        .filter(|w| w.len() >= 2 && w.len() <= 6 && w.chars().all(|c| c.is_ascii_uppercase()))
        .map(|w| w.to_string())
        .collect();
    RawRoutingDecision {
        tickers: if fallback_tickers.is_empty() { vec!["RELIANCE".to_string()] } else { fallback_tickers },
        timeframe_hours: 24,
        run_news: true,
        run_twitter: false,
        run_technical: false,
        run_fundamental: false,
        run_montecarlo: false,
        interval: "day".to_string(),
        start_date: None,
        end_date: None,
    }
}

/// Parses user intent (or a Kafka trigger) into a routing decision, then
/// resolves tickers and applies the date-defaulting rules.
pub struct Orchestrator {
    llm: std::sync::Arc<dyn LlmClient>,
    tickers: FuzzyTickerResolver,
}

impl Orchestrator {
    pub fn new(llm: std::sync::Arc<dyn LlmClient>, tickers: FuzzyTickerResolver) -> Self {
        Self { llm, tickers }
    }

    pub async fn parse(&self, ctx: TriggerContext<'_>) -> Result<AgentRoutingDecision, OrchestratorError> {
        let raw = match ctx {
            TriggerContext::TechnicalSignal { ticker } => technical_signal_decision(ticker),
            TriggerContext::NewsSignal { ticker } => news_signal_decision(ticker),
            TriggerContext::Query(query) => self.llm_decision(query).await,
        };

        let now = Utc::now();
        let end_date = raw
            .end_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(now);

        let interval = Interval::from_str_loose(&raw.interval);

        let mut start_date = match raw.start_date.as_deref().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            Some(d) => d.with_timezone(&Utc),
            None => match interval {
                Interval::Day => end_date - Duration::days(365),
                Interval::SixtyMinute | Interval::ThirtyMinute => end_date - Duration::days(60),
                _ => end_date - Duration::days(5),
            },
        };
        if start_date >= end_date {
            start_date = end_date - Duration::days(1);
        }

        let mut run_news = raw.run_news;
        let mut run_twitter = raw.run_twitter;
        let mut run_technical = raw.run_technical;
        let mut run_fundamental = raw.run_fundamental;
        let mut run_montecarlo = raw.run_montecarlo;

        if raw.tickers.len() != 1 {
            info!(count = raw.tickers.len(), "ticker count is not 1, disabling specialist agents");
            run_news = false;
            run_twitter = false;
            run_technical = false;
            run_fundamental = false;
            run_montecarlo = false;
        }

        let mut tickers = Vec::new();
        let mut company_names = Vec::new();
        for candidate in &raw.tickers {
            match self.tickers.resolve(candidate).await {
                Some(m) => {
                    tickers.push(m.ticker);
                    company_names.push(m.company_name);
                }
                None => warn!(candidate, "ticker resolution failed, dropping from routing decision"),
            }
        }

        Ok(AgentRoutingDecision {
            tickers,
            company_names,
            timeframe_hours: raw.timeframe_hours,
            interval,
            start_date,
            end_date,
            run_news,
            run_twitter,
            run_technical,
            run_fundamental,
            run_montecarlo,
        })
    }

    async fn llm_decision(&self, query: &str) -> RawRoutingDecision {
        let prompt = routing_prompt(query);
        match self.llm.complete(&prompt).await {
            Ok(raw) => {
                let cleaned = crate::news::summarizer::strip_json_fences(&raw);
                match serde_json::from_str::<RawRoutingDecision>(cleaned) {
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!(error = %e, "routing decision JSON parse failed, using fallback");
                        fallback_decision(query)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "LLM routing call failed, using fallback");
                fallback_decision(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fuzzy_ticker::{FuzzyTickerResolver, Instrument, NoRemoteLookup};

    struct StubLlm;

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(r#"{"tickers": ["RELIANCE"], "timeframe_hours": 24, "run_news": true, "run_twitter": false, "run_technical": true, "run_fundamental": false, "run_montecarlo": true, "interval": "day", "start_date": null, "end_date": null}"#.to_string())
        }
    }

    fn orchestrator() -> Orchestrator {
        let resolver = FuzzyTickerResolver::new(
            vec![Instrument { tradingsymbol: "RELIANCE".into(), name: "RELIANCE INDUSTRIES LIMITED".into(), exchange: "BSE".into() }],
            Box::new(NoRemoteLookup),
        );
        Orchestrator::new(std::sync::Arc::new(StubLlm), resolver)
    }

    #[tokio::test]
    async fn day_interval_defaults_start_date_to_one_year_back() {
        let orchestrator = orchestrator();
        let decision = orchestrator.parse(TriggerContext::Query("daily chart for reliance")).await.unwrap();
        assert_eq!(decision.tickers, vec!["RELIANCE".to_string()]);
        let span = decision.end_date - decision.start_date;
        assert!((span.num_days() - 365).abs() <= 1);
    }

    #[tokio::test]
    async fn technical_signal_short_circuits_llm_and_sets_news_and_montecarlo() {
        let orchestrator = orchestrator();
        let decision = orchestrator.parse(TriggerContext::TechnicalSignal { ticker: "RELIANCE" }).await.unwrap();
        assert!(decision.run_news);
        assert!(decision.run_twitter);
        assert!(!decision.run_technical);
        assert!(decision.run_montecarlo);
    }

    #[tokio::test]
    async fn multi_ticker_query_disables_specialist_agents() {
        let resolver = FuzzyTickerResolver::new(
            vec![
                Instrument { tradingsymbol: "RELIANCE".into(), name: "RELIANCE INDUSTRIES LIMITED".into(), exchange: "BSE".into() },
                Instrument { tradingsymbol: "TCS".into(), name: "TATA CONSULTANCY SERVICES LIMITED".into(), exchange: "BSE".into() },
            ],
            Box::new(NoRemoteLookup),
        );
        struct MultiStub;
        #[async_trait]
        impl LlmClient for MultiStub {
            async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
                Ok(r#"{"tickers": ["RELIANCE", "TCS"], "timeframe_hours": 24, "run_news": true, "run_twitter": true, "run_technical": true, "run_fundamental": true, "run_montecarlo": true, "interval": "day", "start_date": null, "end_date": null}"#.to_string())
            }
        }
        let orchestrator = Orchestrator::new(std::sync::Arc::new(MultiStub), resolver);
        let decision = orchestrator.parse(TriggerContext::Query("compare reliance and tcs")).await.unwrap();
        assert_eq!(decision.tickers.len(), 2);
        assert!(!decision.run_news);
        assert!(!decision.run_technical);
    }
}
