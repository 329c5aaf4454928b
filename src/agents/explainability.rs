//! Synthesizes every specialist agent's raw output into one flat JSON
//! report. Builds a deterministic skeleton first, then augments it with an
//! LLM-generated `portfolio_context`/`summary` via a bounded tool-calling
//! loop. Grounded on `agents/explainability_agent.py::ExplainabilityAgent`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::news::summarizer::{strip_json_fences, LlmClient};

pub const MAX_TOOL_ITERATIONS: u32 = 5;
const DEFAULT_USER_ID: &str = "user_mongo_1";

/// A held position as seen by the portfolio store, surfaced to the LLM via
/// the `get_portfolio_tool` tool call.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioPosition {
    pub ticker: String,
    pub quantity: f64,
    pub avg_cost: f64,
}

/// Stands in for `agents/stocks_tools/portfolio_tool.py::get_portfolio_tool`.
#[async_trait]
pub trait PortfolioLookupTool: Send + Sync {
    async fn get_portfolio(&self, user_id: &str) -> anyhow::Result<Vec<PortfolioPosition>>;
}

/// Stands in for `agents/stocks_tools/data_aggregator_tool.py`, invoked
/// when the ticker count isn't exactly 1 (the per-ticker graph never ran).
#[async_trait]
pub trait MarketDataAggregator: Send + Sync {
    async fn aggregate(&self, tickers: &[String], query: &str) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, Default)]
pub struct AgentOutputs {
    pub news_output: Option<Value>,
    pub twitter_output: Option<Value>,
    pub technical_output: Option<Value>,
    pub fundamental_output: Option<Value>,
    pub montecarlo_output: Option<Value>,
}

impl AgentOutputs {
    fn invoked(&self) -> Vec<&'static str> {
        let mut agents = Vec::new();
        if self.news_output.is_some() {
            agents.push("news_agent");
        }
        if self.twitter_output.is_some() {
            agents.push("twitter_agent");
        }
        if self.technical_output.is_some() {
            agents.push("technical_agent");
        }
        if self.fundamental_output.is_some() {
            agents.push("fundamental_agent");
        }
        if self.montecarlo_output.is_some() {
            agents.push("montecarlo_agent");
        }
        agents
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    pub is_holding: bool,
    #[serde(default)]
    pub current_position: Option<String>,
    pub suggested_action: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub query: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub tickers: Vec<String>,
    pub agents_invoked: Vec<String>,
    pub news_output: Option<Value>,
    pub twitter_output: Option<Value>,
    pub technical_output: Option<Value>,
    pub fundamental_output: Option<Value>,
    pub montecarlo_output: Option<Value>,
    pub aggregated_market_data: Option<Value>,
    pub portfolio_context: PortfolioContext,
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct LlmTurn {
    #[serde(default)]
    tool_call: Option<String>,
    #[serde(default)]
    portfolio_context: Option<PortfolioContext>,
    #[serde(default)]
    summary: Option<String>,
}

fn fallback_summary(tickers: &[String], invoked: &[&str]) -> String {
    let ticker_str = if tickers.is_empty() { "Market".to_string() } else { tickers.join(", ") };
    let invoked_str = if invoked.is_empty() { "None".to_string() } else { invoked.join(", ") };
    format!("Automated report for {ticker_str}. Agents executed: {invoked_str}. Review the detailed agent outputs in this JSON response.")
}

fn fallback_portfolio_context() -> PortfolioContext {
    PortfolioContext {
        is_holding: false,
        current_position: None,
        suggested_action: "CHECK MANUALLY".to_string(),
        note: Some("portfolio check unavailable".to_string()),
    }
}

fn context_string(query: &str, tickers: &[String], outputs: &AgentOutputs, aggregated: &Option<Value>) -> String {
    let mut sections = vec![format!("USER QUERY: {query}"), format!("TICKERS: {tickers:?}"), "AVAILABLE DATA".to_string()];
    let named: [(&str, &Option<Value>); 5] = [
        ("NEWS_OUTPUT", &outputs.news_output),
        ("TWITTER_OUTPUT", &outputs.twitter_output),
        ("TECHNICAL_OUTPUT", &outputs.technical_output),
        ("FUNDAMENTAL_OUTPUT", &outputs.fundamental_output),
        ("MONTECARLO_OUTPUT", &outputs.montecarlo_output),
    ];
    for (label, value) in named {
        if let Some(v) = value {
            sections.push(format!("== {label} =="));
            sections.push(v.to_string());
        }
    }
    if let Some(agg) = aggregated {
        sections.push("== AGGREGATED MARKET DATA ==".to_string());
        sections.push(agg.to_string());
    }
    sections.join("\n")
}

fn system_prompt(user_id: &str) -> String {
    format!(
        r#"You are the Senior Chief Investment Strategist.

You MUST first call the portfolio tool to check whether the user holds these assets. To call it, respond with exactly: {{"tool_call": "get_portfolio_tool", "user_id": "{user_id}"}}

Once you have the portfolio result (or have decided you don't need it), respond with a raw JSON object (no markdown) with EXACTLY these keys:
{{"portfolio_context": {{"is_holding": bool, "current_position": string|null, "suggested_action": "BUY|SELL|HOLD|REBALANCE"}}, "summary": string}}

The summary must interpret the signal, reasons, and risks, not just restate the data."#
    )
}

pub struct ExplainabilityAgent {
    llm: Arc<dyn LlmClient>,
    portfolio: Arc<dyn PortfolioLookupTool>,
    aggregator: Arc<dyn MarketDataAggregator>,
}

impl ExplainabilityAgent {
    pub fn new(llm: Arc<dyn LlmClient>, portfolio: Arc<dyn PortfolioLookupTool>, aggregator: Arc<dyn MarketDataAggregator>) -> Self {
        Self { llm, portfolio, aggregator }
    }

    /// Runs the deterministic skeleton, then the bounded LLM tool-calling
    /// loop. Never fails: on any LLM/parse error, degrades to a manual
    /// review skeleton so a failed synthesis never blocks the pipeline.
    pub async fn synthesize(&self, query: &str, tickers: Vec<String>, outputs: AgentOutputs) -> FinalReport {
        let invoked: Vec<String> = outputs.invoked().into_iter().map(str::to_string).collect();

        let aggregated = if tickers.len() != 1 {
            info!(count = tickers.len(), "ticker count is not 1, invoking market data aggregator");
            match self.aggregator.aggregate(&tickers, query).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "aggregator failed");
                    Some(json!({ "error": e.to_string() }))
                }
            }
        } else {
            None
        };

        let mut messages = vec![system_prompt(DEFAULT_USER_ID), context_string(query, &tickers, &outputs, &aggregated)];

        let (portfolio_context, summary) = match self.run_tool_loop(&mut messages).await {
            Some(result) => result,
            None => (fallback_portfolio_context(), fallback_summary(&tickers, &outputs.invoked())),
        };

        FinalReport {
            query: query.to_string(),
            timestamp: Utc::now(),
            tickers,
            agents_invoked: invoked,
            news_output: outputs.news_output,
            twitter_output: outputs.twitter_output,
            technical_output: outputs.technical_output,
            fundamental_output: outputs.fundamental_output,
            montecarlo_output: outputs.montecarlo_output,
            aggregated_market_data: aggregated,
            portfolio_context,
            summary,
        }
    }

    async fn run_tool_loop(&self, messages: &mut Vec<String>) -> Option<(PortfolioContext, String)> {
        for _ in 0..MAX_TOOL_ITERATIONS {
            let prompt = messages.join("\n\n");
            let raw = self.llm.complete(&prompt).await.ok()?;
            let cleaned = strip_json_fences(&raw);

            let turn: LlmTurn = match serde_json::from_str(cleaned) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "explainability LLM output failed to parse");
                    return None;
                }
            };

            if let Some(tool_name) = turn.tool_call {
                if tool_name == "get_portfolio_tool" {
                    let positions = self.portfolio.get_portfolio(DEFAULT_USER_ID).await.unwrap_or_default();
                    messages.push(format!("TOOL RESULT (get_portfolio_tool): {}", serde_json::to_string(&positions).unwrap_or_default()));
                    continue;
                }
                messages.push("TOOL RESULT: tool not found".to_string());
                continue;
            }

            return Some((
                turn.portfolio_context.unwrap_or_else(fallback_portfolio_context),
                turn.summary.unwrap_or_else(|| "No summary produced.".to_string()),
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NoHoldings;
    #[async_trait]
    impl PortfolioLookupTool for NoHoldings {
        async fn get_portfolio(&self, _user_id: &str) -> anyhow::Result<Vec<PortfolioPosition>> {
            Ok(vec![])
        }
    }

    struct NoAggregation;
    #[async_trait]
    impl MarketDataAggregator for NoAggregation {
        async fn aggregate(&self, _tickers: &[String], _query: &str) -> anyhow::Result<Value> {
            Ok(json!({}))
        }
    }

    struct ToolThenAnswer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for ToolThenAnswer {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(r#"{"tool_call": "get_portfolio_tool"}"#.to_string())
            } else {
                Ok(r#"{"portfolio_context": {"is_holding": false, "suggested_action": "HOLD"}, "summary": "Nothing notable."}"#.to_string())
            }
        }
    }

    #[tokio::test]
    async fn tool_call_then_final_answer_produces_summary() {
        let agent = ExplainabilityAgent::new(
            Arc::new(ToolThenAnswer { calls: AtomicU32::new(0) }),
            Arc::new(NoHoldings),
            Arc::new(NoAggregation),
        );
        let report = agent.synthesize("Should I sell AAPL?", vec!["AAPL".to_string()], AgentOutputs::default()).await;
        assert_eq!(report.portfolio_context.suggested_action, "HOLD");
        assert_eq!(report.summary, "Nothing notable.");
    }

    struct AlwaysBroken;
    #[async_trait]
    impl LlmClient for AlwaysBroken {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("LLM unavailable"))
        }
    }

    #[tokio::test]
    async fn llm_unavailable_degrades_to_deterministic_skeleton() {
        let agent = ExplainabilityAgent::new(Arc::new(AlwaysBroken), Arc::new(NoHoldings), Arc::new(NoAggregation));
        let report = agent.synthesize("Should I sell AAPL?", vec!["AAPL".to_string()], AgentOutputs::default()).await;
        assert_eq!(report.portfolio_context.suggested_action, "CHECK MANUALLY");
        assert!(report.summary.contains("Automated report"));
    }

    #[tokio::test]
    async fn multi_ticker_invokes_aggregator() {
        struct CountingAggregator {
            calls: AtomicU32,
        }
        #[async_trait]
        impl MarketDataAggregator for CountingAggregator {
            async fn aggregate(&self, _tickers: &[String], _query: &str) -> anyhow::Result<Value> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "combined": true }))
            }
        }
        let aggregator = Arc::new(CountingAggregator { calls: AtomicU32::new(0) });
        let agent = ExplainabilityAgent::new(Arc::new(AlwaysBroken), Arc::new(NoHoldings), aggregator.clone());
        let report = agent
            .synthesize("Compare AAPL and MSFT", vec!["AAPL".to_string(), "MSFT".to_string()], AgentOutputs::default())
            .await;
        assert_eq!(aggregator.calls.load(Ordering::SeqCst), 1);
        assert!(report.aggregated_market_data.is_some());
    }
}
