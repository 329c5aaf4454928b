//! Per-component error enums plus a crate-wide error used at composition
//! boundaries. Individual services return their own `thiserror` enum;
//! callers that just need to propagate use `anyhow::Result`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("kv backend error: {0}")]
    Kv(String),
    #[error("bloom filter io error: {0}")]
    Bloom(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("http error: {0}")]
    Http(String),
}

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("classifier endpoint error: {0}")]
    Endpoint(String),
}

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("window has fewer than {needed} prices, have {have}")]
    InsufficientWindow { needed: usize, have: usize },
}

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("portfolio {0} not found")]
    NotFound(String),
    #[error("insufficient cash: balance {balance:.2} < required {required:.2}")]
    InsufficientCash { balance: f64, required: f64 },
    #[error("insufficient holding: have {have} < requested {requested} for {ticker}")]
    InsufficientHolding {
        ticker: String,
        have: f64,
        requested: f64,
    },
    #[error("holding {0} not found")]
    HoldingNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("llm routing decision failed: {0}")]
    LlmRouting(String),
    #[error("ticker resolution failed for {0}")]
    TickerResolution(String),
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("specialist agent {name} failed: {reason}")]
    SpecialistFailed { name: String, reason: String },
    #[error("tool-calling loop exceeded {0} iterations")]
    ToolLoopExhausted(usize),
}

/// Crate-wide error used where a caller needs to fold several component
/// errors into one (e.g. the top-level binary's `main`).
#[derive(Error, Debug)]
pub enum MarketpulseError {
    #[error(transparent)]
    Dedup(#[from] DedupError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Sentiment(#[from] SentimentError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Portfolio(#[from] PortfolioError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
