//! Dispatches one analysis graph per incoming signal/news message under two
//! gates: a global semaphore (bounded concurrent analyses) and a per-ticker
//! mutex (serializes analyses for the same ticker). Grounded on spec.md
//! §4.10/§9's "concurrent map string→mutex, shard-by-hash" design note.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::agents::conflict::{ConflictPolicy, SentimentReadings};
use crate::agents::explainability::{AgentOutputs, ExplainabilityAgent, FinalReport};
use crate::agents::orchestrator::{Orchestrator, TriggerContext};
use crate::agents::specialists::SpecialistAgent;
use crate::domain::TradeAction;

pub const DEFAULT_GLOBAL_CONCURRENCY: usize = 3;
pub const DEFAULT_OFFLOAD_POOL_SIZE: usize = 5;
const SHUTDOWN_TIMEOUT_SECS: u64 = 60;
const SHARD_COUNT: usize = 16;

fn shard_of(ticker: &str) -> usize {
    ticker.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize)) % SHARD_COUNT
}

/// A concurrent map from ticker to its serializing mutex, sharded by hash
/// so lock-map contention doesn't itself become a bottleneck. Locks are
/// inserted on demand and never removed (tickers are a small, bounded set
/// in practice).
#[derive(Default)]
struct TickerLocks {
    shards: Vec<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TickerLocks {
    fn new() -> Self {
        Self { shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect() }
    }

    async fn lock_for(&self, ticker: &str) -> Arc<Mutex<()>> {
        let shard = &self.shards[shard_of(ticker)];
        let mut map = shard.lock().await;
        map.entry(ticker.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Incoming trigger for one analysis graph.
pub enum RouterMessage {
    TechnicalSignal { ticker: String, action: TradeAction },
    NewsSignal { ticker: String },
}

/// Published result of one analysis graph, or a withheld result with the
/// conflict reason that blocked it.
pub enum RouterOutcome {
    Published(FinalReport),
    Withheld { ticker: String, reason: String },
}

/// Fan-out target for whatever specialists a routing decision enables.
pub struct SpecialistSet {
    pub news: Arc<dyn SpecialistAgent>,
    pub twitter: Arc<dyn SpecialistAgent>,
    pub technical: Arc<dyn SpecialistAgent>,
    pub fundamental: Arc<dyn SpecialistAgent>,
    pub montecarlo: Arc<dyn SpecialistAgent>,
}

pub struct AgentRouter {
    locks: TickerLocks,
    global: Arc<Semaphore>,
    offload: Arc<Semaphore>,
    orchestrator: Arc<Orchestrator>,
    specialists: Arc<SpecialistSet>,
    explainability: Arc<ExplainabilityAgent>,
    conflict_policy: Arc<dyn ConflictPolicy>,
    active_tasks: Arc<AtomicUsize>,
    shutting_down: Arc<std::sync::atomic::AtomicBool>,
}

impl AgentRouter {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        specialists: Arc<SpecialistSet>,
        explainability: Arc<ExplainabilityAgent>,
        conflict_policy: Arc<dyn ConflictPolicy>,
        global_concurrency: usize,
        offload_pool_size: usize,
    ) -> Self {
        Self {
            locks: TickerLocks::new(),
            global: Arc::new(Semaphore::new(global_concurrency)),
            offload: Arc::new(Semaphore::new(offload_pool_size)),
            orchestrator,
            specialists,
            explainability,
            conflict_policy,
            active_tasks: Arc::new(AtomicUsize::new(0)),
            shutting_down: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Spawns a task under the global semaphore and per-ticker mutex,
    /// returning its `JoinHandle` so callers can track graceful shutdown.
    pub fn dispatch(self: &Arc<Self>, message: RouterMessage) -> JoinHandle<RouterOutcome> {
        let router = self.clone();
        self.active_tasks.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            if router.shutting_down.load(Ordering::SeqCst) {
                warn!("router is shutting down, rejecting new dispatch");
                router.active_tasks.fetch_sub(1, Ordering::SeqCst);
                let ticker = match &message {
                    RouterMessage::TechnicalSignal { ticker, .. } => ticker.clone(),
                    RouterMessage::NewsSignal { ticker } => ticker.clone(),
                };
                return RouterOutcome::Withheld { ticker, reason: "router shutting down".to_string() };
            }

            let ticker = match &message {
                RouterMessage::TechnicalSignal { ticker, .. } => ticker.clone(),
                RouterMessage::NewsSignal { ticker } => ticker.clone(),
            };

            let _global_permit = router.global.acquire().await.expect("global semaphore open");
            let ticker_lock = router.locks.lock_for(&ticker).await;
            let _ticker_guard = ticker_lock.lock().await;

            let outcome = router.run_graph(message).await;
            router.active_tasks.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }

    async fn run_graph(&self, message: RouterMessage) -> RouterOutcome {
        let (ticker, action, ctx) = match message {
            RouterMessage::TechnicalSignal { ticker, action } => {
                let ctx = TriggerContext::TechnicalSignal { ticker: &ticker };
                let decision = self.orchestrator.parse(ctx).await;
                (ticker.clone(), Some(action), decision)
            }
            RouterMessage::NewsSignal { ticker } => {
                let ctx = TriggerContext::NewsSignal { ticker: &ticker };
                let decision = self.orchestrator.parse(ctx).await;
                (ticker.clone(), None, decision)
            }
        };

        let decision = match ctx {
            Ok(d) => d,
            Err(e) => {
                error!(ticker, error = %e, "orchestrator routing failed");
                return RouterOutcome::Withheld { ticker, reason: format!("routing failed: {e}") };
            }
        };

        let mut outputs = AgentOutputs::default();
        let permit = self.offload.acquire().await.expect("offload pool open");

        if decision.run_news {
            outputs.news_output = self.specialists.news.run(&ticker).await.ok();
        }
        if decision.run_twitter {
            outputs.twitter_output = self.specialists.twitter.run(&ticker).await.ok();
        }
        if decision.run_technical {
            outputs.technical_output = self.specialists.technical.run(&ticker).await.ok();
        }
        if decision.run_fundamental {
            outputs.fundamental_output = self.specialists.fundamental.run(&ticker).await.ok();
        }
        if decision.run_montecarlo {
            outputs.montecarlo_output = self.specialists.montecarlo.run(&ticker).await.ok();
        }
        drop(permit);

        if let Some(action) = action {
            let sentiment = sentiment_readings(&outputs);
            if let Some(reason) = self.conflict_policy.conflict(action, sentiment) {
                info!(ticker, reason, "signal withheld by conflict policy");
                return RouterOutcome::Withheld { ticker, reason };
            }
        }

        let report = self
            .explainability
            .synthesize(&format!("automatic analysis for {ticker}"), vec![ticker.clone()], outputs)
            .await;

        RouterOutcome::Published(report)
    }

    /// Stops accepting new dispatches, waits up to `SHUTDOWN_TIMEOUT_SECS`
    /// for already-spawned tasks to drain, then returns without
    /// forcibly cancelling (callers own the `JoinHandle`s and may abort).
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        while self.active_task_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if self.active_task_count() > 0 {
            warn!(remaining = self.active_task_count(), "shutdown timeout reached with tasks still active");
        } else {
            info!("router drained cleanly");
        }
    }
}

fn sentiment_readings(outputs: &AgentOutputs) -> SentimentReadings {
    use crate::agents::conflict::Sentiment;

    let news = outputs.news_output.as_ref().and_then(|v| v.get("overall_sentiment")).and_then(|v| v.as_str()).map(|s| match s {
        "bullish" => Sentiment::Bullish,
        "bearish" => Sentiment::Bearish,
        _ => Sentiment::Neutral,
    });
    let twitter_score = outputs.twitter_output.as_ref().and_then(|v| v.get("sentiment_score")).and_then(|v| v.as_f64());

    SentimentReadings { news, twitter_score }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_of_is_deterministic_and_in_range() {
        for ticker in ["RELIANCE", "TCS", "AAPL", "MSFT"] {
            let shard = shard_of(ticker);
            assert!(shard < SHARD_COUNT);
            assert_eq!(shard, shard_of(ticker));
        }
    }

    #[tokio::test]
    async fn per_ticker_lock_is_reused_across_calls() {
        let locks = TickerLocks::new();
        let a = locks.lock_for("RELIANCE").await;
        let b = locks.lock_for("RELIANCE").await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
