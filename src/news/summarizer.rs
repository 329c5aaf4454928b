//! `LLMSummarizer`: worker pool draining a bounded queue, RPM-limited LLM
//! calls, strict-JSON relevance/summary extraction. Grounded in `spec.md`
//! §4.5; the defensive-JSON-parsing idiom follows the teacher's
//! `strategy/mod.rs::make_decision`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::store::MongoStore;

pub const DEFAULT_WORKERS: usize = 10;
pub const QUEUE_BOUND: usize = 100;
pub const MIN_CONTENT_LEN: usize = 100;
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue_impact: String,
    pub stock_price_impact: String,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub is_relevant: bool,
    pub relevance_reason: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub financial_metrics: FinancialMetrics,
    pub impact_assessment: String,
}

/// An LLM completion backend. Implemented over `rig-core` in production;
/// abstracted so the worker-pool/retry logic is independently testable.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

pub struct RigLlmClient {
    agent: rig::agent::Agent<rig::providers::openai::CompletionModel>,
}

impl RigLlmClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = rig::providers::openai::Client::new(api_key);
        let agent = client.agent(model).build();
        Self { agent }
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        use rig::completion::Prompt;
        Ok(self.agent.prompt(prompt).await?)
    }
}

fn summarize_prompt(title: &str, content: &str) -> String {
    format!(
        r#"You are a financial news analyst. Given the article below, respond with STRICT JSON only:
{{"is_relevant": bool, "relevance_reason": string, "summary": string, "key_points": [string], "financial_metrics": {{"revenue_impact": string, "stock_price_impact": string, "confidence": string}}, "impact_assessment": string}}

Title: {title}
Content: {content}"#
    )
}

/// Strips markdown code fences and tolerates leading/trailing prose before
/// the JSON object, mirroring the Python `_clean_json_string`.
pub fn strip_json_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("```json").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("```").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    let start = trimmed.find('{').unwrap_or(0);
    let end = trimmed.rfind('}').map(|i| i + 1).unwrap_or(trimmed.len());
    &trimmed[start..end]
}

fn fallback_summary(reason: &str) -> SummaryResult {
    SummaryResult {
        is_relevant: true,
        relevance_reason: "fallback after parse/LLM failure".to_string(),
        summary: reason.to_string(),
        key_points: Vec::new(),
        financial_metrics: FinancialMetrics {
            revenue_impact: "unknown".to_string(),
            stock_price_impact: "unknown".to_string(),
            confidence: "low".to_string(),
        },
        impact_assessment: "unknown".to_string(),
    }
}

pub struct LlmSummarizer {
    store: Arc<MongoStore>,
    llm: Arc<dyn LlmClient>,
    workers: usize,
    spacing: Duration,
}

#[derive(Debug, Clone)]
pub struct EnrichedArticleRef {
    pub article_id: String,
    pub title: String,
    pub content: String,
}

impl LlmSummarizer {
    pub fn new(store: Arc<MongoStore>, llm: Arc<dyn LlmClient>, workers: usize, rpm: usize) -> Self {
        Self {
            store,
            llm,
            workers: workers.max(1),
            spacing: Duration::from_secs_f64(60.0 / rpm.max(1) as f64),
        }
    }

    /// Dispatches a batch (≤50) into a bounded queue drained by `workers`
    /// workers, each additionally spaced by `spacing` between LLM calls.
    pub async fn process_batch(&self, batch: Vec<EnrichedArticleRef>) {
        let (tx, rx) = mpsc::channel(QUEUE_BOUND);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let semaphore = Arc::new(Semaphore::new(self.workers));

        for article in batch.into_iter().take(50) {
            if tx.send(article).await.is_err() {
                break;
            }
        }
        drop(tx);

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let rx = rx.clone();
            let permit_pool = semaphore.clone();
            let store = self.store.clone();
            let llm = self.llm.clone();
            let spacing = self.spacing;

            handles.push(tokio::spawn(async move {
                let _permit = permit_pool.acquire().await.expect("semaphore open");
                loop {
                    let next = { rx.lock().await.recv().await };
                    let Some(article) = next else { break };
                    process_article(&store, llm.as_ref(), article).await;
                    tokio::time::sleep(spacing).await;
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn process_article(store: &MongoStore, llm: &dyn LlmClient, article: EnrichedArticleRef) {
    if article.content.len() < MIN_CONTENT_LEN {
        mark_summarized(store, &article.article_id).await;
        return;
    }

    let prompt = summarize_prompt(&article.title, &article.content);
    let mut last_error = None;

    for attempt in 0..MAX_RETRY_ATTEMPTS {
        match llm.complete(&prompt).await {
            Ok(raw) => {
                let cleaned = strip_json_fences(&raw);
                match serde_json::from_str::<SummaryResult>(cleaned) {
                    Ok(parsed) => {
                        if parsed.is_relevant {
                            let _ = store
                                .upsert_one(
                                    crate::store::mongo::SUMMARIZE,
                                    mongodb::bson::doc! { "article_id": &article.article_id },
                                    &parsed,
                                )
                                .await;
                        }
                        mark_summarized(store, &article.article_id).await;
                        return;
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "summary JSON parse failed");
                        last_error = Some(e.to_string());
                    }
                }
            }
            Err(e) => {
                debug!(attempt, error = %e, "LLM call failed, retrying");
                last_error = Some(e.to_string());
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    warn!(article_id = %article.article_id, "summarizer exhausted retries, persisting fallback");
    let fallback = fallback_summary(&last_error.unwrap_or_default());
    let _ = store
        .upsert_one(
            crate::store::mongo::SUMMARIZE,
            mongodb::bson::doc! { "article_id": &article.article_id },
            &fallback,
        )
        .await;
    mark_summarized(store, &article.article_id).await;
}

async fn mark_summarized(store: &MongoStore, article_id: &str) {
    let _ = store
        .update_fields(
            crate::store::mongo::ENRICHED_ARTICLES,
            mongodb::bson::doc! { "article_id": article_id },
            mongodb::bson::doc! { "summarized": true },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_json_fences_removes_markdown_wrapper() {
        let raw = "```json\n{\"is_relevant\": true}\n```";
        assert_eq!(strip_json_fences(raw), "{\"is_relevant\": true}");
    }

    #[test]
    fn strip_json_fences_tolerates_leading_prose() {
        let raw = "Here is the result:\n{\"is_relevant\": false}";
        assert_eq!(strip_json_fences(raw), "{\"is_relevant\": false}");
    }
}
