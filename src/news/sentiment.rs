//! Chunked financial sentiment classification. The classifier model itself
//! is out of scope (`spec.md` §1); this module models it as an HTTP client
//! trait, transliterating the chunking/aggregation logic from the Python
//! `FinBERTAnalyzer.analyze`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{Confidence, SentimentLabel, SentimentResult};
use crate::error::SentimentError;

const CHUNK_SIZE: usize = 450;
const SHORT_TEXT_THRESHOLD: usize = 200;
const CHUNK_WEIGHTS: [f64; 2] = [0.70, 0.30];

#[derive(Debug, Deserialize)]
pub struct RawClassification {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

/// A black-box classifier endpoint (e.g. FinBERT served over HTTP). Only
/// the contract is specified; no model is bundled.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<RawClassification, SentimentError>;
}

pub struct FinbertHttpClient {
    endpoint: String,
    client: reqwest::Client,
}

impl FinbertHttpClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SentimentClassifier for FinbertHttpClient {
    async fn classify(&self, text: &str) -> Result<RawClassification, SentimentError> {
        self.client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| SentimentError::Endpoint(e.to_string()))?
            .json::<RawClassification>()
            .await
            .map_err(|e| SentimentError::Endpoint(e.to_string()))
    }
}

fn confidence_for(score: f64) -> Confidence {
    if score > 0.85 {
        Confidence::High
    } else if score > 0.65 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn argmax(classes: &RawClassification) -> (SentimentLabel, f64) {
    let scores = [
        (SentimentLabel::Positive, classes.positive),
        (SentimentLabel::Negative, classes.negative),
        (SentimentLabel::Neutral, classes.neutral),
    ];
    scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .unwrap()
}

fn into_result(classes: RawClassification, confidence_override: Option<Confidence>) -> SentimentResult {
    let (label, score) = argmax(&classes);
    SentimentResult {
        label,
        score,
        confidence: confidence_override.unwrap_or_else(|| confidence_for(score)),
        class_scores: [classes.positive, classes.negative, classes.neutral],
    }
}

fn weighted_merge(chunks: &[RawClassification]) -> RawClassification {
    if chunks.len() == 1 {
        return RawClassification {
            positive: chunks[0].positive,
            negative: chunks[0].negative,
            neutral: chunks[0].neutral,
        };
    }

    // Head gets 0.70; the remainder is spread evenly over the other chunks,
    // matching the Python `[0.7] + [0.3 / (n - 1)] * (n - 1)` weighting.
    let tail_weight = CHUNK_WEIGHTS[1] / (chunks.len() - 1) as f64;
    let mut positive = 0.0;
    let mut negative = 0.0;
    let mut neutral = 0.0;
    for (i, chunk) in chunks.iter().enumerate() {
        let weight = if i == 0 { CHUNK_WEIGHTS[0] } else { tail_weight };
        positive += chunk.positive * weight;
        negative += chunk.negative * weight;
        neutral += chunk.neutral * weight;
    }
    RawClassification { positive, negative, neutral }
}

/// Splits `text` into a head chunk (always) and a middle chunk (only when
/// the text is more than twice the chunk size), mirroring the Python slice
/// `text[len//2 - chunk_size//2 : len//2 + chunk_size//2]`.
fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let head: String = chars.iter().take(CHUNK_SIZE).collect();

    if chars.len() <= 2 * CHUNK_SIZE {
        return vec![head];
    }

    let mid = chars.len() / 2;
    let half = CHUNK_SIZE / 2;
    let start = mid.saturating_sub(half);
    let end = (mid + half).min(chars.len());
    let middle: String = chars[start..end].iter().collect();

    vec![head, middle]
}

pub async fn analyze(
    classifier: &dyn SentimentClassifier,
    text: &str,
    title: Option<&str>,
) -> Result<SentimentResult, SentimentError> {
    if text.chars().count() < SHORT_TEXT_THRESHOLD {
        if let Some(title) = title {
            let raw = classifier.classify(title).await?;
            return Ok(into_result(raw, Some(Confidence::Low)));
        }
    }

    let chunks = chunk_text(text);
    let mut classified = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        classified.push(classifier.classify(chunk).await?);
    }
    let merged = weighted_merge(&classified);
    Ok(into_result(merged, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_single_chunk_under_900_chars() {
        let text = "a".repeat(500);
        assert_eq!(chunk_text(&text).len(), 1);
    }

    #[test]
    fn chunk_text_two_chunks_over_900_chars() {
        let text = "a".repeat(2000);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), CHUNK_SIZE);
        assert_eq!(chunks[1].chars().count(), CHUNK_SIZE);
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(confidence_for(0.9), Confidence::High);
        assert_eq!(confidence_for(0.7), Confidence::Medium);
        assert_eq!(confidence_for(0.5), Confidence::Low);
    }

    #[test]
    fn weighted_merge_two_chunks() {
        let a = RawClassification { positive: 1.0, negative: 0.0, neutral: 0.0 };
        let b = RawClassification { positive: 0.0, negative: 1.0, neutral: 0.0 };
        let merged = weighted_merge(&[a, b]);
        assert!((merged.positive - 0.70).abs() < 1e-9);
        assert!((merged.negative - 0.30).abs() < 1e-9);
    }
}
