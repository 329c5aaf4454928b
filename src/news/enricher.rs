//! `NewsEnricher` control loop: poll raw articles, dedup, fetch, classify
//! sentiment, extract features, upsert clusters. Staged pipeline with an
//! early-exit log at each gate, in the same shape as the teacher's
//! `TradingPipeline::process_token`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{Article, ContentQuality, StoryCluster};
use crate::news::dedup::{DedupOutcome, DedupStore, DedupVerdict};
use crate::news::fetcher::ArticleFetcher;
use crate::news::sentiment::SentimentClassifier;
use crate::news::{features, sentiment};
use crate::store::MongoStore;

pub const BATCH_SIZE: usize = 50;
pub const CONCURRENCY_WIDTH: usize = 20;

pub struct NewsEnricher {
    store: Arc<MongoStore>,
    dedup: Arc<DedupStore>,
    fetcher: Arc<ArticleFetcher>,
    classifier: Arc<dyn SentimentClassifier>,
}

/// Candidate raw article pulled off the `raw_articles` collection, prior to
/// enrichment.
#[derive(Debug, Clone)]
pub struct RawArticle {
    pub article_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub factor_type: String,
    pub published_at: chrono::DateTime<Utc>,
}

impl NewsEnricher {
    pub fn new(
        store: Arc<MongoStore>,
        dedup: Arc<DedupStore>,
        fetcher: Arc<ArticleFetcher>,
        classifier: Arc<dyn SentimentClassifier>,
    ) -> Self {
        Self { store, dedup, fetcher, classifier }
    }

    /// Processes one batch of up to `BATCH_SIZE` raw articles, bounding
    /// in-flight work to `CONCURRENCY_WIDTH` concurrent tasks.
    pub async fn process_batch(&self, batch: Vec<RawArticle>) {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(CONCURRENCY_WIDTH));
        let mut handles = Vec::with_capacity(batch.len().min(BATCH_SIZE));

        for raw in batch.into_iter().take(BATCH_SIZE) {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore open");
            let this = self.clone_handles();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                this.process_one(raw).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    fn clone_handles(&self) -> Self {
        Self {
            store: self.store.clone(),
            dedup: self.dedup.clone(),
            fetcher: self.fetcher.clone(),
            classifier: self.classifier.clone(),
        }
    }

    /// Runs the per-article pipeline described in `spec.md` §4.4. Any step
    /// failure leaves the source record unprocessed for the next poll.
    async fn process_one(&self, raw: RawArticle) {
        debug!(article_id = %raw.article_id, "enriching article");

        let preview = format!("{} {}", raw.title, raw.url);
        let outcome = match self
            .dedup
            .check_and_reserve(&raw.url, &raw.title, &preview, &raw.company, raw.published_at)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!(article_id = %raw.article_id, error = %e, "dedup check failed, leaving unprocessed");
                return;
            }
        };

        match outcome.verdict {
            DedupVerdict::UrlDup => {
                self.mark_processed(&raw.article_id).await;
                return;
            }
            DedupVerdict::ContentDup => {
                self.mark_processed(&raw.article_id).await;
                return;
            }
            DedupVerdict::TitleDup => {
                self.append_to_cluster(&raw, &outcome).await;
                self.mark_processed(&raw.article_id).await;
                return;
            }
            DedupVerdict::New => {}
        }

        let fetched = self.fetcher.fetch(&raw.url).await;
        let quality = classify_quality(fetched.content.len());

        let sentiment_result = match sentiment::analyze(
            self.classifier.as_ref(),
            &fetched.content,
            Some(&raw.title),
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(article_id = %raw.article_id, error = %e, "sentiment classification failed, leaving unprocessed");
                return;
            }
        };

        let article_features =
            features::extract_features(&raw.title, &fetched.content, &sentiment_result, &raw.factor_type);

        let cluster_id = cluster_id(&raw.company, &raw.factor_type, raw.published_at, &raw.title);

        let article = Article {
            article_id: raw.article_id.clone(),
            title: raw.title.clone(),
            original_url: raw.url.clone(),
            canonical_url: fetched.final_url.clone(),
            company_code: raw.company.clone(),
            factor_type: raw.factor_type.clone(),
            published_at: raw.published_at,
            fetched_at: Utc::now(),
            content: fetched.content.clone(),
            content_hash: outcome.content_hash.clone(),
            content_quality: quality,
            publisher_name: fetched.publisher_name.clone(),
            author: fetched.author.clone(),
            publisher_icon: fetched.publisher_icon.clone(),
            sentiment: Some(sentiment_result),
            features: article_features,
            cluster_id: Some(cluster_id.clone()),
            processed: true,
            summarized: false,
        };

        if let Err(e) = self
            .store
            .upsert_one(
                crate::store::mongo::ENRICHED_ARTICLES,
                mongodb::bson::doc! { "article_id": &raw.article_id },
                &article,
            )
            .await
        {
            warn!(article_id = %raw.article_id, error = %e, "enriched article upsert failed, leaving unprocessed");
            return;
        }

        if let Err(e) = self
            .dedup
            .register_article(&raw.title, &raw.company, raw.published_at, &cluster_id)
            .await
        {
            warn!(article_id = %raw.article_id, error = %e, "dedup registration failed");
        }

        self.mark_processed(&raw.article_id).await;
        info!(article_id = %raw.article_id, cluster_id = %cluster_id, "article enriched");
    }

    async fn append_to_cluster(&self, raw: &RawArticle, outcome: &DedupOutcome) {
        let Some(cluster_id) = &outcome.existing_cluster_id else { return };
        let filter = mongodb::bson::doc! { "cluster_id": cluster_id };
        let existing: Option<StoryCluster> = self
            .store
            .find_one(crate::store::mongo::STORY_CLUSTERS, filter.clone())
            .await
            .unwrap_or(None);

        if let Some(mut cluster) = existing {
            cluster.append_publisher(raw.url.clone());
            let _ = self
                .store
                .upsert_one(crate::store::mongo::STORY_CLUSTERS, filter, &cluster)
                .await;
        }
    }

    async fn mark_processed(&self, article_id: &str) {
        let _ = self
            .store
            .update_fields(
                crate::store::mongo::RAW_ARTICLES,
                mongodb::bson::doc! { "article_id": article_id },
                mongodb::bson::doc! { "processed": true },
            )
            .await;
    }
}

fn md5_of_prefix(title: &str) -> u64 {
    use md5::{Digest, Md5};
    let prefix: String = title.chars().take(40).collect();
    let mut hasher = Md5::new();
    hasher.update(prefix.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().unwrap())
}

fn classify_quality(content_len: usize) -> ContentQuality {
    if content_len > 1000 {
        ContentQuality::Good
    } else if content_len > 200 {
        ContentQuality::Fair
    } else {
        ContentQuality::Poor
    }
}

fn cluster_id(company: &str, factor_type: &str, published_at: chrono::DateTime<Utc>, title: &str) -> String {
    format!(
        "cluster_{}_{}_{}_{:x}",
        company,
        factor_type,
        published_at.format("%Y-%m-%d"),
        md5_of_prefix(title)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classify_quality_thresholds() {
        assert_eq!(classify_quality(0), ContentQuality::Poor);
        assert_eq!(classify_quality(200), ContentQuality::Poor);
        assert_eq!(classify_quality(201), ContentQuality::Fair);
        assert_eq!(classify_quality(1000), ContentQuality::Fair);
        assert_eq!(classify_quality(1001), ContentQuality::Good);
    }

    #[test]
    fn md5_of_prefix_is_deterministic_and_title_length_insensitive_past_40_chars() {
        let short = "Acme Corp announces";
        let long_with_same_prefix = format!("{short} but then a long trailing clause that exceeds forty characters");
        assert_eq!(md5_of_prefix(short), md5_of_prefix(short));
        assert_ne!(md5_of_prefix(short), md5_of_prefix(&long_with_same_prefix));
    }

    #[test]
    fn cluster_id_is_stable_for_identical_inputs() {
        let published_at = Utc.with_ymd_and_hms(2026, 7, 20, 9, 30, 0).unwrap();
        let a = cluster_id("RELIANCE", "earnings", published_at, "Reliance beats estimates");
        let b = cluster_id("RELIANCE", "earnings", published_at, "Reliance beats estimates");
        assert_eq!(a, b);
        assert!(a.starts_with("cluster_RELIANCE_earnings_2026-07-20_"));
    }

    #[test]
    fn cluster_id_differs_by_company_and_title() {
        let published_at = Utc.with_ymd_and_hms(2026, 7, 20, 9, 30, 0).unwrap();
        let a = cluster_id("RELIANCE", "earnings", published_at, "Reliance beats estimates");
        let b = cluster_id("TCS", "earnings", published_at, "Reliance beats estimates");
        let c = cluster_id("RELIANCE", "earnings", published_at, "Different headline entirely");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
