//! Multi-layer deduplication: bloom pre-check, URL hash, content hash,
//! fuzzy title matching. Transliterated from the Python `DeduplicationManager`.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use strsim::normalized_levenshtein;

use crate::store::{BloomStore, KvStore};

/// Max titles to scan for fuzzy matching per company/day.
const MAX_FUZZY_SCAN: isize = 200;
/// Levenshtein similarity threshold.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    New,
    UrlDup,
    ContentDup,
    TitleDup,
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub verdict: DedupVerdict,
    pub url_hash: String,
    pub content_hash: String,
    pub existing_cluster_id: Option<String>,
}

pub struct DedupStore {
    kv: KvStore,
    bloom: BloomStore,
}

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
    "source",
    "fbclid",
    "gclid",
    "cid",
    "soc_src",
    "src",
    "ig_cid",
];

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercases the host, strips tracking params/fragment, trims a trailing
/// slash from the path.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };

    let scheme = if parsed.scheme().is_empty() {
        "https"
    } else {
        parsed.scheme()
    };
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let path = parsed.path().trim_end_matches('/');

    let filtered: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut normalized = format!("{scheme}://{host}{path}");
    if !filtered.is_empty() {
        let query = filtered
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        normalized.push('?');
        normalized.push_str(&query);
    }
    normalized
}

pub fn compute_url_hash(url: &str) -> String {
    md5_hex(&normalize_url(url))
}

/// MD5 of the first 1000 chars; empty string (meaning "skip") if content is
/// shorter than 100 chars.
pub fn compute_content_hash(content: &str) -> String {
    if content.chars().count() < 100 {
        return String::new();
    }
    let prefix: String = content.chars().take(1000).collect();
    md5_hex(&prefix)
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            if c.is_whitespace() {
                if !last_was_space {
                    normalized.push(' ');
                }
                last_was_space = true;
            } else {
                normalized.push(c);
                last_was_space = false;
            }
        } else if !last_was_space {
            normalized.push(' ');
            last_was_space = true;
        }
    }
    normalized.trim().to_string()
}

impl DedupStore {
    pub fn new(kv: KvStore, bloom: BloomStore) -> Self {
        Self { kv, bloom }
    }

    async fn is_url_duplicate(&self, url: &str) -> anyhow::Result<(bool, String)> {
        let url_hash = compute_url_hash(url);

        // Bloom is the fast path: a negative is definitive; a positive
        // falls through to the exact KV/registry layer.
        if !self.bloom.check(&url_hash) {
            self.bloom.insert(&url_hash);
            let key = format!("url:{url_hash}");
            self.kv.exists_or_reserve(&key).await?;
            return Ok((false, url_hash));
        }

        let key = format!("url:{url_hash}");
        let duplicate = self.kv.exists_or_reserve(&key).await?;
        if !duplicate {
            self.bloom.insert(&url_hash);
        }
        Ok((duplicate, url_hash))
    }

    async fn is_content_duplicate(&self, content: &str) -> anyhow::Result<(bool, String)> {
        let content_hash = compute_content_hash(content);
        if content_hash.is_empty() {
            return Ok((false, content_hash));
        }
        let key = format!("content:{content_hash}");
        let duplicate = self.kv.exists_or_reserve(&key).await?;
        Ok((duplicate, content_hash))
    }

    async fn is_title_duplicate(
        &self,
        title: &str,
        company: &str,
        published_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<String>> {
        let normalized = normalize_title(title);
        if normalized.len() < 10 {
            return Ok(None);
        }

        let day = published_at.format("%Y-%m-%d").to_string();
        let key = format!("titles:{company}:{day}");
        let recent = self.kv.zrange(&key, MAX_FUZZY_SCAN).await?;

        for stored in recent {
            let Some((stored_title, cluster_id)) = stored.rsplit_once('|') else {
                continue;
            };
            let similarity = normalized_levenshtein(&normalized, stored_title);
            if similarity >= TITLE_SIMILARITY_THRESHOLD {
                return Ok(Some(cluster_id.to_string()));
            }
        }
        Ok(None)
    }

    pub async fn add_title(
        &self,
        title: &str,
        company: &str,
        published_at: DateTime<Utc>,
        cluster_id: &str,
    ) -> anyhow::Result<()> {
        let normalized = normalize_title(title);
        if normalized.len() < 10 {
            return Ok(());
        }
        let day = published_at.format("%Y-%m-%d").to_string();
        let key = format!("titles:{company}:{day}");
        let member = format!("{normalized}|{cluster_id}");
        self.kv.zadd(&key, &member, Utc::now().timestamp() as f64).await
    }

    /// Runs all three dedup layers in order, reserving keys as it goes.
    pub async fn check_and_reserve(
        &self,
        url: &str,
        title: &str,
        content: &str,
        company: &str,
        published_at: DateTime<Utc>,
    ) -> anyhow::Result<DedupOutcome> {
        let (url_dup, url_hash) = self.is_url_duplicate(url).await?;
        if url_dup {
            return Ok(DedupOutcome {
                verdict: DedupVerdict::UrlDup,
                url_hash,
                content_hash: String::new(),
                existing_cluster_id: None,
            });
        }

        let mut content_hash = String::new();
        if content.chars().count() >= 100 {
            let (content_dup, hash) = self.is_content_duplicate(content).await?;
            content_hash = hash;
            if content_dup {
                return Ok(DedupOutcome {
                    verdict: DedupVerdict::ContentDup,
                    url_hash,
                    content_hash,
                    existing_cluster_id: None,
                });
            }
        }

        if let Some(cluster_id) = self.is_title_duplicate(title, company, published_at).await? {
            return Ok(DedupOutcome {
                verdict: DedupVerdict::TitleDup,
                url_hash,
                content_hash,
                existing_cluster_id: Some(cluster_id),
            });
        }

        Ok(DedupOutcome {
            verdict: DedupVerdict::New,
            url_hash,
            content_hash,
            existing_cluster_id: None,
        })
    }

    /// Registers a newly-ingested, non-duplicate article's title in the
    /// fuzzy index. URL/content hashes self-register during the check.
    pub async fn register_article(
        &self,
        title: &str,
        company: &str,
        published_at: DateTime<Utc>,
        cluster_id: &str,
    ) -> anyhow::Result<()> {
        self.add_title(title, company, published_at, cluster_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_strips_tracking_params() {
        let a = normalize_url("https://x.com/a?utm_source=twitter");
        let b = normalize_url("https://x.com/a?utm_source=fb");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_url_lowercases_host_and_trims_trailing_slash() {
        let a = normalize_url("https://Example.COM/path/");
        assert_eq!(a, "https://example.com/path");
    }

    #[test]
    fn content_hash_empty_below_100_chars() {
        assert_eq!(compute_content_hash("too short"), "");
    }

    #[test]
    fn content_hash_hashes_first_1000_chars() {
        let content = "a".repeat(2000);
        let hash = compute_content_hash(&content);
        assert!(!hash.is_empty());
        assert_eq!(hash, compute_content_hash(&"a".repeat(1000)));
    }

    #[test]
    fn normalize_title_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            normalize_title("Reliance Profit Jumps 12% in Q2 Results"),
            "reliance profit jumps 12 in q2 results"
        );
    }

    #[test]
    fn fuzzy_title_match_scenario() {
        let stored = "reliance profit jumps 12 percent in q2";
        let incoming = normalize_title("Reliance Profit Jumps 12% in Q2 Results");
        let similarity = normalized_levenshtein(&incoming, stored);
        assert!(
            similarity >= TITLE_SIMILARITY_THRESHOLD,
            "similarity {similarity} below threshold"
        );
    }
}
