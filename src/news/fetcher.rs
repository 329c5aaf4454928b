//! Three-tier article fetching: aggregator-URL decode, static HTTP fetch,
//! headless-browser fallback. Transliterated from the Python `fetcher.py`,
//! with the headless-browser tier modeled only as a trait (out of scope per
//! `spec.md` §1).

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

pub const MAX_CONTENT_LENGTH: usize = 5000;
pub const MIN_CONTENT_LENGTH_FOR_STATIC_FETCH: usize = 200;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
pub const MAX_CONCURRENT_FETCHES: usize = 20;
pub const MAX_PER_HOST: usize = 5;
pub const DNS_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, Default)]
pub struct FetchedArticle {
    pub content: String,
    pub final_url: String,
    pub publisher_name: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub publisher_icon: Option<String>,
}

/// Resolves opaque aggregator redirect URLs (e.g. Google News) to a
/// canonical article URL. No bundled implementation decodes real
/// aggregator payloads; the default passes the URL through unchanged.
pub trait UrlDecoder: Send + Sync {
    fn is_aggregator(&self, url: &str) -> bool;
    fn decode(&self, url: &str) -> Option<String>;
}

pub struct PassthroughDecoder;

impl UrlDecoder for PassthroughDecoder {
    fn is_aggregator(&self, url: &str) -> bool {
        url.contains("news.google.com")
    }

    fn decode(&self, _url: &str) -> Option<String> {
        None
    }
}

/// The headless-browser fallback tier. Explicitly out of scope
/// (`spec.md` §1); callers without a real implementation get `None`.
#[async_trait]
pub trait HeadlessFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<FetchedArticle>;
}

pub struct NoHeadlessFetch;

#[async_trait]
impl HeadlessFetch for NoHeadlessFetch {
    async fn fetch(&self, _url: &str) -> Option<FetchedArticle> {
        None
    }
}

pub struct ArticleFetcher {
    client: reqwest::Client,
    decoder: Box<dyn UrlDecoder>,
    headless: Box<dyn HeadlessFetch>,
}

impl ArticleFetcher {
    pub fn new(decoder: Box<dyn UrlDecoder>, headless: Box<dyn HeadlessFetch>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_PER_HOST)
            .user_agent("Mozilla/5.0 (compatible; marketpulse/0.1)")
            .build()?;
        Ok(Self { client, decoder, headless })
    }

    /// Runs the full 3-tier policy for `url`. Never throws to the caller;
    /// an empty `content` is a valid outcome.
    pub async fn fetch(&self, url: &str) -> FetchedArticle {
        let canonical = if self.decoder.is_aggregator(url) {
            self.decoder.decode(url).unwrap_or_else(|| url.to_string())
        } else {
            url.to_string()
        };

        let mut article = self.fetch_static(&canonical).await.unwrap_or_default();
        if article.content.chars().count() < MIN_CONTENT_LENGTH_FOR_STATIC_FETCH {
            debug!("static fetch insufficient for {}, trying headless", canonical);
            if let Some(rendered) = self.headless.fetch(&canonical).await {
                article = rendered;
            }
        }
        article.content = clean_content(&article.content);
        article
    }

    async fn fetch_static(&self, url: &str) -> Option<FetchedArticle> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("static fetch failed for {}: {}", url, e);
                return None;
            }
        };
        let final_url = response.url().to_string();
        let body = response.text().await.ok()?;
        let document = Html::parse_document(&body);

        Some(FetchedArticle {
            content: extract_body(&document),
            final_url,
            publisher_name: extract_meta(&document, "og:site_name"),
            author: extract_meta(&document, "author"),
            published_date: extract_meta(&document, "article:published_time"),
            publisher_icon: extract_meta(&document, "og:image"),
        })
    }
}

fn extract_meta(document: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(
        "meta[property='{property}'], meta[name='{property}']"
    ))
    .ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

/// Priority-ordered body selectors, falling back to all `<p>` text.
fn extract_body(document: &Html) -> String {
    const SELECTORS: &[&str] = &["article", "[itemprop='articleBody']", "main", "body"];

    for selector_str in SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                let text: String = el.text().collect::<Vec<_>>().join(" ");
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

/// Whitespace-normalizes, strips URLs, clamps to `MAX_CONTENT_LENGTH`.
fn clean_content(raw: &str) -> String {
    let no_urls: String = raw
        .split_whitespace()
        .filter(|tok| !tok.starts_with("http://") && !tok.starts_with("https://"))
        .collect::<Vec<_>>()
        .join(" ");
    no_urls.chars().take(MAX_CONTENT_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_content_strips_urls_and_clamps_length() {
        let raw = format!("see https://example.com/x for more {}", "a".repeat(6000));
        let cleaned = clean_content(&raw);
        assert!(!cleaned.contains("http"));
        assert!(cleaned.chars().count() <= MAX_CONTENT_LENGTH);
    }

    #[test]
    fn passthrough_decoder_detects_google_news_host() {
        let decoder = PassthroughDecoder;
        assert!(decoder.is_aggregator("https://news.google.com/rss/articles/xyz"));
        assert!(!decoder.is_aggregator("https://reuters.com/article/xyz"));
    }
}
