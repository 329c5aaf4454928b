//! Environment-driven configuration, gathered once at startup into a single
//! `Settings` value and threaded through `Runtime` rather than re-read with
//! scattered `env::var` calls.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub redis_url: String,
    pub kafka_bootstrap_servers: String,
    pub kafka_group_id: String,
    pub llm_api_key: String,
    pub decision_llm_api_key: String,
    pub sentiment_endpoint_url: String,
    pub bloom_filter_path: String,
    pub snapshot_dir: String,
    pub live_mode: bool,
    pub max_concurrent_fetches: usize,
    pub rate_limit_rpm: usize,
    pub max_concurrent_agents: usize,
    pub thread_pool_size: usize,
}

impl Settings {
    /// Loads configuration from the process environment, applying `.env` if
    /// present. Missing non-optional credentials are a fatal startup error,
    /// per the error-handling taxonomy (fatal init errors exit non-zero).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            mongo_uri: env::var("MONGO_URI").context("MONGO_URI not set")?,
            mongo_db_name: env_or("MONGO_DB_NAME", "marketpulse"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            kafka_bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9093"),
            kafka_group_id: env_or("KAFKA_GROUP_ID", "stocksagent-consumers"),
            llm_api_key: env::var("LLM_API_KEY").context("LLM_API_KEY not set")?,
            decision_llm_api_key: env_or("DECISION_LLM_API_KEY", ""),
            sentiment_endpoint_url: env_or(
                "SENTIMENT_ENDPOINT_URL",
                "http://localhost:8000/sentiment",
            ),
            bloom_filter_path: env_or("BLOOM_FILTER_PATH", "./data/url_bloom_filter.bin"),
            snapshot_dir: env_or("SNAPSHOT_DIR", "./data/snapshots"),
            live_mode: env_or("LIVE_MODE", "false") == "true",
            max_concurrent_fetches: env_usize("MAX_CONCURRENT_FETCHES", 20),
            rate_limit_rpm: env_usize("RATE_LIMIT_RPM", 60),
            max_concurrent_agents: env_usize("MAX_CONCURRENT", 3),
            thread_pool_size: env_usize("THREAD_POOL_SIZE", 5),
        })
    }

    pub fn request_spacing(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.rate_limit_rpm.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_spacing_at_60_rpm_is_one_second() {
        let settings = Settings {
            mongo_uri: String::new(),
            mongo_db_name: String::new(),
            redis_url: String::new(),
            kafka_bootstrap_servers: String::new(),
            kafka_group_id: String::new(),
            llm_api_key: String::new(),
            decision_llm_api_key: String::new(),
            sentiment_endpoint_url: String::new(),
            bloom_filter_path: String::new(),
            snapshot_dir: String::new(),
            live_mode: false,
            max_concurrent_fetches: 20,
            rate_limit_rpm: 60,
            max_concurrent_agents: 3,
            thread_pool_size: 5,
        };
        assert_eq!(settings.request_spacing(), Duration::from_secs(1));
    }
}
