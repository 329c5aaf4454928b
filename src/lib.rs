//! Root crate wiring. Per the design note against global module state
//! (producer handle, bloom filter, LLM client), every shared dependency is
//! constructed once into a `Runtime` and threaded through explicitly rather
//! than reached for via singletons.

pub mod agents;
pub mod config;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod messaging;
pub mod news;
pub mod pipeline;
pub mod portfolio;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Result;

use config::Settings;
use messaging::{KafkaProducerService, KafkaSettings};
use news::summarizer::{LlmClient, RigLlmClient};
use store::{BloomStore, KvStore, MongoStore};

/// Every shared dependency an entry point needs, constructed once at
/// startup and cloned cheaply (everything inside is an `Arc` or `Clone`
/// connection handle).
pub struct Runtime {
    pub settings: Settings,
    pub mongo: Arc<MongoStore>,
    pub kv: Arc<KvStore>,
    pub bloom: Arc<BloomStore>,
    pub kafka_producer: Arc<KafkaProducerService>,
    pub llm: Arc<dyn LlmClient>,
    pub decision_llm: Arc<dyn LlmClient>,
}

impl Runtime {
    pub async fn bootstrap(settings: Settings) -> Result<Self> {
        let mongo = Arc::new(MongoStore::new(&settings.mongo_uri, &settings.mongo_db_name).await?);
        mongo.initialize_indexes().await?;

        let kv = Arc::new(KvStore::new(&settings.redis_url)?);
        let bloom = Arc::new(BloomStore::load_or_create(&settings.bloom_filter_path));

        let kafka_settings = KafkaSettings::from_env();
        let kafka_producer = Arc::new(KafkaProducerService::connect(&kafka_settings)?);

        let llm: Arc<dyn LlmClient> = Arc::new(RigLlmClient::new(&settings.llm_api_key, "gpt-4o-mini"));
        let decision_api_key = if settings.decision_llm_api_key.is_empty() { &settings.llm_api_key } else { &settings.decision_llm_api_key };
        let decision_llm: Arc<dyn LlmClient> = Arc::new(RigLlmClient::new(decision_api_key, "gpt-4o"));

        Ok(Self { settings, mongo, kv, bloom, kafka_producer, llm, decision_llm })
    }
}
