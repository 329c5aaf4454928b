//! Kafka producer/consumer wrappers, grounded on the Python
//! `services/kafka_service.py`'s `KafkaProducerService`/`KafkaConsumerService`
//! pair. Uses `rdkafka` rather than `confluent_kafka`/`aiokafka` since the
//! pack carries no Rust Kafka example; the producer/consumer split,
//! env-var names, and defaults are kept identical.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::{debug, error, warn};

pub const TOPIC_TRADE_SIGNALS: &str = "trade_signals";
pub const TOPIC_SUMMARIZED_NEWS: &str = "summarized_news";
pub const TOPIC_STOCK_ANALYSIS: &str = "stock_analysis";

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

impl KafkaSettings {
    pub fn from_env() -> Self {
        Self {
            bootstrap_servers: std::env::var("KAFKA_BOOTSTRAP_SERVERS")
                .unwrap_or_else(|_| "localhost:9093".to_string()),
            group_id: std::env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "stocksagent-consumers".to_string()),
            sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
            sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
        }
    }

    fn apply_to(&self, config: &mut ClientConfig) {
        config.set("bootstrap.servers", &self.bootstrap_servers);
        if let (Some(user), Some(pass)) = (&self.sasl_username, &self.sasl_password) {
            config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", user)
                .set("sasl.password", pass);
        }
    }
}

pub struct KafkaProducerService {
    producer: FutureProducer,
}

impl KafkaProducerService {
    pub fn connect(settings: &KafkaSettings) -> anyhow::Result<Self> {
        let mut config = ClientConfig::new();
        settings.apply_to(&mut config);
        let producer: FutureProducer = config.set("message.timeout.ms", "5000").create()?;
        Ok(Self { producer })
    }

    /// Publishes a JSON-serialized payload to `topic`, keyed by `key` so
    /// per-ticker ordering is preserved within a partition.
    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> anyhow::Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        match self.producer.send(record, std::time::Duration::from_secs(5)).await {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "message delivered");
                Ok(())
            }
            Err((e, _)) => {
                error!(topic, error = %e, "kafka send failed");
                Err(e.into())
            }
        }
    }
}

pub struct KafkaConsumerService {
    consumer: StreamConsumer,
}

impl KafkaConsumerService {
    pub fn connect(settings: &KafkaSettings, topics: &[&str]) -> anyhow::Result<Self> {
        let mut config = ClientConfig::new();
        settings.apply_to(&mut config);
        let consumer: StreamConsumer = config
            .set("group.id", &settings.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(topics)?;
        Ok(Self { consumer })
    }

    /// Blocks until one message arrives, returning its `(topic, payload)`.
    /// Malformed (non-UTF8) payloads are logged and skipped rather than
    /// propagated, matching the Python consumer's defensive decode.
    pub async fn recv(&self) -> anyhow::Result<(String, String)> {
        loop {
            let msg = self.consumer.recv().await?;
            let topic = msg.topic().to_string();
            match msg.payload_view::<str>() {
                Some(Ok(payload)) => return Ok((topic, payload.to_string())),
                Some(Err(e)) => {
                    warn!(topic, error = %e, "skipping non-utf8 kafka payload");
                    continue;
                }
                None => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_bootstrap_and_group() {
        std::env::remove_var("KAFKA_BOOTSTRAP_SERVERS");
        std::env::remove_var("KAFKA_GROUP_ID");
        let settings = KafkaSettings::from_env();
        assert_eq!(settings.bootstrap_servers, "localhost:9093");
        assert_eq!(settings.group_id, "stocksagent-consumers");
    }
}
