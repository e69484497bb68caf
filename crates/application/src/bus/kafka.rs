use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::error::PublishError;
use crate::ports::EventBus;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka producer for integration events. Messages are keyed by order id so
/// one order's changes land on one partition.
pub struct KafkaEventBus {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventBus {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventBus for KafkaEventBus {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);

        match self.producer.send(record, Timeout::After(SEND_TIMEOUT)).await {
            Ok(_) => {
                tracing::debug!(topic = %self.topic, key, "published to kafka");
                Ok(())
            }
            Err((e, _)) => {
                tracing::error!(topic = %self.topic, key, error = %e, "kafka send failed");
                Err(PublishError::Bus(e.to_string()))
            }
        }
    }
}
