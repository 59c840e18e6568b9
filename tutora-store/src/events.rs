use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use tutora_shared::models::events::NotificationPayload;

pub const NOTIFICATIONS_TOPIC: &str = "notifications.dispatch";

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Published to {} (key {}): partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to publish to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    pub async fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        event: &T,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        self.publish(topic, key, &payload).await?;
        Ok(())
    }

    /// Hand a structured notification to the external dispatcher. Callers
    /// treat this as fire-and-forget: a failed publish is logged and never
    /// rolls back the entitlement mutation that already landed.
    pub async fn publish_notification(
        &self,
        notification: &NotificationPayload,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = notification
            .recipients
            .first()
            .map(String::as_str)
            .unwrap_or("broadcast");
        self.publish_json(NOTIFICATIONS_TOPIC, key, notification)
            .await
    }
}
