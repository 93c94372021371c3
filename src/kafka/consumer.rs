use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    ClientConfig, Message,
};

use super::TracingContext;
use crate::{pipeline::RecordSource, record::BrokerRecord};

pub struct KafkaConsumer {
    client: Arc<StreamConsumer<TracingContext>>,
}

impl KafkaConsumer {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = config
            .create_with_context(TracingContext)
            .context("failed to create Kafka consumer")?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl RecordSource for KafkaConsumer {
    async fn subscribe(&self, topic: &str) -> anyhow::Result<()> {
        let client = self.client.clone();
        let topic = topic.to_string();

        tokio::task::spawn_blocking(move || client.subscribe(&[&topic]))
            .await
            .context("background task panicked")??;

        Ok(())
    }

    async fn recv(&self) -> anyhow::Result<BrokerRecord> {
        let message = self
            .client
            .recv()
            .await
            .context("failed to receive message")?;

        Ok(BrokerRecord {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
        })
    }
}
