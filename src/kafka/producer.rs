use std::time::Duration;

use anyhow::Context;
use rdkafka::{
    producer::{FutureProducer, FutureRecord, Producer},
    ClientConfig,
};

use super::TracingContext;

pub struct KafkaProducer {
    client: FutureProducer<TracingContext>,
}

impl KafkaProducer {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let client = config
            .create_with_context(TracingContext)
            .context("failed to create Kafka producer")?;

        Ok(Self { client })
    }

    /// Sends one record and waits for the delivery report. Returns the
    /// partition and offset it landed on.
    pub async fn send(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        payload: &[u8],
    ) -> anyhow::Result<(i32, i64)> {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        let delivery = self
            .client
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(error, _)| error)?;

        Ok(delivery)
    }

    pub fn flush(&self, timeout: Duration) -> anyhow::Result<()> {
        self.client
            .flush(timeout)
            .context("failed to flush pending messages")
    }
}
