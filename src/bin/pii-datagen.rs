use std::time::Duration;

use anyhow::Context;
use kafka_message_filter::{
    configuration::RuntimeConfig,
    datagen,
    kafka::{self, KafkaProducer},
    shutdown, telemetry,
};
use rdkafka::ClientConfig;
use tracing::{error, info};

const CLIENT_ID: &str = "pii_data_generator";
const SEND_INTERVAL: Duration = Duration::from_secs(2);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let config = RuntimeConfig::from_env().context(
        "please configure BOOTSTRAP_SERVERS, KAFKA_TOPIC, SASL_USERNAME and SASL_PASSWORD",
    )?;
    let properties = kafka::producer_properties(&config, CLIENT_ID);
    let producer = KafkaProducer::new(&ClientConfig::from_iter(properties))
        .context("failed to build Kafka producer")?;

    let shutdown = shutdown::signal();
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(SEND_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let record = datagen::generate(&mut rand::thread_rng());
                let payload = serde_json::to_vec(&record).context("failed to serialize record")?;

                match producer.send(&config.topic, None, &payload).await {
                    Ok((partition, offset)) => {
                        info!(topic = %config.topic, partition, offset, "Message produced")
                    }
                    Err(error) => {
                        error!(topic = %config.topic, error = ?error, "Failed to deliver message")
                    }
                }
            }
        }
    }

    info!("Closing Kafka producer");
    producer.flush(FLUSH_TIMEOUT)
}
