use rdkafka::{
    client::ClientContext,
    config::RDKafkaLogLevel,
    consumer::{ConsumerContext, Rebalance},
    error::{KafkaError, KafkaResult},
    TopicPartitionList,
};
use tracing::{debug, error, info, warn};

/// Routes librdkafka's own logging, errors and rebalance notifications to
/// `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingContext;

impl ClientContext for TracingContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => error!(target: "librdkafka", fac, "{log_message}"),
            RDKafkaLogLevel::Warning => warn!(target: "librdkafka", fac, "{log_message}"),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                info!(target: "librdkafka", fac, "{log_message}")
            }
            RDKafkaLogLevel::Debug => debug!(target: "librdkafka", fac, "{log_message}"),
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        error!(target: "librdkafka", %error, reason, "Kafka client error");
    }
}

impl ConsumerContext for TracingContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                info!(partitions = %describe(partitions), "Partitions being assigned")
            }
            Rebalance::Revoke(partitions) => {
                info!(partitions = %describe(partitions), "Partitions being revoked")
            }
            Rebalance::Error(error) => warn!(%error, "Rebalance failed"),
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        if let Err(error) = result {
            warn!(%error, "Failed to commit offsets");
        }
    }
}

fn describe(partitions: &TopicPartitionList) -> String {
    partitions
        .elements()
        .iter()
        .map(|element| format!("{}[{}]", element.topic(), element.partition()))
        .collect::<Vec<_>>()
        .join(", ")
}
