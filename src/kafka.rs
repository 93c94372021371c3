mod connection;
mod consumer;
mod context;
mod producer;

pub use connection::{build_config, producer_properties, redact, ConnectionConfig};
pub use consumer::KafkaConsumer;
pub use context::TracingContext;
pub use producer::KafkaProducer;
