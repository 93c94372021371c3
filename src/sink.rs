use tracing::{debug, warn};

use crate::record::DecodedMessage;

/// Where matched messages end up.
pub trait Sink: Send + Sync {
    /// Best effort, must not fail the pipeline.
    fn emit(&self, key: Option<&str>, message: &DecodedMessage);
}

/// Writes every matched message as JSON to a debug-level log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Sink for LogSink {
    fn emit(&self, key: Option<&str>, message: &DecodedMessage) {
        match serde_json::to_string(message) {
            Ok(json) => debug!(key = ?key, message = %json, "Message"),
            Err(error) => warn!(key = ?key, %error, "Failed to serialize matched message"),
        }
    }
}
