use std::collections::BTreeMap;

use rdkafka::ClientConfig;

use crate::configuration::{DecodeErrorPolicy, RuntimeConfig};

const SECURITY_PROTOCOL_SASL_PLAINTEXT: &str = "SASL_PLAINTEXT";
const SASL_MECHANISM_PLAIN: &str = "PLAIN";
const REDACTED: &str = "<redacted>";

/// Everything the consumer side of the pipeline needs to talk to the broker
/// and make sense of what it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub properties: BTreeMap<String, String>,
    pub decode_error_policy: DecodeErrorPolicy,
}

impl ConnectionConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::from_iter(self.properties.clone())
    }

    /// Properties safe to print, with the SASL password masked.
    pub fn redacted_properties(&self) -> BTreeMap<&str, &str> {
        redact(&self.properties)
    }
}

/// Builds the consumer configuration. Pure, touches nothing outside its input.
pub fn build_config(config: &RuntimeConfig) -> ConnectionConfig {
    let mut properties = BTreeMap::from([
        ("bootstrap.servers".to_string(), config.bootstrap_servers.clone()),
        ("group.id".to_string(), config.application_id.clone()),
        ("client.id".to_string(), config.application_id.clone()),
        ("enable.partition.eof".to_string(), "false".to_string()),
        ("enable.auto.commit".to_string(), "true".to_string()),
        ("auto.offset.reset".to_string(), "earliest".to_string()),
    ]);

    apply_security(&mut properties, config);
    apply_overrides(&mut properties, config);

    ConnectionConfig {
        properties,
        decode_error_policy: config.decode_error_policy,
    }
}

/// Builds producer properties sharing the broker address and security
/// settings of the consumer.
pub fn producer_properties(config: &RuntimeConfig, client_id: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::from([
        ("bootstrap.servers".to_string(), config.bootstrap_servers.clone()),
        ("client.id".to_string(), client_id.to_string()),
    ]);

    apply_security(&mut properties, config);
    apply_overrides(&mut properties, config);

    properties
}

pub fn redact(properties: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    properties
        .iter()
        .map(|(key, value)| {
            let value = if key == "sasl.password" {
                REDACTED
            } else {
                value.as_str()
            };
            (key.as_str(), value)
        })
        .collect()
}

// Credentials go in verbatim, librdkafka takes them as plain properties so
// there is no login directive to escape.
fn apply_security(properties: &mut BTreeMap<String, String>, config: &RuntimeConfig) {
    if !config.sasl_enabled {
        return;
    }

    properties.insert(
        "security.protocol".to_string(),
        SECURITY_PROTOCOL_SASL_PLAINTEXT.to_string(),
    );
    properties.insert(
        "sasl.mechanism".to_string(),
        SASL_MECHANISM_PLAIN.to_string(),
    );
    properties.insert(
        "sasl.username".to_string(),
        config.username.clone().unwrap_or_default(),
    );
    properties.insert(
        "sasl.password".to_string(),
        config.password.clone().unwrap_or_default(),
    );
}

fn apply_overrides(properties: &mut BTreeMap<String, String>, config: &RuntimeConfig) {
    for (key, value) in &config.client_overrides {
        properties.insert(key.clone(), value.clone());
    }
}
