use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_APPLICATION_ID: &str = "kafka-streams-filter";

const CLIENT_OVERRIDE_PREFIX: &str = "KAFKA_CLIENT_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("missing required configuration: {0}")]
    Missing(&'static str),
}

/// What happens to a record whose key or value cannot be decoded.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeErrorPolicy {
    /// Log the failure, skip the record and keep consuming.
    #[default]
    LogAndContinue,
    /// Log the failure and stop the pipeline.
    LogAndFail,
}

#[derive(Deserialize)]
struct EnvParams {
    #[serde(default = "default_application_id")]
    application_id: String,
    bootstrap_servers: Option<String>,
    kafka_topic: Option<String>,
    kafka_sasl_enabled: Option<String>,
    sasl_username: Option<String>,
    sasl_password: Option<String>,
    state_dir: Option<String>,
    #[serde(default)]
    deserialization_exception_handler: DecodeErrorPolicy,
}

fn default_application_id() -> String {
    DEFAULT_APPLICATION_ID.to_string()
}

/// Runtime settings, resolved once at startup and passed explicitly to every
/// component that needs them.
#[derive(Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub application_id: String,
    pub bootstrap_servers: String,
    pub topic: String,
    pub sasl_enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub state_dir: PathBuf,
    pub decode_error_policy: DecodeErrorPolicy,
    /// Extra librdkafka properties, applied after everything else.
    pub client_overrides: BTreeMap<String, String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_iter(std::env::vars())
    }

    /// Resolves the configuration from an explicit set of variables.
    ///
    /// Empty values count as missing. With SASL enabled, both credentials are
    /// required.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = vars.into_iter().collect::<Vec<_>>();

        let params = envy::from_iter::<_, EnvParams>(vars.iter().cloned())?;
        let client_overrides = envy::prefixed(CLIENT_OVERRIDE_PREFIX)
            .from_iter::<_, BTreeMap<String, String>>(vars)?
            .into_iter()
            .map(|(key, value)| (key.replace('_', "."), value))
            .collect();

        let bootstrap_servers = required(params.bootstrap_servers, "BOOTSTRAP_SERVERS")?;
        let topic = required(params.kafka_topic, "KAFKA_TOPIC")?;

        // Anything other than a case-insensitive "true" disables SASL.
        let sasl_enabled = params
            .kafka_sasl_enabled
            .map_or(true, |value| value.eq_ignore_ascii_case("true"));

        let (username, password) = if sasl_enabled {
            (
                Some(required(params.sasl_username, "SASL_USERNAME")?),
                Some(required(params.sasl_password, "SASL_PASSWORD")?),
            )
        } else {
            (
                non_empty(params.sasl_username),
                non_empty(params.sasl_password),
            )
        };

        let state_dir = non_empty(params.state_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("kafka-message-filter"));

        Ok(Self {
            application_id: params.application_id,
            bootstrap_servers,
            topic,
            sasl_enabled,
            username,
            password,
            state_dir,
            decode_error_policy: params.deserialization_exception_handler,
            client_overrides,
        })
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("application_id", &self.application_id)
            .field("bootstrap_servers", &self.bootstrap_servers)
            .field("topic", &self.topic)
            .field("sasl_enabled", &self.sasl_enabled)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("state_dir", &self.state_dir)
            .field("decode_error_policy", &self.decode_error_policy)
            .field("client_overrides", &self.client_overrides)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(name))
}
