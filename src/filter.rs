use std::borrow::Cow;

use serde_json::Value;

use crate::{configuration::RuntimeConfig, record::DecodedMessage};

/// Keeps messages whose `first_name` and `last_name`, glued together, equal
/// the configured username.
#[derive(Debug, Clone)]
pub struct UsernameFilter {
    username: Option<String>,
}

impl UsernameFilter {
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.username.clone())
    }

    /// The key is ignored for now.
    pub fn matches(&self, _key: Option<&str>, message: &DecodedMessage) -> bool {
        let Some(username) = self.username.as_deref() else {
            return false;
        };

        identity(message) == username
    }
}

/// `first_name` followed by `last_name`, no separator.
pub fn identity(message: &DecodedMessage) -> String {
    let mut identity = field_text(message.get("first_name")).into_owned();
    identity.push_str(&field_text(message.get("last_name")));
    identity
}

fn field_text(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(text)) => Cow::Borrowed(text),
        Some(other) => Cow::Owned(other.to_string()),
    }
}
