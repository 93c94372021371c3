use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded record value: a JSON object.
pub type DecodedMessage = Map<String, Value>;

/// A record as it comes off the broker, detached from the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

impl BrokerRecord {
    pub fn new(topic: impl Into<String>, key: Option<&[u8]>, value: Option<&[u8]>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: key.map(<[u8]>::to_vec),
            value: value.map(<[u8]>::to_vec),
        }
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("record key is not valid UTF-8: {0}")]
    Key(#[from] std::str::Utf8Error),

    #[error("record has no value")]
    MissingValue,

    #[error("record value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record value is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Decodes a record with the pipeline's fixed codecs: the key as a UTF-8
/// string, the value as a JSON object.
///
/// A missing key is fine, a missing value (tombstone) is an error.
pub fn decode(record: &BrokerRecord) -> Result<(Option<String>, DecodedMessage), DecodeError> {
    let key = record
        .key
        .as_deref()
        .map(std::str::from_utf8)
        .transpose()?
        .map(str::to_string);

    let value = record.value.as_deref().ok_or(DecodeError::MissingValue)?;
    let message = match serde_json::from_slice::<Value>(value)? {
        Value::Object(map) => map,
        other => return Err(DecodeError::NotAnObject(json_kind(&other))),
    };

    Ok((key, message))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(..) => "boolean",
        Value::Number(..) => "number",
        Value::String(..) => "string",
        Value::Array(..) => "array",
        Value::Object(..) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_object() {
        let record = BrokerRecord::new(
            "pii",
            Some(b"user-1"),
            Some(br#"{"first_name":"Jo","last_name":"Smith","credit_card":{"number":"4111"}}"#),
        );

        let (key, message) = decode(&record).unwrap();
        assert_eq!(key.as_deref(), Some("user-1"));
        assert_eq!(message["first_name"], json!("Jo"));
        assert_eq!(message["credit_card"]["number"], json!("4111"));
    }

    #[test]
    fn test_decode_without_key() {
        let record = BrokerRecord::new("pii", None, Some(b"{}"));

        let (key, message) = decode(&record).unwrap();
        assert_eq!(key, None);
        assert!(message.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let record = BrokerRecord::new("pii", None, Some(b"{\"first_name\":"));
        assert!(matches!(decode(&record), Err(DecodeError::Json(..))));
    }

    #[test]
    fn test_not_an_object() {
        let record = BrokerRecord::new("pii", None, Some(b"[1, 2]"));
        assert!(matches!(
            decode(&record),
            Err(DecodeError::NotAnObject("array"))
        ));
    }

    #[test]
    fn test_tombstone() {
        let record = BrokerRecord::new("pii", Some(b"user-1"), None);
        assert!(matches!(decode(&record), Err(DecodeError::MissingValue)));
    }

    #[test]
    fn test_invalid_key() {
        let record = BrokerRecord::new("pii", Some(&[0xff, 0xfe]), Some(b"{}"));
        assert!(matches!(decode(&record), Err(DecodeError::Key(..))));
    }
}
