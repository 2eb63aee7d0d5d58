//! Error types for the contacts client.
//!
//! # Design
//! Non-2xx responses are classified once, at the mapper boundary, into
//! `ServerError::Parsed` (the server sent its `{message, errors?}` JSON) or
//! `ServerError::Unparsed` (anything else). The `Display` output of
//! `ApiError` is the human-readable text the store surfaces as its error.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use serde_json::Value;
use thiserror::Error;

/// Field name to validation messages, as returned under `errors`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Errors returned by the transport client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connectivity failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("{0}")]
    Server(ServerError),

    /// A 2xx body could not be decoded into the expected type.
    #[error("unexpected response: {0}")]
    Deserialization(String),

    /// A staged upload could not be read while encoding the request.
    #[error("upload failed: {0}")]
    Upload(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server(err) => Some(err.status()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// A non-2xx response, parsed best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    Parsed {
        status: u16,
        message: String,
        field_errors: Option<FieldErrors>,
    },
    Unparsed {
        status: u16,
        body: String,
    },
}

impl ServerError {
    /// Classify an error body. A JSON object with a string `message` or an
    /// `errors` object is `Parsed`; everything else is kept raw.
    pub fn from_body(status: u16, body: &str) -> Self {
        let unparsed = || ServerError::Unparsed {
            status,
            body: body.to_string(),
        };
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) else {
            return unparsed();
        };
        let message = object.get("message").and_then(Value::as_str);
        let field_errors = object
            .get("errors")
            .and_then(Value::as_object)
            .map(|errors| {
                errors
                    .iter()
                    .map(|(field, value)| (field.clone(), messages_of(value)))
                    .collect::<FieldErrors>()
            });
        if message.is_none() && field_errors.is_none() {
            return unparsed();
        }
        ServerError::Parsed {
            status,
            message: message.unwrap_or("unknown error").to_string(),
            field_errors,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ServerError::Parsed { status, .. } | ServerError::Unparsed { status, .. } => *status,
        }
    }
}

/// Laravel sends a list of strings per field; accept a bare string too.
fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Parsed {
                message,
                field_errors,
                ..
            } => {
                write!(f, "{message}")?;
                let Some(fields) = field_errors.as_ref().filter(|fields| !fields.is_empty()) else {
                    return Ok(());
                };
                let rendered = fields
                    .iter()
                    .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, ": {rendered}")
            }
            ServerError::Unparsed { status, body } => {
                write!(f, "request failed with status {status}: {body}")
            }
        }
    }
}

impl std::error::Error for ServerError {}

/// Failure while copying a picked image into a temporary file.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("could not open image source: {0}")]
    Open(#[source] io::Error),

    #[error("could not create temporary file: {0}")]
    Create(#[source] io::Error),

    #[error("image copy interrupted: {0}")]
    Copy(#[source] io::Error),

    #[error("staging task failed: {0}")]
    Task(String),
}

/// Failure while loading or applying client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid configuration value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("could not read configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_message_passes_through_exactly() {
        let err = ApiError::Server(ServerError::from_body(500, r#"{"message":"X"}"#));
        assert_eq!(err.to_string(), "X");
    }

    #[test]
    fn field_errors_are_rendered_after_message() {
        let err = ServerError::from_body(
            422,
            r#"{"message":"Validation failed","errors":{"name":["too short"],"email":["invalid","taken"]}}"#,
        );
        assert_eq!(
            err.to_string(),
            "Validation failed: email: invalid, taken; name: too short"
        );
    }

    #[test]
    fn errors_without_message_use_default() {
        let err = ServerError::from_body(422, r#"{"errors":{"phone":"bad"}}"#);
        match &err {
            ServerError::Parsed {
                message,
                field_errors,
                ..
            } => {
                assert_eq!(message, "unknown error");
                assert_eq!(field_errors.as_ref().unwrap()["phone"], vec!["bad".to_string()]);
            }
            other => panic!("expected Parsed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_unparsed() {
        let err = ServerError::from_body(502, "<html>Bad Gateway</html>");
        assert_eq!(
            err,
            ServerError::Unparsed {
                status: 502,
                body: "<html>Bad Gateway</html>".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "request failed with status 502: <html>Bad Gateway</html>"
        );
    }

    #[test]
    fn json_without_known_keys_is_unparsed() {
        let err = ServerError::from_body(500, r#"{"exception":"boom"}"#);
        assert!(matches!(err, ServerError::Unparsed { status: 500, .. }));
    }

    #[test]
    fn network_error_template() {
        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn not_found_is_detected_from_status() {
        let err = ApiError::Server(ServerError::from_body(404, ""));
        assert!(err.is_not_found());
        assert!(!ApiError::Network("x".to_string()).is_not_found());
    }
}
