//! Raw failure values as handed to the classifier.

use serde_json::{json, Map, Value as JsonValue};

use crate::{ClassifiedError, GatewayError};

/// Upper bound on how many `source()` links are captured from an error chain.
const MAX_SOURCE_CHAIN: usize = 8;

/// An arbitrary failure value produced by a wallet or contract call.
///
/// Provider errors come in many shapes (numeric or string `code`, nested
/// `cause`, plain strings), so anything that is not already classified is
/// carried as untyped JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum RawError {
    Classified(ClassifiedError),
    Value(JsonValue),
}

impl RawError {
    /// Captures a Rust error and its `source()` chain as nested `cause`
    /// objects.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut messages = vec![err.to_string()];
        let mut source = err.source();
        while let Some(inner) = source {
            if messages.len() >= MAX_SOURCE_CHAIN {
                break;
            }
            messages.push(inner.to_string());
            source = inner.source();
        }

        let value = messages
            .into_iter()
            .rev()
            .fold(None::<JsonValue>, |cause, message| {
                let mut object = Map::new();
                object.insert("message".to_owned(), JsonValue::String(message));
                if let Some(cause) = cause {
                    object.insert("cause".to_owned(), cause);
                }
                Some(JsonValue::Object(object))
            })
            .unwrap_or(JsonValue::Null);
        Self::Value(value)
    }

    /// JSON view of the failure, as it would be recorded for diagnostics.
    pub fn to_json(&self) -> JsonValue {
        match self {
            RawError::Classified(err) => serde_json::to_value(err).unwrap_or(JsonValue::Null),
            RawError::Value(value) => value.clone(),
        }
    }
}

impl From<JsonValue> for RawError {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for RawError {
    fn from(value: &str) -> Self {
        Self::Value(JsonValue::String(value.to_owned()))
    }
}

impl From<String> for RawError {
    fn from(value: String) -> Self {
        Self::Value(JsonValue::String(value))
    }
}

impl From<ClassifiedError> for RawError {
    fn from(value: ClassifiedError) -> Self {
        Self::Classified(value)
    }
}

impl From<&GatewayError> for RawError {
    fn from(err: &GatewayError) -> Self {
        let message = err.to_string();
        let value = match err {
            GatewayError::Transport(inner) if inner.is_timeout() => {
                json!({ "code": "TIMEOUT", "message": message })
            }
            GatewayError::Transport(inner) if is_network_failure(inner) => {
                json!({ "code": "NETWORK_ERROR", "message": message })
            }
            GatewayError::Transport(_) => json!({ "message": message }),
            GatewayError::Http { status, body } => match *status {
                // Node credentials, not a wallet permission: keep the
                // status text away from the access-denied rule.
                401 | 403 => json!({ "code": status, "status": status }),
                408 => json!({ "code": "TIMEOUT", "message": message }),
                502..=504 => json!({ "code": "NETWORK_ERROR", "status": status, "message": message }),
                _ => json!({ "code": status, "message": message, "body": body }),
            },
            GatewayError::Rpc {
                code,
                message: rpc_message,
                data,
            } => json!({ "code": code, "message": rpc_message, "data": data }),
            GatewayError::Decode(_) | GatewayError::InvalidAddress(_) => {
                json!({ "message": message })
            }
            GatewayError::Reverted {
                tx_hash,
                block_number,
            } => json!({
                "code": "CALL_EXCEPTION",
                "message": message,
                "transactionHash": tx_hash,
                "blockNumber": block_number,
            }),
            GatewayError::Timeout { .. } => json!({ "code": "TIMEOUT", "message": message }),
        };
        Self::Value(value)
    }
}

impl From<GatewayError> for RawError {
    fn from(err: GatewayError) -> Self {
        Self::from(&err)
    }
}

fn is_network_failure(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_request() || err.is_body()
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use serde_json::json;

    use super::RawError;
    use crate::{ErrorKind, GatewayError};

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("claim failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    impl std::error::Error for Inner {}

    #[test]
    fn error_chain_becomes_nested_causes() {
        let raw = RawError::from_error(&Outer(Inner));
        assert_eq!(
            raw,
            RawError::Value(json!({
                "message": "claim failed",
                "cause": { "message": "connection refused" }
            }))
        );
    }

    #[test]
    fn rpc_error_keeps_its_code() {
        let raw = RawError::from(GatewayError::Rpc {
            code: 4001,
            message: "User rejected the request.".to_owned(),
            data: None,
        });
        assert_eq!(raw.to_json()["code"], json!(4001));
    }

    #[test]
    fn gateway_unavailable_maps_to_network_code() {
        let raw = RawError::from(GatewayError::Http {
            status: 503,
            body: "busy".to_owned(),
        });
        assert_eq!(raw.to_json()["code"], json!("NETWORK_ERROR"));
    }

    #[test]
    fn node_auth_failure_is_a_provider_error_not_a_rejection() {
        for status in [401, 403] {
            let err = GatewayError::Http {
                status,
                body: "Unauthorized".to_owned(),
            };
            let classified = crate::classify(&err);
            assert_eq!(classified.kind, ErrorKind::ProviderError, "{status}");
            assert!(!classified.is_user_rejected(), "{status}");
            assert_eq!(classified.context["providerCode"], json!(status));
        }
    }
}
