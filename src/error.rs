use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ErrorKind;

/// Wallet or contract failure mapped onto the closed [`ErrorKind`] set.
///
/// Displays as its user-facing message. Branch on [`ClassifiedError::kind`],
/// never on the message text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw thrown value, kept for diagnostics only.
    #[serde(default)]
    pub original_cause: JsonValue,
    /// Caller-supplied diagnostic tags (operation name, chain id, ...).
    #[serde(default)]
    pub context: BTreeMap<String, JsonValue>,
}

impl ClassifiedError {
    /// Creates an error carrying the default message for `kind`.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_owned(),
            original_cause: JsonValue::Null,
            context: BTreeMap::new(),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<JsonValue>) -> Self {
        self.original_cause = cause.into();
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Overrides the message. Blank text is ignored so the message never
    /// goes empty.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.trim().is_empty() {
            self.message = message;
        }
        self
    }

    pub fn is_user_rejected(&self) -> bool {
        self.kind.is_user_rejected()
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }
}

/// Error returned by [`crate::HttpGateway`] and confirmation polling.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// JSON-RPC error object returned by the node or wallet.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<JsonValue>,
    },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Malformed account or contract address supplied by the caller.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted in block {block_number:?}")]
    Reverted {
        tx_hash: String,
        block_number: Option<u64>,
    },
    /// A polling deadline elapsed before the awaited condition held.
    #[error("timed out after {waited_ms} ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },
}

/// Error loading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(&'static str),
    #[error("{0} is set but empty")]
    Empty(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}
