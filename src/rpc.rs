use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use reqwest::header;
use serde_json::{json, Value as JsonValue};

use crate::{
    gateway::parse_quantity,
    wire::{ReceiptEnvelope, RpcRequest, RpcResponse},
    ConfigError, ContractCall, ContractGateway, GatewayError, GatewayOptions, Receipt,
    TransactionRequest, TxHash,
};

#[derive(Clone)]
/// [`ContractGateway`] over Ethereum JSON-RPC 2.0 via HTTP.
///
/// Writes go out as `eth_sendTransaction`, so the endpoint must be a wallet
/// or node that holds the sender's key.
pub struct HttpGateway {
    http: reqwest::Client,
    rpc_url: String,
    authorization: Option<String>,
    options: GatewayOptions,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("rpc_url", &self.rpc_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl HttpGateway {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.into(),
            authorization: None,
            options: GatewayOptions::default(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn with_bearer(mut self, token: impl AsRef<str>) -> Self {
        self.authorization = Some(normalize_bearer_authorization(token.as_ref()));
        self
    }

    /// Applies transport options such as the request timeout.
    pub fn with_options(mut self, opts: GatewayOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Creates a gateway from environment variables.
    ///
    /// Reads:
    /// - `ZALI_RPC_URL`: JSON-RPC endpoint URL (required)
    /// - `ZALI_RPC_TOKEN`: bearer token (optional, `Bearer` prefix optional)
    /// - `ZALI_RPC_TIMEOUT_MS`: request timeout (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let url =
            std::env::var("ZALI_RPC_URL").map_err(|_| ConfigError::Missing("ZALI_RPC_URL"))?;
        if url.trim().is_empty() {
            return Err(ConfigError::Empty("ZALI_RPC_URL"));
        }
        let mut gateway = Self::new(url.trim()).with_options(GatewayOptions::from_env()?);
        if let Ok(token) = std::env::var("ZALI_RPC_TOKEN") {
            if !token.trim().is_empty() {
                gateway = gateway.with_bearer(token);
            }
        }
        Ok(gateway)
    }

    /// Sends one JSON-RPC request and returns its `result` member.
    pub async fn call(&self, method: &str, params: JsonValue) -> Result<JsonValue, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = RpcRequest::new(id, method, params);

        #[cfg(feature = "tracing")]
        tracing::debug!(id, method, "sending json-rpc request");

        let mut request = self
            .http
            .post(&self.rpc_url)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(Duration::from_millis(self.options.timeout_ms))
            .json(&payload);
        if let Some(authorization) = &self.authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(GatewayError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(GatewayError::Transport)?;

        let envelope = serde_json::from_str::<RpcResponse>(&body);
        if !status.is_success() {
            // Some nodes pair a JSON-RPC error object with a non-2xx status.
            if let Ok(RpcResponse {
                error: Some(error), ..
            }) = envelope
            {
                return Err(rpc_error(error));
            }
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope = envelope.map_err(|err| {
            GatewayError::Decode(format!("invalid json-rpc response: {err}; body: {body}"))
        })?;
        if let Some(error) = envelope.error {
            return Err(rpc_error(error));
        }
        Ok(envelope.result.unwrap_or(JsonValue::Null))
    }

    async fn call_string(&self, method: &str, params: JsonValue) -> Result<String, GatewayError> {
        match self.call(method, params).await? {
            JsonValue::String(value) => Ok(value),
            other => Err(GatewayError::Decode(format!(
                "expected string result from {method}, got {other}"
            ))),
        }
    }
}

impl ContractGateway for HttpGateway {
    async fn chain_id(&self) -> Result<u64, GatewayError> {
        let value = self.call_string("eth_chainId", json!([])).await?;
        parse_quantity(&value)
    }

    async fn read(&self, call: &ContractCall) -> Result<String, GatewayError> {
        self.call_string("eth_call", json!([call, "latest"])).await
    }

    async fn write(&self, tx: &TransactionRequest) -> Result<TxHash, GatewayError> {
        let hash = self.call_string("eth_sendTransaction", json!([tx])).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(tx_hash = %hash, to = %tx.to, "transaction submitted");

        Ok(TxHash(hash))
    }

    async fn receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, GatewayError> {
        let value = self
            .call("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let envelope: ReceiptEnvelope = serde_json::from_value(value)
            .map_err(|err| GatewayError::Decode(format!("invalid receipt for {hash}: {err}")))?;
        decode_receipt(envelope).map(Some)
    }
}

fn decode_receipt(envelope: ReceiptEnvelope) -> Result<Receipt, GatewayError> {
    let block_number = envelope
        .block_number
        .as_deref()
        .map(parse_quantity)
        .transpose()?;
    let success = match envelope.status.as_deref() {
        None => true,
        Some(status) => parse_quantity(status)? == 1,
    };
    Ok(Receipt {
        transaction_hash: TxHash(envelope.transaction_hash),
        block_number,
        success,
    })
}

fn rpc_error(error: crate::wire::RpcErrorObject) -> GatewayError {
    GatewayError::Rpc {
        code: error.code,
        message: error.message,
        data: error.data,
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
