//! Contract read/write capability.
//!
//! [`ContractGateway`] is the single interface the rest of the crate uses to
//! reach the on-chain game contracts. [`crate::HttpGateway`] implements it
//! over JSON-RPC; tests substitute in-memory fakes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use crate::GatewayError;

/// Version of the [`ContractGateway`] interface.
pub const GATEWAY_INTERFACE_VERSION: u32 = 1;

/// ERC-20 `balanceOf(address)` selector.
pub const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Read-only contract call, sent as `eth_call`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub to: String,
    /// ABI-encoded calldata, `0x`-prefixed hex.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl ContractCall {
    pub fn new(to: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            data: data.into(),
            from: None,
        }
    }

    pub fn from_account(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// State-changing transaction, sent as `eth_sendTransaction` to the wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Hex quantity in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    /// Celo fee currency token, used by MiniPay to pay gas in cUSD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_currency: Option<String>,
}

impl TransactionRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_value_wei(mut self, wei: u128) -> Self {
        self.value = Some(format!("{wei:#x}"));
        self
    }

    pub fn with_fee_currency(mut self, token: impl Into<String>) -> Self {
        self.fee_currency = Some(token.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mined transaction outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    /// `false` when the transaction reverted.
    pub success: bool,
}

/// Polling policy for [`ContractGateway::wait_for_confirmation`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfirmationOptions {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ConfirmationOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_ms: 60_000,
        }
    }
}

/// Read/write/confirm access to contracts on one chain.
pub trait ContractGateway: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = Result<u64, GatewayError>> + Send;

    /// Executes a call without a transaction and returns the raw return data.
    fn read(&self, call: &ContractCall) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Submits a transaction and returns its hash without waiting for it.
    fn write(
        &self,
        tx: &TransactionRequest,
    ) -> impl Future<Output = Result<TxHash, GatewayError>> + Send;

    /// Returns the receipt, or `None` while the transaction is pending.
    fn receipt(
        &self,
        hash: &TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>, GatewayError>> + Send;

    /// Polls for the receipt until it is mined or the timeout elapses.
    ///
    /// A reverted receipt is returned as [`GatewayError::Reverted`].
    fn wait_for_confirmation(
        &self,
        hash: &TxHash,
        options: &ConfirmationOptions,
    ) -> impl Future<Output = Result<Receipt, GatewayError>> + Send {
        async move {
            let started = Instant::now();
            let timeout = Duration::from_millis(options.timeout_ms);
            let interval = Duration::from_millis(options.poll_interval_ms.max(1));
            loop {
                if let Some(receipt) = self.receipt(hash).await? {
                    if receipt.success {
                        return Ok(receipt);
                    }
                    return Err(GatewayError::Reverted {
                        tx_hash: receipt.transaction_hash.0,
                        block_number: receipt.block_number,
                    });
                }

                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(GatewayError::Timeout {
                        what: format!("receipt of {hash}"),
                        waited_ms: waited.as_millis() as u64,
                    });
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(tx_hash = %hash, "transaction pending; polling again");

                sleep(interval.min(timeout - waited)).await;
            }
        }
    }
}

/// Builds the `balanceOf(owner)` call against an ERC-20 token.
pub fn balance_of_call(token: &str, owner: &str) -> Result<ContractCall, GatewayError> {
    let owner = normalize_address(owner)?;
    Ok(ContractCall::new(
        token,
        format!("0x{BALANCE_OF_SELECTOR}{owner:0>64}"),
    ))
}

/// Reads an ERC-20 token balance in the token's smallest unit.
pub async fn balance_of<G>(gateway: &G, token: &str, owner: &str) -> Result<u128, GatewayError>
where
    G: ContractGateway + ?Sized,
{
    let call = balance_of_call(token, owner)?;
    let output = gateway.read(&call).await?;
    decode_uint(&output)
}

/// Decodes a single ABI `uint256` return word that fits into `u128`.
pub fn decode_uint(output: &str) -> Result<u128, GatewayError> {
    let digits = output.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Err(GatewayError::Decode("empty return data".to_owned()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        return Err(GatewayError::Decode(format!(
            "uint value 0x{significant} does not fit in 128 bits"
        )));
    }
    u128::from_str_radix(significant, 16)
        .map_err(|err| GatewayError::Decode(format!("invalid uint return data '{output}': {err}")))
}

/// Parses a JSON-RPC hex quantity such as `"0xa4ec"`.
pub fn parse_quantity(value: &str) -> Result<u64, GatewayError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| GatewayError::Decode(format!("quantity '{value}' is missing 0x prefix")))?;
    if digits.is_empty() {
        return Err(GatewayError::Decode("empty quantity".to_owned()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|err| GatewayError::Decode(format!("invalid quantity '{value}': {err}")))
}

fn normalize_address(address: &str) -> Result<String, GatewayError> {
    let trimmed = address.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GatewayError::InvalidAddress(address.to_owned()));
    }
    Ok(digits.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{balance_of_call, decode_uint, parse_quantity, TransactionRequest};
    use crate::GatewayError;

    #[test]
    fn balance_call_pads_owner_address() {
        let call = balance_of_call(
            "0x765DE816845861e75A25fCA122bb6898B8B1282a",
            "0x00000000000000000000000000000000000000Ab",
        )
        .unwrap();
        assert_eq!(call.data.len(), 2 + 8 + 64);
        assert!(call.data.starts_with("0x70a08231000000000000000000000000"));
        assert!(call.data.ends_with("ab"));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let err = balance_of_call("0xtoken", "0x1234").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidAddress(_)));
    }

    #[test]
    fn uint_words_decode() {
        let word = format!("0x{:0>64}", "16345785d8a0000");
        assert_eq!(decode_uint(&word).unwrap(), 100_000_000_000_000_000);
        assert_eq!(decode_uint("0x0").unwrap(), 0);
        assert!(decode_uint("0x").is_err());
        assert!(decode_uint(&format!("0x1{}", "0".repeat(32))).is_err());
    }

    #[test]
    fn quantities_require_prefix() {
        assert_eq!(parse_quantity("0xa4ec").unwrap(), 42220);
        assert!(parse_quantity("42220").is_err());
    }

    #[test]
    fn transaction_serializes_camel_case_fields() {
        let tx = TransactionRequest::new("0xfrom", "0xto")
            .with_value_wei(255)
            .with_fee_currency("0xcusd");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["value"], "0xff");
        assert_eq!(json["feeCurrency"], "0xcusd");
        assert!(json.get("data").is_none());
    }
}
