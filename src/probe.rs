//! Wallet presence detection as an injected capability.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ClassifiedError, ErrorKind};

/// What a detected wallet provider reports about itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// Provider name, e.g. `"MiniPay"` or `"MetaMask"`.
    pub name: String,
    /// Running inside the MiniPay wallet, which pays fees in cUSD.
    pub is_mini_pay: bool,
    pub chain_id: Option<u64>,
    pub accounts: Vec<String>,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_mini_pay: false,
            chain_id: None,
            accounts: Vec::new(),
        }
    }

    pub fn mini_pay(mut self) -> Self {
        self.is_mini_pay = true;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.accounts.push(account.into());
        self
    }
}

/// Detects an available wallet provider.
pub trait WalletProbe {
    fn detect(&self) -> Option<ProviderInfo>;
}

impl<P: WalletProbe + ?Sized> WalletProbe for &P {
    fn detect(&self) -> Option<ProviderInfo> {
        (**self).detect()
    }
}

/// Probe that always reports the same provider, or none.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticProbe(pub Option<ProviderInfo>);

impl StaticProbe {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn with(info: ProviderInfo) -> Self {
        Self(Some(info))
    }
}

impl WalletProbe for StaticProbe {
    fn detect(&self) -> Option<ProviderInfo> {
        self.0.clone()
    }
}

/// A wallet that passed the connection pre-flight checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub provider: ProviderInfo,
    pub account: String,
    pub chain_id: u64,
}

/// Checks that a provider exists, is on a supported chain and exposes an
/// account.
///
/// An empty `supported_chains` accepts any chain the provider reports.
pub fn connect_wallet<P>(probe: &P, supported_chains: &[u64]) -> Result<Connection, ClassifiedError>
where
    P: WalletProbe + ?Sized,
{
    let provider = probe
        .detect()
        .ok_or_else(|| ClassifiedError::new(ErrorKind::NoProvider))?;

    let chain_id = match provider.chain_id {
        Some(chain_id) if supported_chains.is_empty() || supported_chains.contains(&chain_id) => {
            chain_id
        }
        other => {
            return Err(ClassifiedError::new(ErrorKind::UnsupportedChain)
                .with_context("chainId", json!(other))
                .with_context("supportedChains", json!(supported_chains)));
        }
    };

    let account = provider
        .accounts
        .first()
        .cloned()
        .ok_or_else(|| {
            ClassifiedError::new(ErrorKind::AccountNotFound).with_context("provider", provider.name.clone())
        })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(provider = %provider.name, chain_id, "wallet connected");

    Ok(Connection {
        provider,
        account,
        chain_id,
    })
}
