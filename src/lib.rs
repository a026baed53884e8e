//! `zali-client` runs the wallet and contract side of the Zali trivia game.
//!
//! The crate is built around two pieces:
//! - [`run`] / [`RetryRunner`] drive a fallible async operation through
//!   `Idle -> Loading -> Success | Error` with bounded, backoff-delayed retries
//!   and an observable [`OperationState`].
//! - [`classify`] maps any wallet, provider or contract failure onto a closed
//!   set of [`ErrorKind`]s with stable user-facing messages.
//!
//! [`HttpGateway`] speaks Ethereum JSON-RPC to Celo, and [`FaucetFlow`] tops a
//! player up from the faucet before joining a game.

mod classify;
mod config;
mod error;
mod faucet;
mod gateway;
mod kind;
mod options;
mod probe;
mod raw;
mod rpc;
mod runner;
mod state;
mod wire;

pub use classify::{
    classify, classify_raw, classify_with_context, error_message, is_recoverable,
    is_user_rejected,
};
pub use config::{
    NetworkConfig, CELO_CHAIN_ID, CELO_RPC_URL, DEFAULT_FAUCET_ADDRESS, DEFAULT_TOKEN_ADDRESS,
};
pub use error::{ClassifiedError, ConfigError, GatewayError};
pub use faucet::{
    FaucetFlow, FaucetOptions, JoinOutcome, JoinPlan, DEFAULT_MIN_BALANCE_WEI,
    FAUCET_CLAIM_SELECTOR,
};
pub use gateway::{
    balance_of, balance_of_call, decode_uint, parse_quantity, ConfirmationOptions, ContractCall,
    ContractGateway, Receipt, TransactionRequest, TxHash, BALANCE_OF_SELECTOR,
    GATEWAY_INTERFACE_VERSION,
};
pub use kind::ErrorKind;
pub use options::{GatewayOptions, RetryOptions};
pub use probe::{connect_wallet, Connection, ProviderInfo, StaticProbe, WalletProbe};
pub use raw::RawError;
pub use rpc::HttpGateway;
pub use runner::{run, Handle, RetryRunner};
pub use state::{OperationState, Phase};
