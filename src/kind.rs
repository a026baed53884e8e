use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of semantic error kinds for wallet and contract failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UserRejected,
    AlreadyProcessing,
    NoProvider,
    UnsupportedChain,
    NetworkError,
    Timeout,
    AccountAccessDenied,
    AccountNotFound,
    TransactionRejected,
    TransactionFailed,
    InsufficientFunds,
    GasEstimationFailed,
    RateLimitExceeded,
    ProviderError,
    UnknownError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::UserRejected,
        ErrorKind::AlreadyProcessing,
        ErrorKind::NoProvider,
        ErrorKind::UnsupportedChain,
        ErrorKind::NetworkError,
        ErrorKind::Timeout,
        ErrorKind::AccountAccessDenied,
        ErrorKind::AccountNotFound,
        ErrorKind::TransactionRejected,
        ErrorKind::TransactionFailed,
        ErrorKind::InsufficientFunds,
        ErrorKind::GasEstimationFailed,
        ErrorKind::RateLimitExceeded,
        ErrorKind::ProviderError,
        ErrorKind::UnknownError,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UserRejected => "USER_REJECTED",
            ErrorKind::AlreadyProcessing => "ALREADY_PROCESSING",
            ErrorKind::NoProvider => "NO_PROVIDER",
            ErrorKind::UnsupportedChain => "UNSUPPORTED_CHAIN",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::AccountAccessDenied => "ACCOUNT_ACCESS_DENIED",
            ErrorKind::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorKind::TransactionRejected => "TRANSACTION_REJECTED",
            ErrorKind::TransactionFailed => "TRANSACTION_FAILED",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::GasEstimationFailed => "GAS_ESTIMATION_FAILED",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::ProviderError => "PROVIDER_ERROR",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// User-facing message shown for this kind.
    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorKind::UserRejected => {
                "Request was rejected. Please try again and approve it in your wallet."
            }
            ErrorKind::AlreadyProcessing => {
                "A request is already in progress. Please check your wallet and try again."
            }
            ErrorKind::NoProvider => {
                "No wallet detected. Please install MiniPay, MetaMask or another web3 wallet."
            }
            ErrorKind::UnsupportedChain => {
                "Unsupported network. Please switch to a supported network in your wallet."
            }
            ErrorKind::NetworkError => {
                "Network error. Please check your internet connection and try again."
            }
            ErrorKind::Timeout => "The request timed out. Please try again.",
            ErrorKind::AccountAccessDenied => {
                "Account access was denied. Please grant the required permissions."
            }
            ErrorKind::AccountNotFound => {
                "No accounts found. Please unlock your wallet and try again."
            }
            ErrorKind::TransactionRejected => {
                "Transaction was rejected by the network. Please try again."
            }
            ErrorKind::TransactionFailed => {
                "Transaction failed. Please check your wallet and try again."
            }
            ErrorKind::InsufficientFunds => {
                "Insufficient funds for transaction. Please add funds to your wallet."
            }
            ErrorKind::GasEstimationFailed => {
                "Failed to estimate gas. Please try again or adjust your transaction."
            }
            ErrorKind::RateLimitExceeded => "Too many requests. Please wait a moment and try again.",
            ErrorKind::ProviderError => {
                "Wallet provider error. Please try again or contact support if the issue persists."
            }
            ErrorKind::UnknownError => {
                "An unexpected error occurred. Please try again or contact support if the issue persists."
            }
        }
    }

    /// The user explicitly declined the request.
    pub const fn is_user_rejected(self) -> bool {
        matches!(self, ErrorKind::UserRejected | ErrorKind::AccountAccessDenied)
    }

    /// Transient kinds; the only ones eligible for automatic retry.
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::AlreadyProcessing
                | ErrorKind::NetworkError
                | ErrorKind::Timeout
                | ErrorKind::RateLimitExceeded
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}
