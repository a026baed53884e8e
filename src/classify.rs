//! Maps raw wallet/contract failures onto [`ErrorKind`].
//!
//! Rules are checked in a fixed priority order and the first match wins, so
//! specific conditions such as an explicit user rejection are tested before
//! generic fallbacks. Codes and error names are matched against every rule
//! before any message text is searched. Classification never fails: unmatched input becomes
//! [`ErrorKind::UnknownError`].

use serde_json::Value as JsonValue;

use crate::{ClassifiedError, ErrorKind, RawError};

/// How deep nested `cause` / `error` / `data` objects are followed.
const MAX_CAUSE_DEPTH: usize = 4;

const MESSAGE_FIELDS: [&str; 4] = ["message", "shortMessage", "reason", "details"];
const NESTED_FIELDS: [&str; 4] = ["cause", "error", "data", "originalError"];

struct Rule {
    kind: ErrorKind,
    numeric_codes: &'static [i64],
    /// Extra string codes; the kind's own name always matches too.
    string_codes: &'static [&'static str],
    /// Lowercase substrings searched in message-like fields.
    text: &'static [&'static str],
    names: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::UserRejected,
        numeric_codes: &[4001],
        string_codes: &["ACTION_REJECTED"],
        text: &["user rejected", "user denied", "rejected by user", "user cancelled"],
        names: &["UserRejectedRequestError"],
    },
    Rule {
        kind: ErrorKind::AccountAccessDenied,
        numeric_codes: &[4100],
        string_codes: &[],
        text: &["unauthorized", "access denied", "not been authorized"],
        names: &[],
    },
    Rule {
        kind: ErrorKind::AlreadyProcessing,
        numeric_codes: &[-32002],
        string_codes: &[],
        text: &["already processing", "already pending"],
        names: &[],
    },
    Rule {
        kind: ErrorKind::NoProvider,
        numeric_codes: &[],
        string_codes: &[],
        text: &[
            "no ethereum provider",
            "no web3 provider",
            "provider not found",
            "provider not available",
            "minipay not available",
            "wallet not available",
        ],
        names: &["ProviderNotFoundError"],
    },
    Rule {
        kind: ErrorKind::UnsupportedChain,
        numeric_codes: &[4902],
        string_codes: &[],
        text: &["unsupported chain", "unrecognized chain", "chain mismatch"],
        names: &["ChainMismatchError"],
    },
    Rule {
        kind: ErrorKind::AccountNotFound,
        numeric_codes: &[],
        string_codes: &[],
        text: &["no accounts", "account not found", "wallet not connected"],
        names: &[],
    },
    Rule {
        kind: ErrorKind::Timeout,
        numeric_codes: &[],
        string_codes: &[],
        text: &["timeout", "timed out"],
        names: &["TimeoutError"],
    },
    Rule {
        kind: ErrorKind::RateLimitExceeded,
        numeric_codes: &[429, -32005],
        string_codes: &[],
        text: &["rate limit", "too many requests"],
        names: &[],
    },
    Rule {
        kind: ErrorKind::NetworkError,
        numeric_codes: &[],
        string_codes: &[],
        text: &[
            "network changed",
            "network error",
            "failed to fetch",
            "connection refused",
        ],
        names: &["NetworkError"],
    },
    Rule {
        kind: ErrorKind::InsufficientFunds,
        numeric_codes: &[],
        string_codes: &[],
        text: &["insufficient funds", "not enough funds"],
        names: &[],
    },
    Rule {
        kind: ErrorKind::GasEstimationFailed,
        numeric_codes: &[],
        string_codes: &["UNPREDICTABLE_GAS_LIMIT"],
        text: &["cannot estimate gas", "gas required exceeds", "intrinsic gas too low"],
        names: &["EstimateGasExecutionError"],
    },
    Rule {
        kind: ErrorKind::TransactionRejected,
        numeric_codes: &[],
        string_codes: &["REPLACEMENT_UNDERPRICED", "NONCE_EXPIRED"],
        text: &[
            "transaction rejected",
            "nonce too low",
            "replacement transaction underpriced",
        ],
        names: &[],
    },
    Rule {
        kind: ErrorKind::TransactionFailed,
        numeric_codes: &[],
        string_codes: &["CALL_EXCEPTION"],
        text: &["execution reverted", "transaction failed", "reverted"],
        names: &["ContractFunctionRevertedError"],
    },
];

#[derive(Debug, Default)]
struct Facts {
    numeric_codes: Vec<i64>,
    string_codes: Vec<String>,
    text: Vec<String>,
    names: Vec<String>,
    first_code: Option<JsonValue>,
}

impl Facts {
    fn gather(value: &JsonValue) -> Self {
        let mut facts = Self::default();
        facts.collect(value, 0);
        facts
    }

    fn collect(&mut self, value: &JsonValue, depth: usize) {
        match value {
            JsonValue::String(text) => self.text.push(text.to_lowercase()),
            JsonValue::Object(map) => {
                if let Some(code) = map.get("code") {
                    self.record_code(code);
                }
                for field in MESSAGE_FIELDS {
                    if let Some(JsonValue::String(text)) = map.get(field) {
                        self.text.push(text.to_lowercase());
                    }
                }
                if let Some(JsonValue::String(name)) = map.get("name") {
                    self.names.push(name.clone());
                }
                if depth < MAX_CAUSE_DEPTH {
                    for field in NESTED_FIELDS {
                        if let Some(nested) = map.get(field) {
                            self.collect(nested, depth + 1);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn record_code(&mut self, code: &JsonValue) {
        match code {
            JsonValue::Number(number) => {
                if let Some(number) = number.as_i64() {
                    self.numeric_codes.push(number);
                }
            }
            JsonValue::String(text) => {
                if let Ok(number) = text.trim().parse::<i64>() {
                    self.numeric_codes.push(number);
                }
                self.string_codes.push(text.clone());
            }
            _ => return,
        }
        if self.first_code.is_none() {
            self.first_code = Some(code.clone());
        }
    }

    /// Structural evidence: numeric or string codes and error names.
    fn matches_code(&self, rule: &Rule) -> bool {
        self.numeric_codes
            .iter()
            .any(|code| rule.numeric_codes.contains(code))
            || self.string_codes.iter().any(|code| {
                code.eq_ignore_ascii_case(rule.kind.as_str())
                    || rule
                        .string_codes
                        .iter()
                        .any(|candidate| code.eq_ignore_ascii_case(candidate))
            })
            || self.names.iter().any(|name| rule.names.contains(&name.as_str()))
    }

    fn matches_text(&self, rule: &Rule) -> bool {
        self.text
            .iter()
            .any(|text| rule.text.iter().any(|needle| text.contains(needle)))
    }

    /// Codes decide before any text does. Among text matches a revert comes
    /// first, since its reason string is contract-defined and may mention
    /// timeouts, limits or authorization.
    fn find_rule(&self) -> Option<&'static Rule> {
        RULES
            .iter()
            .find(|rule| self.matches_code(rule))
            .or_else(|| {
                RULES.iter().find(|rule| {
                    rule.kind == ErrorKind::TransactionFailed && self.matches_text(rule)
                })
            })
            .or_else(|| RULES.iter().find(|rule| self.matches_text(rule)))
    }
}

/// Classifies any raw failure value.
pub fn classify(raw: impl Into<RawError>) -> ClassifiedError {
    classify_raw(&raw.into())
}

/// Classifies and attaches caller diagnostic tags.
pub fn classify_with_context<I, K, V>(raw: impl Into<RawError>, context: I) -> ClassifiedError
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<JsonValue>,
{
    context
        .into_iter()
        .fold(classify(raw), |err, (key, value)| err.with_context(key, value))
}

/// Borrowing form of [`classify`].
pub fn classify_raw(raw: &RawError) -> ClassifiedError {
    let value = match raw {
        RawError::Classified(err) => return err.clone(),
        RawError::Value(value) => value,
    };

    if let Some(err) = already_classified(value) {
        return err;
    }

    let facts = Facts::gather(value);
    if let Some(rule) = facts.find_rule() {
        return ClassifiedError::new(rule.kind).with_cause(value.clone());
    }

    match &facts.first_code {
        Some(code) => ClassifiedError::new(ErrorKind::ProviderError)
            .with_cause(value.clone())
            .with_context("providerCode", code.clone()),
        None => ClassifiedError::new(ErrorKind::UnknownError).with_cause(value.clone()),
    }
}

/// User-facing message for any raw failure value.
pub fn error_message(raw: impl Into<RawError>) -> String {
    classify(raw).message
}

/// True when the user explicitly declined the request.
pub fn is_user_rejected(raw: impl Into<RawError>) -> bool {
    classify(raw).is_user_rejected()
}

/// True when the failure is transient and eligible for automatic retry.
pub fn is_recoverable(raw: impl Into<RawError>) -> bool {
    classify(raw).is_recoverable()
}

fn already_classified(value: &JsonValue) -> Option<ClassifiedError> {
    let object = value.as_object()?;
    object.get("kind")?.as_str()?.parse::<ErrorKind>().ok()?;
    let message = object.get("message")?.as_str()?;
    if message.trim().is_empty() {
        return None;
    }
    let err: ClassifiedError = serde_json::from_value(value.clone()).ok()?;
    // Foreign JSON never supplies the user-facing text.
    Some(ClassifiedError {
        message: err.kind.default_message().to_owned(),
        ..err
    })
}
