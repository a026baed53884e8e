use crate::ConfigError;

/// Configures retry and backoff behavior of a [`crate::RetryRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay for the first retry, and the base for exponential backoff.
    pub base_delay_ms: u64,
    /// Doubles the delay on each retry when set.
    pub use_exponential_backoff: bool,
    /// Upper bound on a computed backoff delay.
    pub max_delay_ms: u64,
    /// Schedules recoverable failures for retry without caller action.
    pub auto_retry: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            use_exponential_backoff: false,
            max_delay_ms: 30_000,
            auto_retry: false,
        }
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_exponential_backoff(mut self, max_delay_ms: u64) -> Self {
        self.use_exponential_backoff = true;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// Delay in milliseconds before retry `n`, where `n` is the number of
    /// retries already performed.
    pub fn delay_for_retry(&self, n: u32) -> u64 {
        if !self.use_exponential_backoff {
            return self.base_delay_ms;
        }
        let exp = n.min(63);
        let multiplier = 1u64 << exp;
        self.base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms)
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// Recognized variables, all optional:
    /// - `ZALI_RETRY_MAX_RETRIES`
    /// - `ZALI_RETRY_BASE_DELAY_MS`
    /// - `ZALI_RETRY_EXPONENTIAL` (`true`/`false`/`1`/`0`)
    /// - `ZALI_RETRY_MAX_DELAY_MS`
    /// - `ZALI_RETRY_AUTO` (`true`/`false`/`1`/`0`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut opts = Self::default();
        if let Some(value) = parse_var(&lookup, "ZALI_RETRY_MAX_RETRIES")? {
            opts.max_retries = value;
        }
        if let Some(value) = parse_var(&lookup, "ZALI_RETRY_BASE_DELAY_MS")? {
            opts.base_delay_ms = value;
        }
        if let Some(value) = parse_flag(&lookup, "ZALI_RETRY_EXPONENTIAL")? {
            opts.use_exponential_backoff = value;
        }
        if let Some(value) = parse_var(&lookup, "ZALI_RETRY_MAX_DELAY_MS")? {
            opts.max_delay_ms = value;
        }
        if let Some(value) = parse_flag(&lookup, "ZALI_RETRY_AUTO")? {
            opts.auto_retry = value;
        }
        Ok(opts)
    }
}

/// Configures the JSON-RPC transport of [`crate::HttpGateway`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl GatewayOptions {
    /// Reads `ZALI_RPC_TIMEOUT_MS` on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut opts = Self::default();
        if let Some(value) = parse_var(&lookup, "ZALI_RPC_TIMEOUT_MS")? {
            opts.timeout_ms = value;
        }
        Ok(opts)
    }
}

pub(crate) fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(var));
    }
    trimmed.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
        var,
        value: raw.clone(),
    })
}

fn parse_flag<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Err(ConfigError::Empty(var)),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}
