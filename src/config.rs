use crate::{options::parse_var, ConfigError, GatewayOptions, HttpGateway};

/// Celo mainnet chain id.
pub const CELO_CHAIN_ID: u64 = 42220;
pub const CELO_RPC_URL: &str = "https://forno.celo.org";
pub const DEFAULT_FAUCET_ADDRESS: &str = "0x707ECcbbFa9073F1e5A5675F22473956FE36FC8d";
/// cUSD stable token on Celo.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0x765DE816845861e75A25fCA122bb6898B8B1282a";

/// Chain and contract addresses the game talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub faucet_address: String,
    pub token_address: String,
    /// Trivia game contract; unset until deployed on this chain.
    pub game_address: Option<String>,
    pub gateway: GatewayOptions,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: CELO_CHAIN_ID,
            rpc_url: CELO_RPC_URL.to_owned(),
            faucet_address: DEFAULT_FAUCET_ADDRESS.to_owned(),
            token_address: DEFAULT_TOKEN_ADDRESS.to_owned(),
            game_address: None,
            gateway: GatewayOptions::default(),
        }
    }
}

impl NetworkConfig {
    /// Reads overrides from the environment on top of the Celo defaults.
    ///
    /// Reads `ZALI_CHAIN_ID`, `ZALI_RPC_URL`, `ZALI_FAUCET_ADDRESS`,
    /// `ZALI_TOKEN_ADDRESS`, `ZALI_GAME_ADDRESS` and `ZALI_RPC_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(chain_id) = parse_var(&lookup, "ZALI_CHAIN_ID")? {
            config.chain_id = chain_id;
        }
        if let Some(url) = parse_var::<_, String>(&lookup, "ZALI_RPC_URL")? {
            config.rpc_url = url;
        }
        if let Some(address) = parse_address(&lookup, "ZALI_FAUCET_ADDRESS")? {
            config.faucet_address = address;
        }
        if let Some(address) = parse_address(&lookup, "ZALI_TOKEN_ADDRESS")? {
            config.token_address = address;
        }
        config.game_address = parse_address(&lookup, "ZALI_GAME_ADDRESS")?;
        config.gateway = GatewayOptions::from_lookup(&lookup)?;
        Ok(config)
    }

    pub fn supported_chains(&self) -> [u64; 1] {
        [self.chain_id]
    }

    pub fn gateway(&self) -> HttpGateway {
        HttpGateway::new(self.rpc_url.clone()).with_options(self.gateway.clone())
    }
}

fn parse_address<F>(lookup: &F, var: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let Some(address) = parse_var::<_, String>(lookup, var)? else {
        return Ok(None);
    };
    let digits = address.strip_prefix("0x").unwrap_or_default();
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid {
            var,
            value: address,
        });
    }
    Ok(Some(address))
}
