//! Faucet top-up followed by joining a game.
//!
//! A player without enough cUSD claims from the faucet before joining. The
//! join is only submitted after the claim transaction is confirmed and the
//! new balance is observable on-chain, never after a fixed sleep.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::{
    balance_of, ConfirmationOptions, ContractGateway, GatewayError, Receipt, TransactionRequest,
};

/// `claim()` selector of the faucet contract.
pub const FAUCET_CLAIM_SELECTOR: &str = "0x4e71d92d";

/// 0.1 cUSD in wei, the balance below which the faucet is used.
pub const DEFAULT_MIN_BALANCE_WEI: u128 = 100_000_000_000_000_000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FaucetOptions {
    /// Balance the player needs before the join is submitted.
    pub min_balance_wei: u128,
    pub confirmation: ConfirmationOptions,
    pub balance_poll_interval_ms: u64,
    /// How long to wait for the claimed funds to show up in the balance.
    pub balance_timeout_ms: u64,
}

impl Default for FaucetOptions {
    fn default() -> Self {
        Self {
            min_balance_wei: DEFAULT_MIN_BALANCE_WEI,
            confirmation: ConfirmationOptions::default(),
            balance_poll_interval_ms: 1_000,
            balance_timeout_ms: 30_000,
        }
    }
}

/// Accounts and transactions taking part in one claim-then-join run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinPlan {
    pub player: String,
    /// ERC-20 token whose balance gates the join (cUSD).
    pub token: String,
    pub claim: TransactionRequest,
    pub join: TransactionRequest,
}

impl JoinPlan {
    /// Plan whose claim calls `claim()` on `faucet` from `player`.
    pub fn new(
        player: impl Into<String>,
        token: impl Into<String>,
        faucet: impl Into<String>,
        join: TransactionRequest,
    ) -> Self {
        let player = player.into();
        let claim = TransactionRequest::new(player.clone(), faucet).with_data(FAUCET_CLAIM_SELECTOR);
        Self {
            player,
            token: token.into(),
            claim,
            join,
        }
    }

    /// Pays gas for both transactions in `token`, as MiniPay does.
    pub fn with_fee_currency(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.claim.fee_currency = Some(token.clone());
        self.join.fee_currency = Some(token);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Confirmed faucet claim, when one was needed.
    pub claim: Option<Receipt>,
    /// Balance observed right before the join was submitted.
    pub balance_wei: u128,
    pub join: Receipt,
}

/// Runs [`JoinPlan`]s against a gateway.
#[derive(Debug)]
pub struct FaucetFlow<'a, G: ?Sized> {
    gateway: &'a G,
    options: FaucetOptions,
}

impl<'a, G> FaucetFlow<'a, G>
where
    G: ContractGateway + ?Sized,
{
    pub fn new(gateway: &'a G) -> Self {
        Self {
            gateway,
            options: FaucetOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FaucetOptions) -> Self {
        self.options = options;
        self
    }

    /// Tops the player up from the faucet if needed, then joins.
    pub async fn claim_then_join(&self, plan: &JoinPlan) -> Result<JoinOutcome, GatewayError> {
        let balance = balance_of(self.gateway, &plan.token, &plan.player).await?;

        let (claim, balance_wei) = if balance >= self.options.min_balance_wei {
            (None, balance)
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                player = %plan.player,
                balance = %balance,
                "balance below minimum; claiming from faucet"
            );

            let hash = self.gateway.write(&plan.claim).await?;
            let receipt = self
                .gateway
                .wait_for_confirmation(&hash, &self.options.confirmation)
                .await?;
            let balance = self.wait_for_balance(plan).await?;
            (Some(receipt), balance)
        };

        let hash = self.gateway.write(&plan.join).await?;
        let join = self
            .gateway
            .wait_for_confirmation(&hash, &self.options.confirmation)
            .await?;

        Ok(JoinOutcome {
            claim,
            balance_wei,
            join,
        })
    }

    async fn wait_for_balance(&self, plan: &JoinPlan) -> Result<u128, GatewayError> {
        let started = Instant::now();
        let timeout = Duration::from_millis(self.options.balance_timeout_ms);
        let interval = Duration::from_millis(self.options.balance_poll_interval_ms.max(1));
        loop {
            let balance = balance_of(self.gateway, &plan.token, &plan.player).await?;
            if balance >= self.options.min_balance_wei {
                return Ok(balance);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(GatewayError::Timeout {
                    what: format!(
                        "balance of {} to reach {} wei",
                        plan.player, self.options.min_balance_wei
                    ),
                    waited_ms: waited.as_millis() as u64,
                });
            }
            sleep(interval.min(timeout - waited)).await;
        }
    }
}
