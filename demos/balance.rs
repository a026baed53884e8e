use zali_client::{balance_of, run, ContractGateway, NetworkConfig, RetryOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NetworkConfig::from_env()?;
    let player = std::env::var("ZALI_PLAYER")?;

    let gateway = config.gateway();
    let chain_id = gateway.chain_id().await?;
    println!("connected to chain {chain_id} via {}", config.rpc_url);

    let token = config.token_address.clone();
    let handle = run(
        move || {
            let gateway = gateway.clone();
            let token = token.clone();
            let player = player.clone();
            async move { balance_of(&gateway, &token, &player).await }
        },
        RetryOptions::from_env()?.with_auto_retry(true),
    );

    let state = handle.settled().await;
    match (state.data, state.error) {
        (Some(balance), _) => println!("cUSD balance: {balance} wei"),
        (None, Some(error)) => {
            println!("balance lookup failed after {} retries", state.retry_count);
            return Err(error.into());
        }
        (None, None) => println!("balance lookup was reset"),
    }

    Ok(())
}
