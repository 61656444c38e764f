//! rBTC DCA Keeper Service
//!
//! Triggers due DCA purchases on the deployed contract on a fixed cadence
//! and logs one line per account plus a per-tick summary.
//!
//! # Running
//!
//! ```bash
//! # .env: PRIVATE_KEY=0x... DCA_CONTRACT_ADDRESS=0x...
//! RUST_LOG=info cargo run -p keeper
//! ```

use keeper::{
    chain::{ChainClient, RpcChainClient},
    classify::OutcomeClassifier,
    config::{load_config, ConfigError, SecretKey, PRIVATE_KEY_VAR},
    contract::DcaContract,
    resolver::{AccountResolver, AccountSource},
    KeeperError, PurchasePipeline, Scheduler,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env is normal in deployment.
    let _ = dotenvy::dotenv();
    keeper::init_tracing();

    info!("rBTC DCA keeper v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run().await {
        error!("Keeper failed to start: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), KeeperError> {
    let config = load_config()?;
    let contract_address = config
        .contract_address
        .ok_or(ConfigError::MissingContract)?;
    let signer = SecretKey::from_env(PRIVATE_KEY_VAR)?.signer(PRIVATE_KEY_VAR)?;

    let client =
        RpcChainClient::connect(&config.rpc_url, signer, config.client_options()).await?;
    let network = rbtc_dca::network_name(client.chain_id());
    match client.client_version().await {
        Ok(version) => info!(
            "Connected to {} at {} (chain id {})",
            version,
            client.rpc_url(),
            client.chain_id()
        ),
        Err(e) => warn!("web3_clientVersion failed: {}", e),
    }
    match network {
        Some(name) => info!("Network: {}", name),
        None => warn!("Chain id {} is not an RSK network", client.chain_id()),
    }

    let contract = DcaContract::new(contract_address, config.flavor);
    let resolver = AccountResolver::new(config.account_source.clone(), contract);
    info!("Keeper signer: {}", client.signer_address());
    info!("DCA contract: {} ({:?})", contract.address, contract.flavor);
    match resolver.source() {
        AccountSource::Contract => info!("Accounts: contract getUsers()"),
        AccountSource::Static(accounts) => info!("Accounts: static list of {}", accounts.len()),
    }
    info!(
        "Schedule: every {}s{}",
        config.schedule.interval_secs,
        if config.schedule.align_to_wall_clock {
            " (wall-clock aligned)"
        } else {
            ""
        }
    );
    info!("Not-eligible error: {}", config.not_elapsed_error());
    info!("Dry run: {}", config.dry_run);

    let pipeline = PurchasePipeline::new(
        client,
        contract,
        resolver,
        OutcomeClassifier::new(config.not_elapsed_error()),
    )
    .dry_run(config.dry_run)
    .max_in_flight(config.max_in_flight);

    let scheduler = Scheduler::new(pipeline, config.schedule);
    let ticks = scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Keeper stopped after {} tick(s)", ticks);
    Ok(())
}
