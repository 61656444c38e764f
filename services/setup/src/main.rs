//! DCA onboarding tool
//!
//! Prepares a participant account for the keeper: approves the DCA contract
//! on the DOC token, deposits DOC, and sets the purchase period and amount.
//! Also withdraws DOC and accumulated rBTC. Every transaction is waited for
//! before the next one is sent.
//!
//! ```bash
//! # .env: USER_PRIVATE_KEY=0x... DCA_CONTRACT_ADDRESS=0x...
//! cargo run -p setup -- --deposit 100 --period-secs 86400 --purchase 10
//! cargo run -p setup -- --withdraw-rbtc --withdraw-doc 50
//! cargo run -p setup -- --status
//! ```

use alloy::primitives::{
    utils::{format_units, parse_units},
    Address, U256,
};
use clap::Parser;
use keeper::{
    chain::{ChainClient, ChainError, RpcChainClient, TxRequest},
    config::{load_config, SecretKey},
};
use rbtc_dca::{
    calls::{self, ParticipantView},
    DOC_DECIMALS, DOC_TOKEN_TESTNET,
};
use tracing::{error, info};

const USER_KEY_VAR: &str = "USER_PRIVATE_KEY";

#[derive(Debug, Parser)]
#[command(name = "setup", version, about = "Onboard an account into the DCA contract")]
struct Args {
    /// DOC to approve and deposit, e.g. "100" or "12.5".
    #[arg(long, value_parser = parse_doc)]
    deposit: Option<U256>,

    /// Seconds between purchases.
    #[arg(long)]
    period_secs: Option<u64>,

    /// DOC spent per purchase.
    #[arg(long, value_parser = parse_doc)]
    purchase: Option<U256>,

    /// Withdraw all rBTC bought so far.
    #[arg(long)]
    withdraw_rbtc: bool,

    /// DOC to withdraw from the contract balance.
    #[arg(long, value_parser = parse_doc)]
    withdraw_doc: Option<U256>,

    /// DOC token contract.
    #[arg(long, env = "DOC_TOKEN_ADDRESS", default_value_t = DOC_TOKEN_TESTNET)]
    doc_token: Address,

    /// Print balances and settings; send nothing.
    #[arg(long)]
    status: bool,
}

fn parse_doc(value: &str) -> Result<U256, String> {
    parse_units(value, DOC_DECIMALS)
        .map(|units| units.get_absolute())
        .map_err(|e| format!("{value} is not a DOC amount: {e}"))
}

fn fmt_doc(value: U256) -> String {
    format_units(value, DOC_DECIMALS).unwrap_or_else(|_| value.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    label: &'static str,
    request: TxRequest,
}

/// Transactions to send, in order.
fn plan(args: &Args, dca: Address) -> Vec<Step> {
    let mut steps = Vec::new();
    if let Some(amount) = args.deposit {
        steps.push(Step {
            label: "approve DOC",
            request: TxRequest {
                to: args.doc_token,
                data: calls::approve_call(dca, amount),
            },
        });
        steps.push(Step {
            label: "depositDOC",
            request: TxRequest {
                to: dca,
                data: calls::deposit_doc_call(amount),
            },
        });
    }
    if let Some(secs) = args.period_secs {
        steps.push(Step {
            label: "setPurchasePeriod",
            request: TxRequest {
                to: dca,
                data: calls::set_purchase_period_call(U256::from(secs)),
            },
        });
    }
    if let Some(amount) = args.purchase {
        steps.push(Step {
            label: "setPurchaseAmount",
            request: TxRequest {
                to: dca,
                data: calls::set_purchase_amount_call(amount),
            },
        });
    }
    if args.withdraw_rbtc {
        steps.push(Step {
            label: "withdrawAccumulatedRbtc",
            request: TxRequest {
                to: dca,
                data: calls::withdraw_rbtc_call(),
            },
        });
    }
    if let Some(amount) = args.withdraw_doc {
        steps.push(Step {
            label: "withdrawDOC",
            request: TxRequest {
                to: dca,
                data: calls::withdraw_doc_call(amount),
            },
        });
    }
    steps
}

fn describe(error: &ChainError) -> &'static str {
    if error.is_network() {
        "node/network error"
    } else {
        "rejected by contract"
    }
}

/// Sends `steps` in order; the first failure stops the rest.
async fn run_steps<C>(client: &C, steps: Vec<Step>) -> Result<(), String>
where
    C: ChainClient + ?Sized,
{
    let total = steps.len();
    for (i, step) in steps.into_iter().enumerate() {
        let label = step.label;
        let outcome = match client.submit(step.request).await {
            Ok(pending) => {
                info!("[{}/{}] {}: sent {}", i + 1, total, label, pending.hash);
                client.await_inclusion(&pending).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(receipt) => info!(
                "[{}/{}] {}: included in block {}",
                i + 1,
                total,
                label,
                receipt.block_number
            ),
            Err(e) => return Err(format!("{label} failed ({}): {e}", describe(&e))),
        }
    }
    Ok(())
}

async fn print_status<C>(client: &C, dca: Address, doc_token: Address)
where
    C: ChainClient + ?Sized,
{
    let account = client.signer_address();
    info!("Account: {}", account);

    for view in ParticipantView::ALL {
        match client.call(dca, view.calldata()).await {
            Ok(raw) => match (view, calls::decode_uint(&raw)) {
                (ParticipantView::PurchasePeriod, Some(secs)) => {
                    info!("{}: {}s", view.label(), secs)
                }
                (_, Some(value)) => info!("{}: {}", view.label(), fmt_doc(value)),
                (_, None) => error!("{}: undecodable response", view.label()),
            },
            Err(e) => error!("{}: {}", view.label(), e),
        }
    }

    let allowance = client
        .call(doc_token, calls::allowance_call(account, dca))
        .await;
    match allowance {
        Ok(raw) => match calls::decode_uint(&raw) {
            Some(value) => info!("DOC allowance for DCA contract: {}", fmt_doc(value)),
            None => error!("DOC allowance: undecodable response"),
        },
        Err(e) => error!("DOC allowance: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    keeper::init_tracing();
    let args = Args::parse();

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let Some(dca) = config.contract_address else {
        error!("Invalid configuration: no contract address");
        std::process::exit(1);
    };

    let steps = plan(&args, dca);
    if steps.is_empty() && !args.status {
        error!(
            "Nothing to do: pass --deposit, --period-secs, --purchase, --withdraw-* or --status"
        );
        std::process::exit(2);
    }

    let signer = match SecretKey::from_env(USER_KEY_VAR).and_then(|k| k.signer(USER_KEY_VAR)) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load participant signer: {}", e);
            std::process::exit(1);
        }
    };
    let options = config.client_options();
    let client = match RpcChainClient::connect(&config.rpc_url, signer, options).await {
        Ok(c) => c,
        Err(e) => {
            error!("RPC connection failed ({}): {}", config.rpc_url, e);
            std::process::exit(1);
        }
    };
    info!(
        "Participant {} on {} (chain id {}), DCA contract {}",
        client.signer_address(),
        rbtc_dca::network_name(client.chain_id()).unwrap_or("unknown network"),
        client.chain_id(),
        dca
    );

    if !steps.is_empty() {
        if let Err(e) = run_steps(&client, steps).await {
            error!("Setup aborted: {}", e);
            std::process::exit(1);
        }
        info!("Setup complete");
    }

    if args.status {
        print_status(&client, dca, args.doc_token).await;
    }
}
