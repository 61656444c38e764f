//! rBTC DCA keeper.
//!
//! Periodically triggers purchases on the DCA contract for every eligible
//! account.
//!
//! # Architecture
//!
//! 1. [`scheduler`] fires a tick on a fixed cadence, never overlapping
//! 2. [`resolver`] lists accounts (contract `getUsers()` or a static list)
//! 3. [`executor`] submits one purchase per account through [`chain`] and
//!    awaits inclusion, settle-all
//! 4. [`classify`] separates "period not elapsed" from abnormal failures
//! 5. [`report`] aggregates the tick for the log

pub mod chain;
pub mod classify;
pub mod config;
pub mod contract;
pub mod error;
pub mod executor;
pub mod nonce;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod rpc;
pub mod scheduler;

pub use chain::{
    ChainClient, ChainError, ClientOptions, PendingTx, Receipt, RpcChainClient, TxRequest,
};
pub use config::{load_config, KeeperConfig};
pub use error::KeeperError;
pub use pipeline::PurchasePipeline;
pub use report::{RunReport, SubmissionResult};
pub use scheduler::{Schedule, Scheduler};

/// Installs the `tracing` subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
