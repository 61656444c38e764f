//! Keeper-level errors.

use crate::{chain::ChainError, config::ConfigError, resolver::ResolverError};

#[derive(Debug, thiserror::Error)]
pub enum KeeperError {
    /// Startup only: the keeper refuses to run.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Aborts the current tick; the next tick starts from scratch.
    #[error("account resolution failed: {0}")]
    Resolver(#[from] ResolverError),

    /// Startup only: the node could not be reached or identified.
    #[error("node unavailable: {0}")]
    Chain(#[from] ChainError),
}
