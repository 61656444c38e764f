//! Keeper configuration.
//!
//! Built-in defaults, then an optional JSON file named by `KEEPER_CONFIG`,
//! then environment variables. The signer key is read from the environment
//! only and never serialized.

use std::{fmt, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use rbtc_dca::{ContractFlavor, DEFAULT_RPC_URL};
use serde::{Deserialize, Serialize};

use crate::{chain::ClientOptions, resolver::AccountSource, scheduler::Schedule};

/// Environment variable holding the keeper's signing key.
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("no DCA contract address configured (set DCA_CONTRACT_ADDRESS)")]
    MissingContract,

    #[error("schedule interval must be at least one second")]
    ZeroInterval,

    #[error("contract flavor {0:?} has no user registry; set USER_ADDRESSES")]
    NoRegistry(ContractFlavor),

    #[error("gas multiplier must be at least 100%, got {0}%")]
    GasMultiplier(u64),

    #[error("{0} is not set")]
    MissingKey(&'static str),

    #[error("{0} is not a valid private key")]
    InvalidKey(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub rpc_url: String,
    pub contract_address: Option<Address>,
    pub flavor: ContractFlavor,
    pub account_source: AccountSource,
    pub schedule: Schedule,
    /// Overrides the flavour's "period not elapsed" error name.
    pub not_elapsed_error: Option<String>,
    /// 0 = unbounded fan-out.
    pub max_in_flight: usize,
    pub inclusion_timeout_secs: u64,
    pub receipt_poll_ms: u64,
    pub rpc_timeout_secs: u64,
    pub gas_multiplier_pct: u64,
    /// Preflight purchases without sending them.
    pub dry_run: bool,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            contract_address: None,
            flavor: ContractFlavor::RbtcDca,
            account_source: AccountSource::Contract,
            schedule: Schedule::default(),
            not_elapsed_error: None,
            max_in_flight: 0,
            inclusion_timeout_secs: 120,
            receipt_poll_ms: 2_000,
            rpc_timeout_secs: 30,
            gas_multiplier_pct: 120,
            dry_run: false,
        }
    }
}

impl KeeperConfig {
    /// Layers `file` (JSON contents) and `env` over the defaults, then
    /// validates.
    pub fn from_sources<F>(file: Option<(&str, &str)>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some((path, contents)) => {
                serde_json::from_str::<Self>(contents).map_err(|source| ConfigError::Parse {
                    path: path.to_string(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = var("RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(addr) = var("DCA_CONTRACT_ADDRESS") {
            self.contract_address = Some(parse_address("DCA_CONTRACT_ADDRESS", &addr)?);
        }
        if let Some(flavor) = var("DCA_FLAVOR") {
            self.flavor = flavor.parse().map_err(|reason| ConfigError::InvalidVar {
                name: "DCA_FLAVOR",
                reason,
            })?;
        }
        if let Some(list) = var("USER_ADDRESSES") {
            let accounts = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_address("USER_ADDRESSES", s))
                .collect::<Result<Vec<_>, _>>()?;
            self.account_source = AccountSource::Static(accounts);
        }
        if let Some(secs) = var("SCHEDULE_INTERVAL_SECS") {
            self.schedule.interval_secs = parse_num("SCHEDULE_INTERVAL_SECS", &secs)?;
        }
        if let Some(align) = var("SCHEDULE_ALIGN") {
            self.schedule.align_to_wall_clock = parse_flag("SCHEDULE_ALIGN", &align)?;
        }
        if let Some(name) = var("NOT_ELAPSED_ERROR") {
            self.not_elapsed_error = Some(name);
        }
        if let Some(n) = var("MAX_IN_FLIGHT") {
            self.max_in_flight = parse_num("MAX_IN_FLIGHT", &n)?;
        }
        if let Some(secs) = var("INCLUSION_TIMEOUT_SECS") {
            self.inclusion_timeout_secs = parse_num("INCLUSION_TIMEOUT_SECS", &secs)?;
        }
        if let Some(flag) = var("DRY_RUN") {
            self.dry_run = parse_flag("DRY_RUN", &flag)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contract_address.is_none() {
            return Err(ConfigError::MissingContract);
        }
        if self.schedule.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.account_source == AccountSource::Contract && !self.flavor.has_user_registry() {
            return Err(ConfigError::NoRegistry(self.flavor));
        }
        if self.gas_multiplier_pct < 100 {
            return Err(ConfigError::GasMultiplier(self.gas_multiplier_pct));
        }
        Ok(())
    }

    /// Custom-error name treated as "not yet eligible".
    pub fn not_elapsed_error(&self) -> &str {
        self.not_elapsed_error
            .as_deref()
            .unwrap_or_else(|| self.flavor.not_elapsed_error())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs.max(1)),
            inclusion_timeout: Duration::from_secs(self.inclusion_timeout_secs.max(1)),
            receipt_poll: Duration::from_millis(self.receipt_poll_ms.max(100)),
            gas_multiplier_pct: self.gas_multiplier_pct,
        }
    }
}

/// Loads from the process environment, honouring `KEEPER_CONFIG`.
pub fn load_config() -> Result<KeeperConfig, ConfigError> {
    let env = |name: &str| std::env::var(name).ok();
    match env("KEEPER_CONFIG").filter(|p| !p.is_empty()) {
        Some(path) => {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            KeeperConfig::from_sources(Some((&path, &contents)), env)
        }
        None => KeeperConfig::from_sources(None, env),
    }
}

/// A private key that never shows up in `Debug` output.
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn from_env(var: &'static str) -> Result<Self, ConfigError> {
        std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self)
            .ok_or(ConfigError::MissingKey(var))
    }

    pub fn signer(&self, var: &'static str) -> Result<PrivateKeySigner, ConfigError> {
        self.0
            .parse::<PrivateKeySigner>()
            .map_err(|_| ConfigError::InvalidKey(var))
    }
}

impl From<String> for SecretKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.parse::<Address>().map_err(|e| ConfigError::InvalidVar {
        name,
        reason: format!("{value}: {e}"),
    })
}

fn parse_num<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidVar {
        name,
        reason: format!("{value}: {e}"),
    })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        other => Err(ConfigError::InvalidVar {
            name,
            reason: format!("{other} is not a boolean"),
        }),
    }
}
