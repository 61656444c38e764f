//! # rbtc_dca
//!
//! Pinned bindings for the rBTC dollar-cost-averaging contract and the DOC
//! stablecoin it spends. Calldata builders, custom-error decoding and event
//! decoding only; transport lives in the keeper service.

pub mod calls;
pub mod constants;
pub mod errors;
pub mod events;

pub use calls::ContractFlavor;
pub use constants::*;
pub use errors::{decode_revert, RevertReason};
pub use events::RbtcBought;
