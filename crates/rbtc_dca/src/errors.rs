//! Typed decoding of revert payloads returned by the DCA contract.
//!
//! Nodes hand back the raw revert bytes in the JSON-RPC error `data` field.
//! The first four bytes select the error; custom errors are matched by
//! selector against both contract flavours, never by message text.

use std::fmt;

use alloy::{
    primitives::U256,
    sol_types::{Panic, Revert, SolError},
};

use crate::calls::{IDcaLegacy, IRbtcDca};

macro_rules! error_table {
    ($($ty:ty),* $(,)?) => {
        &[$((<$ty as SolError>::SELECTOR, <$ty as SolError>::SIGNATURE)),*]
    };
}

/// Every custom error either deployment can raise: `(selector, signature)`.
const KNOWN_ERRORS: &[([u8; 4], &str)] = error_table![
    // ── Current deployment ──────────────────────────────────────
    IRbtcDca::RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed,
    IRbtcDca::RbtcDca__CannotWithdrawRbtcBeforeBuying,
    IRbtcDca::RbtcDca__DepositAmountMustBeGreaterThanZero,
    IRbtcDca::RbtcDca__DocDepositFailed,
    IRbtcDca::RbtcDca__DocWithdrawalAmountExceedsBalance,
    IRbtcDca::RbtcDca__DocWithdrawalAmountMustBeGreaterThanZero,
    IRbtcDca::RbtcDca__DocWithdrawalFailed,
    IRbtcDca::RbtcDca__NotEnoughDocAllowanceForDcaContract,
    IRbtcDca::RbtcDca__OnlyMocProxyContractCanSendRbtcToDcaContract,
    IRbtcDca::RbtcDca__PurchaseAmountMustBeGreaterThanZero,
    IRbtcDca::RbtcDca__PurchaseAmountMustBeLowerThanHalfOfBalance,
    IRbtcDca::RbtcDca__PurchasePeriodMustBeGreaterThanZero,
    IRbtcDca::RbtcDca__RedeemDocRequestFailed,
    IRbtcDca::RbtcDca__RedeemFreeDocFailed,
    IRbtcDca::RbtcDca__rBtcWithdrawalFailed,
    IRbtcDca::OwnableInvalidOwner,
    IRbtcDca::OwnableUnauthorizedAccount,
    // ── Legacy deployment ───────────────────────────────────────
    IDcaLegacy::CannotBuyIfPurchasePeriodHasNotElapsed,
    IDcaLegacy::DepositAmountMustBeGreaterThanZero,
    IDcaLegacy::DocDepositFailed,
    IDcaLegacy::DocWithdrawalAmountExceedsBalance,
    IDcaLegacy::DocWithdrawalAmountMustBeGreaterThanZero,
    IDcaLegacy::DocWithdrawalFailed,
    IDcaLegacy::OnlyMocProxyContractCanSendRbtcToDcaContract,
    IDcaLegacy::PurchaseAmountMustBeGreaterThanZero,
    IDcaLegacy::PurchaseAmountMustBeLowerThanHalfOfBalance,
    IDcaLegacy::PurchasePeriodMustBeGreaterThanZero,
    IDcaLegacy::RedeemDocRequestFailed,
    IDcaLegacy::RedeemFreeDocFailed,
    IDcaLegacy::rBtcWithdrawalFailed,
];

/// Why the contract rejected a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// A custom error declared in the contract ABI, by name.
    Custom { name: &'static str },
    /// `Error(string)` from a `require` with a message.
    Message(String),
    /// `Panic(uint256)` raised by the compiler (overflow, bad index, ...).
    Panic(U256),
    /// Selector not in the ABI.
    Unknown { selector: [u8; 4] },
    /// Bare `revert()` or a node that withheld the payload.
    Empty,
}

impl RevertReason {
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Custom { name } => Some(*name),
            _ => None,
        }
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.name() == Some(name)
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { name } => f.write_str(name),
            Self::Message(msg) => write!(f, "Error({msg:?})"),
            Self::Panic(code) => write!(f, "Panic(0x{code:x})"),
            Self::Unknown { selector } => write!(
                f,
                "unknown error 0x{:02x}{:02x}{:02x}{:02x}",
                selector[0], selector[1], selector[2], selector[3]
            ),
            Self::Empty => write!(f, "reverted without reason"),
        }
    }
}

/// Decodes raw revert bytes into a [`RevertReason`].
pub fn decode_revert(data: &[u8]) -> RevertReason {
    if data.len() < 4 {
        return RevertReason::Empty;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    let body = &data[4..];

    if selector == Revert::SELECTOR {
        return match decode_abi_string(body) {
            Some(msg) => RevertReason::Message(msg),
            None => RevertReason::Unknown { selector },
        };
    }
    if selector == Panic::SELECTOR {
        return match body.get(..32) {
            Some(word) => RevertReason::Panic(U256::from_be_slice(word)),
            None => RevertReason::Unknown { selector },
        };
    }

    KNOWN_ERRORS
        .iter()
        .find(|(known, _)| *known == selector)
        .map(|(_, signature)| RevertReason::Custom {
            name: signature
                .split_once('(')
                .map_or(*signature, |(name, _)| name),
        })
        .unwrap_or(RevertReason::Unknown { selector })
}

/// Decodes a single ABI-encoded dynamic `string` argument.
fn decode_abi_string(body: &[u8]) -> Option<String> {
    let offset = usize::try_from(U256::from_be_slice(body.get(..32)?)).ok()?;
    let len_end = offset.checked_add(32)?;
    let len = usize::try_from(U256::from_be_slice(body.get(offset..len_end)?)).ok()?;
    let bytes = body.get(len_end..len_end.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}
