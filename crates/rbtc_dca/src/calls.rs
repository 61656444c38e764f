//! Calldata builders for the DCA contract and the DOC token.
//!
//! Only the subset of the ABI the keeper and the onboarding tool touch is
//! bound here. The purchase entry point differs between deployments, see
//! [`ContractFlavor`].

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

sol! {
    /// Current deployment: `buyRbtc`, `getUsers`, `RbtcDca__` prefixed errors.
    #[allow(missing_docs)]
    interface IRbtcDca {
        error RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed();
        error RbtcDca__CannotWithdrawRbtcBeforeBuying();
        error RbtcDca__DepositAmountMustBeGreaterThanZero();
        error RbtcDca__DocDepositFailed();
        error RbtcDca__DocWithdrawalAmountExceedsBalance();
        error RbtcDca__DocWithdrawalAmountMustBeGreaterThanZero();
        error RbtcDca__DocWithdrawalFailed();
        error RbtcDca__NotEnoughDocAllowanceForDcaContract();
        error RbtcDca__OnlyMocProxyContractCanSendRbtcToDcaContract();
        error RbtcDca__PurchaseAmountMustBeGreaterThanZero();
        error RbtcDca__PurchaseAmountMustBeLowerThanHalfOfBalance();
        error RbtcDca__PurchasePeriodMustBeGreaterThanZero();
        error RbtcDca__RedeemDocRequestFailed();
        error RbtcDca__RedeemFreeDocFailed();
        error RbtcDca__rBtcWithdrawalFailed();
        error OwnableInvalidOwner(address owner);
        error OwnableUnauthorizedAccount(address account);

        event RbtcBought(address indexed user, uint256 docAmount, uint256 rbtcAmount);

        function buyRbtc(address buyer) external;
        function getUsers() external view returns (address[] memory);
        function depositDOC(uint256 depositAmount) external;
        function withdrawDOC(uint256 withdrawalAmount) external;
        function withdrawAccumulatedRbtc() external;
        function setPurchaseAmount(uint256 purchaseAmount) external;
        function setPurchasePeriod(uint256 purchasePeriod) external;
        function getDocBalance() external view returns (uint256);
        function getRbtcBalance() external view returns (uint256);
        function getPurchaseAmount() external view returns (uint256);
        function getPurchasePeriod() external view returns (uint256);
    }

    /// First deployment: `buy`, no registered-user list, unprefixed errors.
    #[allow(missing_docs)]
    interface IDcaLegacy {
        error CannotBuyIfPurchasePeriodHasNotElapsed();
        error DepositAmountMustBeGreaterThanZero();
        error DocDepositFailed();
        error DocWithdrawalAmountExceedsBalance();
        error DocWithdrawalAmountMustBeGreaterThanZero();
        error DocWithdrawalFailed();
        error OnlyMocProxyContractCanSendRbtcToDcaContract();
        error PurchaseAmountMustBeGreaterThanZero();
        error PurchaseAmountMustBeLowerThanHalfOfBalance();
        error PurchasePeriodMustBeGreaterThanZero();
        error RedeemDocRequestFailed();
        error RedeemFreeDocFailed();
        error rBtcWithdrawalFailed();

        function buy(address buyer) external;
    }

    #[allow(missing_docs)]
    interface IDocToken {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address who) external view returns (uint256);
    }
}

/// Which deployment of the DCA contract the keeper talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFlavor {
    #[default]
    RbtcDca,
    Legacy,
}

impl ContractFlavor {
    /// Name of the custom error the contract raises when an account's
    /// purchase period has not elapsed yet.
    pub fn not_elapsed_error(self) -> &'static str {
        match self {
            Self::RbtcDca => "RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed",
            Self::Legacy => "CannotBuyIfPurchasePeriodHasNotElapsed",
        }
    }

    /// Whether the deployment exposes `getUsers()`.
    pub fn has_user_registry(self) -> bool {
        matches!(self, Self::RbtcDca)
    }

    pub fn purchase_call(self, buyer: Address) -> Bytes {
        match self {
            Self::RbtcDca => IRbtcDca::buyRbtcCall { buyer }.abi_encode().into(),
            Self::Legacy => IDcaLegacy::buyCall { buyer }.abi_encode().into(),
        }
    }
}

impl std::str::FromStr for ContractFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rbtc_dca" | "rbtcdca" | "current" => Ok(Self::RbtcDca),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown contract flavor: {other}")),
        }
    }
}

pub fn get_users_call() -> Bytes {
    IRbtcDca::getUsersCall {}.abi_encode().into()
}

pub fn decode_users(returndata: &[u8]) -> Result<Vec<Address>, alloy::sol_types::Error> {
    IRbtcDca::getUsersCall::abi_decode_returns(returndata)
}

// ── Participant calls (onboarding) ──────────────────────────────

pub fn approve_call(spender: Address, amount: U256) -> Bytes {
    IDocToken::approveCall { spender, amount }.abi_encode().into()
}

pub fn allowance_call(owner: Address, spender: Address) -> Bytes {
    IDocToken::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn deposit_doc_call(deposit_amount: U256) -> Bytes {
    IRbtcDca::depositDOCCall {
        depositAmount: deposit_amount,
    }
    .abi_encode()
    .into()
}

pub fn withdraw_doc_call(withdrawal_amount: U256) -> Bytes {
    IRbtcDca::withdrawDOCCall {
        withdrawalAmount: withdrawal_amount,
    }
    .abi_encode()
    .into()
}

pub fn withdraw_rbtc_call() -> Bytes {
    IRbtcDca::withdrawAccumulatedRbtcCall {}.abi_encode().into()
}

pub fn set_purchase_period_call(seconds: U256) -> Bytes {
    IRbtcDca::setPurchasePeriodCall {
        purchasePeriod: seconds,
    }
    .abi_encode()
    .into()
}

pub fn set_purchase_amount_call(amount: U256) -> Bytes {
    IRbtcDca::setPurchaseAmountCall {
        purchaseAmount: amount,
    }
    .abi_encode()
    .into()
}

/// View reads that return a single `uint256` for the calling account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantView {
    DocBalance,
    RbtcBalance,
    PurchaseAmount,
    PurchasePeriod,
}

impl ParticipantView {
    pub const ALL: [Self; 4] = [
        Self::DocBalance,
        Self::RbtcBalance,
        Self::PurchaseAmount,
        Self::PurchasePeriod,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::DocBalance => "DOC balance",
            Self::RbtcBalance => "rBTC balance",
            Self::PurchaseAmount => "purchase amount",
            Self::PurchasePeriod => "purchase period",
        }
    }

    pub fn calldata(self) -> Bytes {
        let encoded = match self {
            Self::DocBalance => IRbtcDca::getDocBalanceCall {}.abi_encode(),
            Self::RbtcBalance => IRbtcDca::getRbtcBalanceCall {}.abi_encode(),
            Self::PurchaseAmount => IRbtcDca::getPurchaseAmountCall {}.abi_encode(),
            Self::PurchasePeriod => IRbtcDca::getPurchasePeriodCall {}.abi_encode(),
        };
        encoded.into()
    }
}

/// Decodes a single `uint256` return word.
pub fn decode_uint(returndata: &[u8]) -> Option<U256> {
    if returndata.len() < 32 {
        return None;
    }
    Some(U256::from_be_slice(&returndata[..32]))
}
