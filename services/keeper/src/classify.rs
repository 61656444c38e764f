//! Outcome Classifier.
//!
//! Exactly one failure is expected during normal operation: the contract
//! refusing a purchase because the account's period has not elapsed. It is
//! recognised by decoded custom-error name, compared exactly. Every other
//! failure is abnormal and goes to the operator log.

use rbtc_dca::RevertReason;

use crate::chain::ChainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedReason {
    NotYetEligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbnormalKind {
    /// Any other named (or unnamed) on-chain revert.
    ContractRejected,
    /// Unreachable node, timeout, malformed response, node refusal.
    NetworkError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Expected(ExpectedReason),
    Abnormal(AbnormalKind),
}

impl Classification {
    pub fn is_expected(self) -> bool {
        matches!(self, Self::Expected(_))
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeClassifier {
    not_elapsed_error: String,
}

impl OutcomeClassifier {
    /// `not_elapsed_error` is the contract's custom-error name, e.g.
    /// `RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed`.
    pub fn new(not_elapsed_error: impl Into<String>) -> Self {
        Self {
            not_elapsed_error: not_elapsed_error.into(),
        }
    }

    pub fn not_elapsed_error(&self) -> &str {
        &self.not_elapsed_error
    }

    pub fn classify_revert(&self, reason: &RevertReason) -> Classification {
        if reason.is_custom(&self.not_elapsed_error) {
            Classification::Expected(ExpectedReason::NotYetEligible)
        } else {
            Classification::Abnormal(AbnormalKind::ContractRejected)
        }
    }

    pub fn classify(&self, error: &ChainError) -> Classification {
        match error {
            ChainError::Revert(reason) => self.classify_revert(reason),
            _ => Classification::Abnormal(AbnormalKind::NetworkError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolError;
    use rbtc_dca::{
        calls::{IDcaLegacy, IRbtcDca},
        decode_revert,
    };

    fn classifier() -> OutcomeClassifier {
        OutcomeClassifier::new("RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed")
    }

    fn revert_of(selector: [u8; 4]) -> ChainError {
        ChainError::Revert(decode_revert(&selector))
    }

    #[test]
    fn test_not_elapsed_is_expected() {
        let err = revert_of(IRbtcDca::RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed::SELECTOR);
        assert_eq!(
            classifier().classify(&err),
            Classification::Expected(ExpectedReason::NotYetEligible)
        );
    }

    #[test]
    fn test_other_flavor_name_does_not_match() {
        let err = revert_of(IDcaLegacy::CannotBuyIfPurchasePeriodHasNotElapsed::SELECTOR);
        assert_eq!(
            classifier().classify(&err),
            Classification::Abnormal(AbnormalKind::ContractRejected)
        );

        let legacy = OutcomeClassifier::new("CannotBuyIfPurchasePeriodHasNotElapsed");
        assert!(legacy.classify(&err).is_expected());
    }

    #[test]
    fn test_allowance_and_balance_errors_are_abnormal() {
        for selector in [
            IRbtcDca::RbtcDca__NotEnoughDocAllowanceForDcaContract::SELECTOR,
            IRbtcDca::RbtcDca__PurchaseAmountMustBeLowerThanHalfOfBalance::SELECTOR,
        ] {
            assert_eq!(
                classifier().classify(&revert_of(selector)),
                Classification::Abnormal(AbnormalKind::ContractRejected)
            );
        }
    }

    #[test]
    fn test_unnamed_reverts_are_abnormal() {
        for reason in [
            RevertReason::Empty,
            RevertReason::Message("RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed".into()),
            RevertReason::Unknown {
                selector: [1, 2, 3, 4],
            },
        ] {
            assert_eq!(
                classifier().classify_revert(&reason),
                Classification::Abnormal(AbnormalKind::ContractRejected)
            );
        }
    }

    #[test]
    fn test_network_failures_are_abnormal() {
        for err in [
            ChainError::Transport("connection refused".into()),
            ChainError::Timeout {
                waiting_for: "inclusion".into(),
                after: None,
            },
            ChainError::Malformed("bad json".into()),
            ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas".into(),
            },
        ] {
            assert_eq!(
                classifier().classify(&err),
                Classification::Abnormal(AbnormalKind::NetworkError)
            );
        }
    }
}
