//! Per-account results and the per-tick aggregate.

use std::fmt;

use alloy::primitives::{Address, B256};
use rbtc_dca::{RbtcBought, RevertReason};

use crate::{
    chain::ChainError,
    classify::{AbnormalKind, Classification, OutcomeClassifier},
};

/// Outcome of one account's purchase attempt within a tick.
#[derive(Debug, Clone)]
pub enum SubmissionResult {
    Confirmed {
        account: Address,
        tx_hash: B256,
        /// Decoded from the receipt when the contract emitted it.
        purchase: Option<RbtcBought>,
    },
    /// Dry run: the purchase would have been accepted.
    Simulated { account: Address, gas: u64 },
    Rejected {
        account: Address,
        reason: RevertReason,
    },
    TransientError { account: Address, cause: ChainError },
}

impl SubmissionResult {
    pub fn from_error(account: Address, error: ChainError) -> Self {
        match error {
            ChainError::Revert(reason) => Self::Rejected { account, reason },
            cause => Self::TransientError { account, cause },
        }
    }

    pub fn account(&self) -> Address {
        match self {
            Self::Confirmed { account, .. }
            | Self::Simulated { account, .. }
            | Self::Rejected { account, .. }
            | Self::TransientError { account, .. } => *account,
        }
    }
}

/// Where a result lands in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Confirmed,
    WouldPurchase,
    NotYetEligible,
    ContractRejected,
    NetworkError,
}

impl OutcomeKind {
    pub fn of(result: &SubmissionResult, classifier: &OutcomeClassifier) -> Self {
        match result {
            SubmissionResult::Confirmed { .. } => Self::Confirmed,
            SubmissionResult::Simulated { .. } => Self::WouldPurchase,
            SubmissionResult::Rejected { reason, .. } => classifier.classify_revert(reason).into(),
            SubmissionResult::TransientError { cause, .. } => classifier.classify(cause).into(),
        }
    }

    pub fn is_abnormal(self) -> bool {
        matches!(self, Self::ContractRejected | Self::NetworkError)
    }
}

impl From<Classification> for OutcomeKind {
    fn from(c: Classification) -> Self {
        match c {
            Classification::Expected(_) => Self::NotYetEligible,
            Classification::Abnormal(AbnormalKind::ContractRejected) => Self::ContractRejected,
            Classification::Abnormal(AbnormalKind::NetworkError) => Self::NetworkError,
        }
    }
}

/// Aggregate for one tick. Created at tick start, logged at tick end.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub tick: u64,
    pub confirmed: Vec<(Address, B256)>,
    pub would_purchase: Vec<Address>,
    pub not_yet_eligible: Vec<Address>,
    pub rejected: Vec<(Address, RevertReason)>,
    pub errors: Vec<(Address, ChainError)>,
}

impl RunReport {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: SubmissionResult, kind: OutcomeKind) {
        match result {
            SubmissionResult::Confirmed {
                account, tx_hash, ..
            } => self.confirmed.push((account, tx_hash)),
            SubmissionResult::Simulated { account, .. } => self.would_purchase.push(account),
            SubmissionResult::Rejected { account, .. } if kind == OutcomeKind::NotYetEligible => {
                self.not_yet_eligible.push(account)
            }
            SubmissionResult::Rejected { account, reason } => self.rejected.push((account, reason)),
            SubmissionResult::TransientError { account, cause } => {
                self.errors.push((account, cause))
            }
        }
    }

    /// Number of accounts accounted for.
    pub fn total(&self) -> usize {
        self.confirmed.len()
            + self.would_purchase.len()
            + self.not_yet_eligible.len()
            + self.rejected.len()
            + self.errors.len()
    }

    pub fn abnormal(&self) -> usize {
        self.rejected.len() + self.errors.len()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick #{}: {} account(s), confirmed={} not_yet_eligible={} rejected={} errors={}",
            self.tick,
            self.total(),
            self.confirmed.len(),
            self.not_yet_eligible.len(),
            self.rejected.len(),
            self.errors.len(),
        )?;
        if !self.would_purchase.is_empty() {
            write!(f, " would_purchase={}", self.would_purchase.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolError;
    use rbtc_dca::{calls::IRbtcDca, decode_revert};

    const A: Address = Address::repeat_byte(0xaa);
    const B: Address = Address::repeat_byte(0xbb);
    const C: Address = Address::repeat_byte(0xcc);

    fn classifier() -> OutcomeClassifier {
        OutcomeClassifier::new("RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed")
    }

    fn record(report: &mut RunReport, result: SubmissionResult) {
        let kind = OutcomeKind::of(&result, &classifier());
        report.record(result, kind);
    }

    #[test]
    fn test_from_error_splits_reverts() {
        let r = SubmissionResult::from_error(A, ChainError::Revert(RevertReason::Empty));
        assert!(matches!(r, SubmissionResult::Rejected { .. }));
        let r = SubmissionResult::from_error(B, ChainError::Transport("refused".into()));
        assert!(matches!(r, SubmissionResult::TransientError { .. }));
        assert_eq!(r.account(), B);
    }

    #[test]
    fn test_record_buckets() {
        let not_elapsed =
            decode_revert(&IRbtcDca::RbtcDca__CannotBuyIfPurchasePeriodHasNotElapsed::SELECTOR);
        let no_allowance =
            decode_revert(&IRbtcDca::RbtcDca__NotEnoughDocAllowanceForDcaContract::SELECTOR);

        let mut report = RunReport::new(4);
        record(
            &mut report,
            SubmissionResult::Confirmed {
                account: A,
                tx_hash: B256::repeat_byte(1),
                purchase: None,
            },
        );
        record(
            &mut report,
            SubmissionResult::Rejected {
                account: B,
                reason: not_elapsed,
            },
        );
        record(
            &mut report,
            SubmissionResult::Rejected {
                account: C,
                reason: no_allowance,
            },
        );
        record(
            &mut report,
            SubmissionResult::TransientError {
                account: A,
                cause: ChainError::Transport("refused".into()),
            },
        );

        assert_eq!(report.total(), 4);
        assert_eq!(report.confirmed, vec![(A, B256::repeat_byte(1))]);
        assert_eq!(report.not_yet_eligible, vec![B]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.abnormal(), 2);
        assert_eq!(
            report.to_string(),
            "tick #4: 4 account(s), confirmed=1 not_yet_eligible=1 rejected=1 errors=1"
        );
    }

    #[test]
    fn test_simulated_counts_separately() {
        let mut report = RunReport::new(1);
        record(&mut report, SubmissionResult::Simulated { account: A, gas: 90_000 });
        assert!(report.confirmed.is_empty());
        assert_eq!(report.would_purchase, vec![A]);
        assert!(report.to_string().ends_with("would_purchase=1"));
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::new(0);
        assert_eq!(report.total(), 0);
        assert_eq!(report.abnormal(), 0);
    }
}
