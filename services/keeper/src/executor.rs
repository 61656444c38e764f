//! Purchase Executor.
//!
//! Fans out one purchase per account and joins settle-all style: every
//! account yields exactly one [`SubmissionResult`] whatever its siblings do.
//! Within one account, submission happens before the inclusion wait.

use alloy::primitives::Address;
use futures::{future::join_all, stream, StreamExt};
use tracing::debug;

use crate::{chain::ChainClient, contract::DcaContract, report::SubmissionResult};

pub struct PurchaseExecutor<'a, C: ?Sized> {
    client: &'a C,
    contract: DcaContract,
    dry_run: bool,
    /// 0 = all accounts in flight at once.
    max_in_flight: usize,
}

impl<'a, C> PurchaseExecutor<'a, C>
where
    C: ChainClient + ?Sized,
{
    pub fn new(client: &'a C, contract: DcaContract) -> Self {
        Self {
            client,
            contract,
            dry_run: false,
            max_in_flight: 0,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// One result per input account; order is not significant.
    pub async fn execute_all(&self, accounts: &[Address]) -> Vec<SubmissionResult> {
        let attempts: Vec<_> = accounts
            .iter()
            .map(|&account| self.execute_one(account))
            .collect();
        if self.max_in_flight == 0 {
            join_all(attempts).await
        } else {
            stream::iter(attempts)
                .buffer_unordered(self.max_in_flight)
                .collect()
                .await
        }
    }

    async fn execute_one(&self, account: Address) -> SubmissionResult {
        let request = self.contract.purchase_request(account);

        if self.dry_run {
            return match self.client.preflight(&request).await {
                Ok(gas) => SubmissionResult::Simulated { account, gas },
                Err(e) => SubmissionResult::from_error(account, e),
            };
        }

        let pending = match self.client.submit(request).await {
            Ok(p) => p,
            Err(e) => return SubmissionResult::from_error(account, e),
        };
        debug!(account = %account, tx = %pending.hash, "purchase submitted, awaiting inclusion");

        match self.client.await_inclusion(&pending).await {
            Ok(receipt) => SubmissionResult::Confirmed {
                account,
                tx_hash: receipt.tx_hash,
                purchase: self.contract.purchase_event(&receipt.logs),
            },
            Err(e) => SubmissionResult::from_error(account, e),
        }
    }
}
