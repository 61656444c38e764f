//! One tick of the keeper: resolve accounts, execute purchases, classify
//! and log every outcome, aggregate a [`RunReport`].

use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    chain::ChainClient,
    classify::OutcomeClassifier,
    contract::DcaContract,
    error::KeeperError,
    executor::PurchaseExecutor,
    report::{OutcomeKind, RunReport, SubmissionResult},
    resolver::AccountResolver,
    scheduler::TickRunner,
};

pub struct PurchasePipeline<C> {
    client: C,
    contract: DcaContract,
    resolver: AccountResolver,
    classifier: OutcomeClassifier,
    dry_run: bool,
    max_in_flight: usize,
}

impl<C: ChainClient> PurchasePipeline<C> {
    pub fn new(
        client: C,
        contract: DcaContract,
        resolver: AccountResolver,
        classifier: OutcomeClassifier,
    ) -> Self {
        Self {
            client,
            contract,
            resolver,
            classifier,
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

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn tick(&self, tick: u64) -> Result<RunReport, KeeperError> {
        info!(tick, "Checking for due purchases");
        let accounts = self.resolver.list_accounts(&self.client).await?;
        info!(tick, accounts = accounts.len(), "Attempting purchases");

        let results = PurchaseExecutor::new(&self.client, self.contract)
            .dry_run(self.dry_run)
            .max_in_flight(self.max_in_flight)
            .execute_all(&accounts)
            .await;

        let mut report = RunReport::new(tick);
        for result in results {
            let kind = OutcomeKind::of(&result, &self.classifier);
            log_outcome(tick, &result, kind);
            report.record(result, kind);
        }
        Ok(report)
    }
}

#[async_trait]
impl<C: ChainClient> TickRunner for PurchasePipeline<C> {
    async fn run_tick(&self, tick: u64) -> Result<RunReport, KeeperError> {
        self.tick(tick).await
    }
}

fn log_outcome(tick: u64, result: &SubmissionResult, kind: OutcomeKind) {
    let account = result.account();
    match result {
        SubmissionResult::Confirmed {
            tx_hash,
            purchase: Some(bought),
            ..
        } => info!(
            tick,
            account = %account,
            tx = %tx_hash,
            doc = %bought.doc_amount,
            rbtc = %bought.rbtc_amount,
            "Purchase confirmed"
        ),
        SubmissionResult::Confirmed { tx_hash, .. } => {
            info!(tick, account = %account, tx = %tx_hash, "Purchase confirmed")
        }
        SubmissionResult::Simulated { gas, .. } => {
            info!(tick, account = %account, gas, "Purchase would succeed (dry run)")
        }
        SubmissionResult::Rejected { .. } if kind == OutcomeKind::NotYetEligible => {
            info!(tick, account = %account, "Purchase period not elapsed yet")
        }
        SubmissionResult::Rejected { reason, .. } => {
            error!(tick, account = %account, reason = %reason, "Purchase rejected by contract")
        }
        SubmissionResult::TransientError { cause, .. } => {
            error!(tick, account = %account, cause = %cause, "Purchase failed: node/network error")
        }
    }
}
