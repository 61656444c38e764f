//! Nonce sequencing for a single signer shared by concurrent submissions.
//!
//! The slot is held from reservation until the raw transaction has been
//! handed to the node, so nonces are assigned and broadcast in order.

use std::future::Future;

use tokio::sync::{Mutex, MutexGuard};

use crate::chain::ChainError;

#[derive(Debug, Default)]
pub struct NonceManager {
    next: Mutex<Option<u64>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of the signer's nonce sequence.
    pub async fn lock(&self) -> NonceSlot<'_> {
        NonceSlot {
            next: self.next.lock().await,
        }
    }

    /// Drops the cached value so the next reservation asks the node.
    ///
    /// Called when a sent transaction never showed up: the node may have
    /// dropped it, and counting past it would leave every later nonce
    /// stuck behind the gap.
    pub async fn resync(&self) {
        *self.next.lock().await = None;
    }
}

pub struct NonceSlot<'a> {
    next: MutexGuard<'a, Option<u64>>,
}

impl NonceSlot<'_> {
    /// Next unused nonce, fetched from the node with `fetch` when nothing is
    /// cached yet or after [`invalidate`](Self::invalidate).
    pub async fn reserve<F, Fut>(&mut self, fetch: F) -> Result<u64, ChainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, ChainError>>,
    {
        if let Some(n) = *self.next {
            return Ok(n);
        }
        let n = fetch().await?;
        *self.next = Some(n);
        Ok(n)
    }

    /// Records that `used` reached the node.
    pub fn commit(&mut self, used: u64) {
        *self.next = Some(used.saturating_add(1));
    }

    /// Forgets the cached value; the next reservation asks the node again.
    pub fn invalidate(&mut self) {
        *self.next = None;
    }
}
