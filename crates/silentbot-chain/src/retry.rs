//! Fixed-delay retry around a gateway.
//!
//! Only transient failures are retried, reads and broadcasts alike. A
//! refusal or a malformed answer will not change by asking again, so it is
//! handed back to the caller at once.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use silentbot_core::{AccountInterests, ContentRef, Result};

use crate::gateway::{CapacityOracle, LedgerGateway};
use crate::types::{Action, Block, BroadcastOutcome, PostInfo};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct Retrying<G> {
    inner: G,
    delay: Duration,
}

impl<G> Retrying<G> {
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn read<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    warn!("{} failed (attempt {}): {}; retrying", what, attempt, e);
                    tokio::time::sleep(self.delay).await;
                }
                other => return other,
            }
        }
    }
}

impl<G: LedgerGateway> LedgerGateway for Retrying<G> {
    async fn head_height(&self) -> Result<u64> {
        self.read("head_height", || self.inner.head_height()).await
    }

    async fn block_range(&self, start: u64, count: u64) -> Result<Vec<Block>> {
        self.read("block_range", || self.inner.block_range(start, count))
            .await
    }

    async fn get_post(&self, target: &ContentRef) -> Result<Option<PostInfo>> {
        self.read("get_post", || self.inner.get_post(target)).await
    }

    async fn content_exists(&self, target: &ContentRef) -> Result<bool> {
        self.read("content_exists", || self.inner.content_exists(target))
            .await
    }

    async fn account_interests(&self, account: &str) -> Result<AccountInterests> {
        self.read("account_interests", || self.inner.account_interests(account))
            .await
    }

    async fn broadcast(&self, action: &Action) -> Result<BroadcastOutcome> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.broadcast(action).await {
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    warn!(
                        "{} by {} failed (attempt {}): {}; retrying",
                        action.name(),
                        action.signer(),
                        attempt,
                        e
                    );
                    tokio::time::sleep(self.delay).await;
                }
                other => return other,
            }
        }
    }
}

impl<G: CapacityOracle> CapacityOracle for Retrying<G> {
    async fn capacity(&self, account: &str) -> Result<f64> {
        self.read("capacity", || self.inner.capacity(account)).await
    }
}
