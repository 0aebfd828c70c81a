//! Seams between the bot and the ledger.
//!
//! Everything the core does against the chain goes through these two traits,
//! so ingestion, interpretation and scheduling run unchanged against
//! [`crate::HiveClient`] in production and [`crate::MemoryLedger`] in tests.

use std::future::Future;

use silentbot_core::{AccountInterests, ContentRef, Result};

use crate::types::{Action, Block, BroadcastOutcome, PostInfo};

/// Largest block range a node will serve in one request.
pub const MAX_BLOCK_BATCH: u64 = 100;

/// Read and write access to the ledger.
pub trait LedgerGateway: Send + Sync {
    /// Height of the newest block.
    fn head_height(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Up to `count` (at most [`MAX_BLOCK_BATCH`]) consecutive blocks
    /// starting at `start`. May return fewer than requested near the head.
    fn block_range(&self, start: u64, count: u64)
        -> impl Future<Output = Result<Vec<Block>>> + Send;

    /// Post metadata, or `None` if the post does not exist.
    fn get_post(&self, target: &ContentRef)
        -> impl Future<Output = Result<Option<PostInfo>>> + Send;

    /// Whether content exists at `author/permlink`.
    fn content_exists(&self, target: &ContentRef) -> impl Future<Output = Result<bool>> + Send;

    /// Follow list, community subscriptions and blacklist of an account.
    fn account_interests(&self, account: &str)
        -> impl Future<Output = Result<AccountInterests>> + Send;

    /// Sign and submit a single action.
    ///
    /// A vote the chain already holds comes back as
    /// [`BroadcastOutcome::Duplicate`], any other refusal as
    /// `Error::Rejected`.
    fn broadcast(&self, action: &Action) -> impl Future<Output = Result<BroadcastOutcome>> + Send;
}

/// Current voting capacity of an account.
pub trait CapacityOracle: Send + Sync {
    /// Percentage in `[0, 100]`.
    fn capacity(&self, account: &str) -> impl Future<Output = Result<f64>> + Send;
}
