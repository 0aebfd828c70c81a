//! Deterministic in-memory ledger.
//!
//! Implements both gateway traits over plain maps so ingestion, commands and
//! scheduling can be exercised without a node. Failures are scripted with
//! [`MemoryLedger::fail_next`] and [`MemoryLedger::fail_next_broadcast`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use silentbot_core::{AccountInterests, ContentRef, Error, Result};

use crate::gateway::{CapacityOracle, LedgerGateway, MAX_BLOCK_BATCH};
use crate::types::{Action, Block, BroadcastOutcome, CommentOperation, PostInfo, VoteOperation};

#[derive(Default)]
struct LedgerState {
    blocks: BTreeMap<u64, Block>,
    posts: HashMap<ContentRef, PostInfo>,
    contents: HashSet<ContentRef>,
    capacity: HashMap<String, f64>,
    interests: HashMap<String, AccountInterests>,
    votes: Vec<VoteOperation>,
    comments: Vec<CommentOperation>,
    failures: VecDeque<Error>,
    broadcast_failures: VecDeque<Error>,
    capacity_reads: usize,
}

impl LedgerState {
    fn head(&self) -> u64 {
        self.blocks.keys().next_back().copied().unwrap_or(0)
    }

    fn take_failure(&mut self) -> Result<()> {
        match self.failures.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Capacity reported for accounts without an explicit value.
pub const DEFAULT_CAPACITY: f64 = 100.0;

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Append a block at `head + 1` and return its height.
    pub fn push_block(&self, block: Block) -> u64 {
        let mut state = self.state.lock();
        let height = state.head() + 1;
        state.blocks.insert(height, block);
        height
    }

    /// Extend the chain with empty blocks up to `height`, stamped with the
    /// time of the current head (or the epoch on an empty chain).
    pub fn set_head(&self, height: u64) {
        let mut state = self.state.lock();
        let head = state.head();
        let time = state.blocks.get(&head).map(Block::time).unwrap_or(0);
        for h in head + 1..=height {
            state.blocks.insert(h, Block::new(time, Vec::new()));
        }
    }

    /// Register a post; it also becomes visible to existence checks.
    pub fn add_post(&self, post: PostInfo) {
        let mut state = self.state.lock();
        state.contents.insert(post.target.clone());
        state.posts.insert(post.target.clone(), post);
    }

    pub fn add_content(&self, target: ContentRef) {
        self.state.lock().contents.insert(target);
    }

    pub fn set_capacity(&self, account: &str, capacity: f64) {
        self.state
            .lock()
            .capacity
            .insert(account.to_string(), capacity);
    }

    pub fn set_interests(&self, account: &str, interests: AccountInterests) {
        self.state
            .lock()
            .interests
            .insert(account.to_string(), interests);
    }

    /// The next call of any kind fails with `error`.
    pub fn fail_next(&self, error: Error) {
        self.state.lock().failures.push_back(error);
    }

    /// The next broadcast fails with `error`.
    pub fn fail_next_broadcast(&self, error: Error) {
        self.state.lock().broadcast_failures.push_back(error);
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn votes(&self) -> Vec<VoteOperation> {
        self.state.lock().votes.clone()
    }

    pub fn votes_by(&self, voter: &str) -> Vec<VoteOperation> {
        self.state
            .lock()
            .votes
            .iter()
            .filter(|v| v.voter == voter)
            .cloned()
            .collect()
    }

    pub fn comments(&self) -> Vec<CommentOperation> {
        self.state.lock().comments.clone()
    }

    pub fn pending_failures(&self) -> usize {
        let state = self.state.lock();
        state.failures.len() + state.broadcast_failures.len()
    }

    pub fn capacity_reads(&self) -> usize {
        self.state.lock().capacity_reads
    }
}

impl LedgerGateway for MemoryLedger {
    async fn head_height(&self) -> Result<u64> {
        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state.head())
    }

    async fn block_range(&self, start: u64, count: u64) -> Result<Vec<Block>> {
        let mut state = self.state.lock();
        state.take_failure()?;
        let end = start.saturating_add(count.min(MAX_BLOCK_BATCH));
        Ok(state
            .blocks
            .range(start..end)
            .map(|(_, block)| block.clone())
            .collect())
    }

    async fn get_post(&self, target: &ContentRef) -> Result<Option<PostInfo>> {
        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state.posts.get(target).cloned())
    }

    async fn content_exists(&self, target: &ContentRef) -> Result<bool> {
        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state.contents.contains(target))
    }

    async fn account_interests(&self, account: &str) -> Result<AccountInterests> {
        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state.interests.get(account).cloned().unwrap_or_default())
    }

    async fn broadcast(&self, action: &Action) -> Result<BroadcastOutcome> {
        let mut state = self.state.lock();
        state.take_failure()?;
        if let Some(e) = state.broadcast_failures.pop_front() {
            return Err(e);
        }
        match action {
            Action::Vote(vote) => {
                if state.votes.contains(vote) {
                    return Ok(BroadcastOutcome::Duplicate);
                }
                state.votes.push(vote.clone());
            }
            Action::Comment(comment) => {
                state.contents.insert(comment.content());
                state.comments.push(comment.clone());
            }
        }
        Ok(BroadcastOutcome::Accepted)
    }
}

impl CapacityOracle for MemoryLedger {
    async fn capacity(&self, account: &str) -> Result<f64> {
        let mut state = self.state.lock();
        state.take_failure()?;
        state.capacity_reads += 1;
        Ok(state
            .capacity
            .get(account)
            .copied()
            .unwrap_or(DEFAULT_CAPACITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_block_range_is_bounded_by_head() {
        let ledger = MemoryLedger::new();
        ledger.push_block(Block::new(1_000, Vec::new()));
        ledger.set_head(5);
        assert_eq!(ledger.head_height().await.unwrap(), 5);

        let blocks = ledger.block_range(3, 10).await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.time() == 1_000));
        assert!(ledger.block_range(6, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_vote_is_duplicate() {
        let ledger = MemoryLedger::new();
        let vote = Action::Vote(VoteOperation {
            voter: "bot".into(),
            author: "alice".into(),
            permlink: "post".into(),
            weight: 500,
        });
        assert_eq!(ledger.broadcast(&vote).await.unwrap(), BroadcastOutcome::Accepted);
        assert_eq!(ledger.broadcast(&vote).await.unwrap(), BroadcastOutcome::Duplicate);
        assert_eq!(ledger.votes().len(), 1);
    }

    #[tokio::test]
    async fn test_comment_becomes_content() {
        let ledger = MemoryLedger::new();
        let target = ContentRef::new("bot", "alice-post-bot");
        assert!(!ledger.content_exists(&target).await.unwrap());
        ledger
            .broadcast(&Action::Comment(CommentOperation {
                parent_author: "alice".into(),
                parent_permlink: "post".into(),
                author: "bot".into(),
                permlink: "alice-post-bot".into(),
                title: String::new(),
                body: "hi".into(),
                json_metadata: "{}".into(),
            }))
            .await
            .unwrap();
        assert!(ledger.content_exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let ledger = MemoryLedger::new();
        ledger.fail_next(Error::Transport("down".into()));
        assert!(ledger.capacity("bot").await.is_err());
        assert_eq!(ledger.capacity("bot").await.unwrap(), DEFAULT_CAPACITY);
        ledger.set_capacity("bot", 42.0);
        assert_eq!(ledger.capacity("bot").await.unwrap(), 42.0);
        assert_eq!(ledger.capacity_reads(), 2);
    }
}
