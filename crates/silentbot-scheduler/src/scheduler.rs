//! Per-account vote scheduling.
//!
//! Each voting account owns a primary queue, an opportunistic queue and the
//! time of its last successful vote. A tick ages both queues, then casts at
//! most one vote if the rate gate allows it: the primary head when there is
//! one, otherwise the opportunistic head.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use silentbot_chain::{Action, BroadcastOutcome, CapacityOracle, LedgerGateway, VoteOperation};
use silentbot_core::{ContentRef, Reporter, VoteClass};

use crate::policy::{
    self, Sizing, OPPORTUNISTIC_TTL_SECS, OPPORTUNISTIC_WEIGHT, PRIMARY_TTL_SECS, RATE_LIMIT_SECS,
};
use crate::queue::{AccountQueue, OpportunisticQueue, VoteCandidate};

/// What one tick did for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Both queues empty.
    Idle,
    /// Last vote too recent.
    Throttled,
    /// A vote was accepted.
    Voted(VoteClass),
    /// The chain already held this vote; the entry was dropped.
    AlreadyVoted(VoteClass),
    /// Head entry needs more capacity than is available; kept.
    Overweight,
    /// Capacity exhausted; head kept.
    NoCapacity,
    /// Head entry rounded to nothing and was dropped.
    Discarded,
    /// Capacity read or broadcast failed; head kept for the next tick.
    Failed,
}

/// Durable part of one account's scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub primary: AccountQueue,
    #[serde(default)]
    pub opportunistic: OpportunisticQueue,
    #[serde(default)]
    pub last_vote: i64,
}

#[derive(Debug, Clone)]
pub struct AccountScheduler {
    account: String,
    primary: AccountQueue,
    opportunistic: OpportunisticQueue,
    last_vote: i64,
}

impl AccountScheduler {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            primary: AccountQueue::default(),
            opportunistic: OpportunisticQueue::default(),
            last_vote: 0,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn primary(&self) -> &AccountQueue {
        &self.primary
    }

    pub fn opportunistic(&self) -> &OpportunisticQueue {
        &self.opportunistic
    }

    pub fn last_vote(&self) -> i64 {
        self.last_vote
    }

    /// Queue a curator-directed vote. Returns the stored weight.
    pub fn enqueue(&mut self, weight: i32, target: ContentRef, created: i64) -> i32 {
        let stored = self
            .primary
            .admit(VoteCandidate::new(weight, target.clone(), created));
        if stored != weight {
            info!(
                "{}: queue over full, downgrading vote on {} from {} to {}",
                self.account, target, weight, stored
            );
        }
        stored
    }

    /// Queue a spare-capacity vote at the fixed opportunistic weight.
    pub fn offer_opportunistic(&mut self, target: ContentRef, created: i64) {
        debug!("{}: opportunistic candidate {}", self.account, target);
        let dropped = self
            .opportunistic
            .push(VoteCandidate::new(OPPORTUNISTIC_WEIGHT, target, created));
        for candidate in dropped {
            debug!("{}: opportunistic queue full, dropping {}", self.account, candidate.target);
        }
    }

    /// Drop stale entries from both queues and bound the opportunistic one.
    pub fn age(&mut self, now: i64) {
        for candidate in self.primary.evict_older_than(now - PRIMARY_TTL_SECS) {
            info!(
                "{}: dropping stale vote target {}, more than 6 days old",
                self.account, candidate.target
            );
        }
        for candidate in self
            .opportunistic
            .evict_older_than(now - OPPORTUNISTIC_TTL_SECS)
        {
            info!(
                "{}: dropping stale opportunistic candidate {}, more than 1 day old",
                self.account, candidate.target
            );
        }
        self.opportunistic.truncate();
    }

    /// Age the queues and cast at most one vote.
    pub async fn tick<G>(&mut self, ledger: &G, reporter: &dyn Reporter, now: i64) -> TickOutcome
    where
        G: LedgerGateway + CapacityOracle,
    {
        self.age(now);

        if self.primary.is_empty() && self.opportunistic.is_empty() {
            return TickOutcome::Idle;
        }
        if now - self.last_vote < RATE_LIMIT_SECS {
            return TickOutcome::Throttled;
        }

        let capacity = match ledger.capacity(&self.account).await {
            Ok(c) => c,
            Err(e) => {
                warn!("{}: capacity unavailable: {}", self.account, e);
                return TickOutcome::Failed;
            }
        };

        let outcome = self.cast_head(ledger, reporter, capacity, now).await;

        reporter.record_status(
            &self.account,
            capacity,
            self.primary.outstanding_pct(),
            self.primary.len(),
        );
        outcome
    }

    async fn cast_head<G: LedgerGateway>(
        &mut self,
        ledger: &G,
        reporter: &dyn Reporter,
        capacity: f64,
        now: i64,
    ) -> TickOutcome {
        let (class, head, attenuation) = match self.primary.front() {
            Some(head) => {
                let attenuation =
                    policy::attenuation(capacity, self.primary.outstanding_pct(), head.weight);
                if attenuation < 1.0 {
                    info!("{}: attenuating votes to {:.3}", self.account, attenuation);
                }
                (VoteClass::Primary, head.clone(), attenuation)
            }
            None => match self.opportunistic.front() {
                Some(head) => (VoteClass::Opportunistic, head.clone(), 1.0),
                None => return TickOutcome::Idle,
            },
        };

        let weight = match policy::size_vote(head.weight, attenuation, capacity) {
            Sizing::Cast(weight) => weight,
            Sizing::Overweight(adjusted) => {
                debug!(
                    "{}: {} needs weight {} at capacity {:.2}, waiting",
                    self.account, head.target, adjusted, capacity
                );
                return TickOutcome::Overweight;
            }
            Sizing::NoCapacity => {
                debug!("{}: no voting capacity left", self.account);
                return TickOutcome::NoCapacity;
            }
            Sizing::Zero => {
                warn!(
                    "{}: vote on {} rounds to zero, discarding",
                    self.account, head.target
                );
                self.pop(class);
                return TickOutcome::Discarded;
            }
        };

        let vote = Action::Vote(VoteOperation {
            voter: self.account.clone(),
            author: head.target.author.clone(),
            permlink: head.target.permlink.clone(),
            weight,
        });

        match ledger.broadcast(&vote).await {
            Ok(BroadcastOutcome::Accepted) => {
                self.pop(class);
                self.last_vote = now;
                info!(
                    "{}: VOTE {} weight={} capacity={:.2} class={:?}",
                    self.account, head.target, weight, capacity, class
                );
                reporter.record_vote(
                    &self.account,
                    &head.target,
                    policy::realized_pct(head.weight, attenuation),
                    class,
                );
                TickOutcome::Voted(class)
            }
            Ok(BroadcastOutcome::Duplicate) => {
                self.pop(class);
                info!("{}: already voted on {}", self.account, head.target);
                TickOutcome::AlreadyVoted(class)
            }
            Err(e) => {
                warn!("{}: vote on {} failed: {}", self.account, head.target, e);
                TickOutcome::Failed
            }
        }
    }

    fn pop(&mut self, class: VoteClass) {
        match class {
            VoteClass::Primary => self.primary.pop_front(),
            VoteClass::Opportunistic => self.opportunistic.pop_front(),
        };
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            primary: self.primary.clone(),
            opportunistic: self.opportunistic.clone(),
            last_vote: self.last_vote,
        }
    }

    pub fn restore(&mut self, snapshot: QueueSnapshot) {
        self.primary = snapshot.primary;
        self.opportunistic = snapshot.opportunistic;
        self.last_vote = snapshot.last_vote;
        self.opportunistic.truncate();
    }
}

/// Schedulers for every voting account, in configured order.
#[derive(Debug, Clone)]
pub struct VoteScheduler {
    accounts: Vec<AccountScheduler>,
}

impl VoteScheduler {
    pub fn new(accounts: &[String]) -> Self {
        Self {
            accounts: accounts.iter().map(|a| AccountScheduler::new(a)).collect(),
        }
    }

    pub fn accounts(&self) -> impl Iterator<Item = &AccountScheduler> {
        self.accounts.iter()
    }

    pub fn account(&self, name: &str) -> Option<&AccountScheduler> {
        self.accounts.iter().find(|a| a.account == name)
    }

    pub fn account_mut(&mut self, name: &str) -> Option<&mut AccountScheduler> {
        self.accounts.iter_mut().find(|a| a.account == name)
    }

    /// Queue a vote for every account.
    pub fn enqueue_primary(&mut self, weight: i32, target: &ContentRef, created: i64) {
        for account in &mut self.accounts {
            account.enqueue(weight, target.clone(), created);
        }
    }

    /// Tick every account in order.
    pub async fn tick_all<G>(
        &mut self,
        ledger: &G,
        reporter: &dyn Reporter,
        now: i64,
    ) -> Vec<TickOutcome>
    where
        G: LedgerGateway + CapacityOracle,
    {
        let mut outcomes = Vec::with_capacity(self.accounts.len());
        for account in &mut self.accounts {
            outcomes.push(account.tick(ledger, reporter, now).await);
        }
        outcomes
    }

    pub fn snapshot(&self) -> BTreeMap<String, QueueSnapshot> {
        self.accounts
            .iter()
            .map(|a| (a.account.clone(), a.snapshot()))
            .collect()
    }

    /// Restore saved queues. Saved accounts that are no longer configured
    /// are dropped; configured accounts missing from the snapshot stay empty.
    pub fn restore(&mut self, mut snapshots: BTreeMap<String, QueueSnapshot>) {
        for account in &mut self.accounts {
            if let Some(snapshot) = snapshots.remove(&account.account) {
                account.restore(snapshot);
            }
        }
        for (name, snapshot) in snapshots {
            warn!(
                "Dropping saved queues of unconfigured account {} ({} pending votes)",
                name,
                snapshot.primary.len()
            );
        }
    }
}
