//! Per-account vote queues.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use silentbot_core::ContentRef;

use crate::policy::{self, OPPORTUNISTIC_CAPACITY};

/// A pending vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCandidate {
    /// Signed weight in hundredths of a percent. Negative is a penalty.
    pub weight: i32,
    pub target: ContentRef,
    /// Creation time of the target content, unix seconds.
    pub created: i64,
}

impl VoteCandidate {
    pub fn new(weight: i32, target: ContentRef, created: i64) -> Self {
        Self {
            weight,
            target,
            created,
        }
    }

    pub fn is_older_than(&self, cutoff: i64) -> bool {
        self.created < cutoff
    }
}

/// Drop every entry created before `cutoff`, returning them in queue order.
fn evict(entries: &mut VecDeque<VoteCandidate>, cutoff: i64) -> Vec<VoteCandidate> {
    let mut evicted = Vec::new();
    entries.retain(|c| {
        if c.is_older_than(cutoff) {
            evicted.push(c.clone());
            false
        } else {
            true
        }
    });
    evicted
}

/// Primary FIFO of curator-directed votes and penalties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountQueue {
    entries: VecDeque<VoteCandidate>,
}

impl AccountQueue {
    /// Append a candidate, scaled down if the queue is overfull.
    /// Returns the weight actually stored.
    pub fn admit(&mut self, mut candidate: VoteCandidate) -> i32 {
        candidate.weight = policy::admitted_weight(self.total_weight(), candidate.weight);
        let stored = candidate.weight;
        self.entries.push_back(candidate);
        stored
    }

    pub fn front(&self) -> Option<&VoteCandidate> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<VoteCandidate> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoteCandidate> {
        self.entries.iter()
    }

    /// Sum of all queued weights, penalties included.
    pub fn total_weight(&self) -> i64 {
        self.entries.iter().map(|c| i64::from(c.weight)).sum()
    }

    /// Sum of positive queued weights, in percent.
    pub fn outstanding_pct(&self) -> f64 {
        self.entries
            .iter()
            .filter(|c| c.weight > 0)
            .map(|c| f64::from(c.weight))
            .sum::<f64>()
            / 100.0
    }

    pub fn evict_older_than(&mut self, cutoff: i64) -> Vec<VoteCandidate> {
        evict(&mut self.entries, cutoff)
    }
}

/// Bounded FIFO of spare-capacity votes. Oldest entries fall out first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunisticQueue {
    entries: VecDeque<VoteCandidate>,
}

impl OpportunisticQueue {
    /// Append and trim to capacity; returns whatever fell out. A target that
    /// is already queued is not added twice.
    pub fn push(&mut self, candidate: VoteCandidate) -> Vec<VoteCandidate> {
        if self.contains(&candidate.target) {
            return Vec::new();
        }
        self.entries.push_back(candidate);
        self.truncate()
    }

    pub fn contains(&self, target: &ContentRef) -> bool {
        self.entries.iter().any(|c| &c.target == target)
    }

    /// Keep only the newest entries up to capacity.
    pub fn truncate(&mut self) -> Vec<VoteCandidate> {
        let excess = self.entries.len().saturating_sub(OPPORTUNISTIC_CAPACITY);
        self.entries.drain(..excess).collect()
    }

    pub fn front(&self) -> Option<&VoteCandidate> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<VoteCandidate> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoteCandidate> {
        self.entries.iter()
    }

    pub fn evict_older_than(&mut self, cutoff: i64) -> Vec<VoteCandidate> {
        evict(&mut self.entries, cutoff)
    }
}
