//! SilentBot Scheduler: per-account vote queues and admission control.
//!
//! Curator-directed votes go through [`AccountQueue`], spare-capacity votes
//! through [`OpportunisticQueue`]. [`VoteScheduler`] ticks every account once
//! per ingestion batch and casts at most one vote per account per tick.

pub mod policy;
pub mod queue;
pub mod scheduler;

pub use queue::{AccountQueue, OpportunisticQueue, VoteCandidate};
pub use scheduler::{AccountScheduler, QueueSnapshot, TickOutcome, VoteScheduler};
