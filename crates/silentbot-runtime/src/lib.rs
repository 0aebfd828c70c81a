//! SilentBot Runtime: the long-running curation loop.
//!
//! [`CurationBot`] follows the chain block by block, hands mentions to the
//! command interpreter and root posts to the opportunistic queues, ticks the
//! vote scheduler after every batch and persists a [`Checkpoint`].

pub mod bot;
pub mod checkpoint;
pub mod ingest;
pub mod tally;

pub use bot::{CurationBot, CYCLE_SECS};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use ingest::{classify, BlockCursor, Classified, COLD_START_DEPTH};
pub use tally::{AccountTally, CastVote, DailyTally, DaySummary, RatedPost};
