//! SilentBot Chain: everything that talks to the ledger.
//!
//! Exposes the [`LedgerGateway`] and [`CapacityOracle`] seams, the wire
//! types they carry, a JSON-RPC implementation for Hive nodes with local
//! transaction signing, a fixed-delay retry wrapper and an in-memory ledger.

pub mod capacity;
pub mod client;
pub mod gateway;
pub mod memory;
pub mod retry;
pub mod signing;
pub mod types;

pub use client::HiveClient;
pub use gateway::{CapacityOracle, LedgerGateway, MAX_BLOCK_BATCH};
pub use memory::MemoryLedger;
pub use retry::{Retrying, DEFAULT_RETRY_DELAY};
pub use signing::Signer;
pub use types::{
    parse_chain_time, Action, Block, BroadcastOutcome, CommentOperation, Operation, PostInfo,
    Transaction, VoteOperation,
};
