//! SilentBot Core: configuration, credentials, errors and shared types.

pub mod config;
pub mod error;
pub mod reporter;
pub mod types;

pub use config::{AbuseResponses, BotConfig, Credentials, DataPaths, ResponseEntry, StarResponses};
pub use error::{Error, Result};
pub use reporter::{LogReporter, Reporter, VoteClass};
pub use types::{AccountInterests, ContentRef};
