//! SilentBot Curation: curator commands and who may issue them.
//!
//! [`CommandInterpreter`] takes [`MentionEvent`]s in chain order, checks them
//! against the [`EligibilityGate`], answers on chain and queues votes and
//! penalties with the scheduler.

pub mod command;
pub mod eligibility;
pub mod events;
pub mod interpreter;
pub mod responses;

pub use command::Command;
pub use eligibility::{EligibilityGate, EligibilityState, StarRejection};
pub use events::{MentionEvent, RootPost};
pub use interpreter::{CommandInterpreter, Disposition};
