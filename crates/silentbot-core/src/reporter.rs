//! Reporting sink for realized votes, ratings and account status.
//!
//! Reporters are fire-and-forget: nothing they do may feed back into
//! scheduling decisions, so the methods return nothing.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::ContentRef;

/// Which queue a realized vote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteClass {
    /// Curator-directed vote or penalty.
    Primary,
    /// Spare-capacity vote on followed or subscribed content.
    Opportunistic,
}

pub trait Reporter: Send + Sync {
    /// A vote was cast. `realized_pct` is the share of full capacity intended.
    fn record_vote(&self, account: &str, target: &ContentRef, realized_pct: f64, class: VoteClass);

    /// A curator star rating was accepted.
    fn record_rating(&self, curator: &str, target: &ContentRef, stars: u8);

    /// Capacity and backlog of one account after a scheduler tick.
    fn record_status(
        &self,
        account: &str,
        capacity: f64,
        outstanding_pct: f64,
        outstanding_count: usize,
    );
}

/// Reporter that only writes log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn record_vote(&self, account: &str, target: &ContentRef, realized_pct: f64, class: VoteClass) {
        info!(
            "REPORT vote account={} target={} pct={:.2} class={:?}",
            account, target, realized_pct, class
        );
    }

    fn record_rating(&self, curator: &str, target: &ContentRef, stars: u8) {
        info!("REPORT rating curator={} target={} stars={}", curator, target, stars);
    }

    fn record_status(
        &self,
        account: &str,
        capacity: f64,
        outstanding_pct: f64,
        outstanding_count: usize,
    ) {
        info!(
            "REPORT status account={} capacity={:.2} backlog={:.2}% items={}",
            account, capacity, outstanding_pct, outstanding_count
        );
    }
}
