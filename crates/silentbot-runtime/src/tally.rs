//! Daily aggregation of votes, ratings and account status.
//!
//! Counters accumulate per UTC day. The first event of a new day logs the
//! finished day's summary and starts a fresh tally. The running day travels
//! inside the checkpoint so a restart does not lose it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use silentbot_core::{ContentRef, LogReporter, Reporter, VoteClass};

/// Lowest star count listed among the day's top-rated posts.
pub const TOP_RATED_STARS: u8 = 4;

/// One vote as it was cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastVote {
    pub target: ContentRef,
    pub pct: f64,
    pub class: VoteClass,
}

/// Totals of one account for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountTally {
    pub votes: Vec<CastVote>,
    pub capacity: Option<f64>,
    pub outstanding_pct: f64,
    pub outstanding_count: usize,
}

impl AccountTally {
    pub fn count(&self, class: VoteClass) -> usize {
        self.votes.iter().filter(|v| v.class == class).count()
    }

    /// Sum of realized vote percentages.
    pub fn spent_pct(&self) -> f64 {
        self.votes.iter().map(|v| v.pct).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedPost {
    pub stars: u8,
    pub target: ContentRef,
    pub curator: String,
}

/// Everything recorded during one UTC day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaySummary {
    pub day: Option<NaiveDate>,
    pub accounts: BTreeMap<String, AccountTally>,
    /// Ratings given at each star level; index 0 is one star.
    pub stars: [u64; 5],
    /// Ratings per curator.
    pub curators: BTreeMap<String, u32>,
    pub top_rated: Vec<RatedPost>,
}

impl DaySummary {
    /// Ratings given at `stars` (1 to 5).
    pub fn star_count(&self, stars: u8) -> u64 {
        self.stars[usize::from(stars.clamp(1, 5)) - 1]
    }
}

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct DailyTally {
    current: Mutex<DaySummary>,
    clock: Clock,
}

impl Default for DailyTally {
    fn default() -> Self {
        Self::new()
    }
}

impl DailyTally {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(|| Utc::now().date_naive()))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            current: Mutex::new(DaySummary::default()),
            clock,
        }
    }

    /// Copy of the running day's tally.
    pub fn snapshot(&self) -> DaySummary {
        self.current.lock().clone()
    }

    /// Continue from a saved tally. A tally from an earlier day is summarized
    /// and replaced by the next event.
    pub fn restore(&self, summary: DaySummary) {
        *self.current.lock() = summary;
    }

    fn with_today<F>(&self, update: F)
    where
        F: FnOnce(&mut DaySummary),
    {
        let today = (self.clock)();
        let mut current = self.current.lock();
        match current.day {
            Some(day) if day != today => {
                let finished = std::mem::take(&mut *current);
                log_summary(&finished);
                current.day = Some(today);
            }
            None => current.day = Some(today),
            _ => {}
        }
        update(&mut current);
    }
}

fn log_summary(summary: &DaySummary) {
    let day = summary
        .day
        .map(|d| d.to_string())
        .unwrap_or_else(|| "?".into());
    for (account, tally) in &summary.accounts {
        info!(
            "DAILY {} {}: {} curated + {} opportunistic votes, {:.2}% spent, backlog {:.2}% in {} items",
            day,
            account,
            tally.count(VoteClass::Primary),
            tally.count(VoteClass::Opportunistic),
            tally.spent_pct(),
            tally.outstanding_pct,
            tally.outstanding_count
        );
    }
    info!(
        "DAILY {} stars: 5={} 4={} 3={} 2={} 1={}",
        day,
        summary.star_count(5),
        summary.star_count(4),
        summary.star_count(3),
        summary.star_count(2),
        summary.star_count(1)
    );
    for rated in &summary.top_rated {
        info!(
            "DAILY {} top rated {} ({} stars by {})",
            day, rated.target, rated.stars, rated.curator
        );
    }
    for (curator, count) in &summary.curators {
        info!("DAILY {} curator {}: {} ratings", day, curator, count);
    }
}

impl Reporter for DailyTally {
    fn record_vote(&self, account: &str, target: &ContentRef, realized_pct: f64, class: VoteClass) {
        LogReporter.record_vote(account, target, realized_pct, class);
        self.with_today(|day| {
            day.accounts
                .entry(account.to_string())
                .or_default()
                .votes
                .push(CastVote {
                    target: target.clone(),
                    pct: realized_pct,
                    class,
                });
        });
    }

    fn record_rating(&self, curator: &str, target: &ContentRef, stars: u8) {
        LogReporter.record_rating(curator, target, stars);
        let stars = stars.clamp(1, 5);
        self.with_today(|day| {
            day.stars[usize::from(stars) - 1] += 1;
            *day.curators.entry(curator.to_string()).or_default() += 1;
            if stars >= TOP_RATED_STARS {
                day.top_rated.push(RatedPost {
                    stars,
                    target: target.clone(),
                    curator: curator.to_string(),
                });
            }
        });
    }

    fn record_status(
        &self,
        account: &str,
        capacity: f64,
        outstanding_pct: f64,
        outstanding_count: usize,
    ) {
        self.with_today(|day| {
            let tally = day.accounts.entry(account.to_string()).or_default();
            tally.capacity = Some(capacity);
            tally.outstanding_pct = outstanding_pct;
            tally.outstanding_count = outstanding_count;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_accumulates_within_a_day() {
        let tally = DailyTally::with_clock(Arc::new(may_first));
        let target = ContentRef::new("bob", "art");
        tally.record_vote("alice", &target, 30.0, VoteClass::Primary);
        tally.record_vote("alice", &target, 99.5, VoteClass::Opportunistic);
        tally.record_rating("carol", &target, 3);
        tally.record_status("alice", 87.5, 12.0, 4);

        let summary = tally.snapshot();
        let alice = &summary.accounts["alice"];
        assert_eq!(alice.count(VoteClass::Primary), 1);
        assert_eq!(alice.count(VoteClass::Opportunistic), 1);
        assert_eq!(alice.votes[0].target, target);
        assert!((alice.spent_pct() - 129.5).abs() < 1e-9);
        assert_eq!(alice.capacity, Some(87.5));
        assert_eq!(alice.outstanding_count, 4);
        assert_eq!(summary.curators["carol"], 1);
    }

    #[test]
    fn test_ratings_counted_per_star() {
        let tally = DailyTally::with_clock(Arc::new(may_first));
        let target = ContentRef::new("bob", "art");
        for stars in [5, 4, 4, 1, 9] {
            tally.record_rating("carol", &target, stars);
        }
        tally.record_rating("dan", &ContentRef::new("eve", "song"), 2);

        let summary = tally.snapshot();
        assert_eq!(summary.stars, [1, 1, 0, 2, 2]);
        assert_eq!(summary.star_count(5), 2);
        assert_eq!(summary.curators["carol"], 5);
        assert_eq!(summary.curators["dan"], 1);
        let top: Vec<u8> = summary.top_rated.iter().map(|r| r.stars).collect();
        assert_eq!(top, vec![5, 4, 4, 5]);
    }

    #[test]
    fn test_restore_continues_the_day() {
        let first = DailyTally::with_clock(Arc::new(may_first));
        let target = ContentRef::new("bob", "art");
        first.record_rating("carol", &target, 5);
        first.record_vote("alice", &target, 50.0, VoteClass::Primary);

        let second = DailyTally::with_clock(Arc::new(may_first));
        second.restore(first.snapshot());
        second.record_rating("carol", &target, 5);

        let summary = second.snapshot();
        assert_eq!(summary.star_count(5), 2);
        assert_eq!(summary.accounts["alice"].votes.len(), 1);
    }

    #[test]
    fn test_rollover_starts_fresh() {
        let today = Arc::new(Mutex::new(may_first()));
        let clock_day = today.clone();
        let tally = DailyTally::with_clock(Arc::new(move || *clock_day.lock()));
        let target = ContentRef::new("bob", "art");

        tally.record_rating("carol", &target, 5);
        *today.lock() = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        tally.record_rating("carol", &target, 4);

        let summary = tally.snapshot();
        assert_eq!(summary.day, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(summary.curators["carol"], 1);
        assert_eq!(summary.stars, [0, 0, 0, 1, 0]);
    }
}
