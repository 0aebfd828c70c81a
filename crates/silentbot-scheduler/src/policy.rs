//! Admission and vote sizing arithmetic.
//!
//! Pure functions over weights (hundredths of a percent) and capacity
//! (percent). The scheduler owns the queues; this module only decides
//! numbers.

/// Minimum spacing between two votes of one account.
pub const RATE_LIMIT_SECS: i64 = 120;

/// Primary candidates older than this are dropped unvoted.
pub const PRIMARY_TTL_SECS: i64 = 6 * 86_400;

/// Opportunistic candidates older than this are dropped unvoted.
pub const OPPORTUNISTIC_TTL_SECS: i64 = 86_400;

/// Opportunistic queue length after any insertion or tick.
pub const OPPORTUNISTIC_CAPACITY: usize = 32;

/// Weight requested for every opportunistic candidate.
pub const OPPORTUNISTIC_WEIGHT: i32 = 9950;

/// Largest weight a single vote can carry.
pub const MAX_VOTE_WEIGHT: i32 = 10_000;

/// Total primary weight above which new entries are scaled down.
pub const QUEUE_BUDGET: f64 = 100_000.0;

/// Mana regeneration time per percent of capacity.
const SECS_PER_PERCENT: f64 = 4_320.0;
/// Backlog (in regeneration seconds) tolerated without attenuation.
const BACKLOG_GRACE_SECS: f64 = 86_400.0;
/// Backlog beyond the grace period at which votes would fade to nothing.
const BACKLOG_FADE_SECS: f64 = 576_000.0;

/// Weight stored for a new primary entry, given the sum of all weights
/// already queued for that account.
///
/// With `load = (existing + weight) / 100000`, an overfull queue stores
/// `trunc(weight / load)`; otherwise `weight` unchanged.
pub fn admitted_weight(existing_total: i64, weight: i32) -> i32 {
    let load = (existing_total + i64::from(weight)) as f64 / QUEUE_BUDGET;
    if load > 1.0 {
        (f64::from(weight) / load).trunc() as i32
    } else {
        weight
    }
}

/// Fraction of the head entry's weight to spend on this vote.
///
/// `outstanding_pct` is the sum of positive queued weights in percent. The
/// backlog is expressed as the time needed to regenerate both the missing
/// capacity and the outstanding weight; past one day of backlog, votes are
/// scaled down linearly. Negative (penalty) heads are never attenuated.
pub fn attenuation(capacity: f64, outstanding_pct: f64, head_weight: i32) -> f64 {
    let effective = (100.0 + outstanding_pct / 50.0 - capacity) * SECS_PER_PERCENT;
    if effective < BACKLOG_GRACE_SECS || head_weight <= 0 {
        return 1.0;
    }
    (1.0 - (effective - BACKLOG_GRACE_SECS) / BACKLOG_FADE_SECS).clamp(0.0, 1.0)
}

/// What to do with a head entry at the current capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// Broadcast a vote of this weight.
    Cast(i16),
    /// The normalized weight exceeds a full vote; wait for capacity.
    Overweight(i64),
    /// The entry rounds to nothing and can never be cast.
    Zero,
    /// Capacity is exhausted.
    NoCapacity,
}

/// Normalize `weight` by the current capacity so the realized effect is
/// `weight × attenuation` percent of a full-capacity vote.
pub fn size_vote(weight: i32, attenuation: f64, capacity: f64) -> Sizing {
    if capacity <= 0.0 {
        return Sizing::NoCapacity;
    }
    let adjusted = (f64::from(weight) * 100.0 * attenuation / capacity).round() as i64;
    if adjusted.abs() > i64::from(MAX_VOTE_WEIGHT) {
        Sizing::Overweight(adjusted)
    } else if adjusted == 0 {
        Sizing::Zero
    } else {
        Sizing::Cast(adjusted as i16)
    }
}

/// Percentage of a full-capacity vote actually spent.
pub fn realized_pct(weight: i32, attenuation: f64) -> f64 {
    f64::from(weight) * attenuation / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_unchanged_below_budget() {
        assert_eq!(admitted_weight(0, 10_000), 10_000);
        assert_eq!(admitted_weight(90_000, 10_000), 10_000);
        assert_eq!(admitted_weight(-5_000, 10_000), 10_000);
    }

    #[test]
    fn test_admission_downgrades_overfull_queue() {
        // load = 110000 / 100000 = 1.1
        assert_eq!(admitted_weight(100_000, 10_000), 9_090);
        // load = 2.0
        assert_eq!(admitted_weight(190_000, 10_000), 5_000);
        // Penalties scale the same way.
        assert_eq!(admitted_weight(205_000, -5_000), -2_500);
    }

    #[test]
    fn test_half_capacity_overweight() {
        let a = attenuation(50.0, 0.0, 9950);
        assert!((a - 0.775).abs() < 1e-9);
        match size_vote(9950, a, 50.0) {
            Sizing::Overweight(w) => assert!((15_422..=15_423).contains(&w)),
            other => panic!("expected overweight, got {:?}", other),
        }
    }

    #[test]
    fn test_full_capacity_still_overweight() {
        let a = attenuation(99.0, 0.0, 9950);
        assert_eq!(a, 1.0);
        assert_eq!(size_vote(9950, a, 99.0), Sizing::Overweight(10_051));
    }

    #[test]
    fn test_small_vote_cast() {
        assert_eq!(size_vote(5_000, 1.0, 100.0), Sizing::Cast(5_000));
        assert_eq!(size_vote(5_000, 1.0, 80.0), Sizing::Cast(6_250));
        assert_eq!(size_vote(-10_000, 1.0, 100.0), Sizing::Cast(-10_000));
    }

    #[test]
    fn test_penalty_never_attenuated() {
        assert_eq!(attenuation(10.0, 500.0, -5_000), 1.0);
    }

    #[test]
    fn test_attenuation_clamped() {
        // effective = (100 + 10000/50 - 0) * 4320, far past the fade window
        assert_eq!(attenuation(0.0, 10_000.0, 100), 0.0);
        assert_eq!(attenuation(100.0, 0.0, 100), 1.0);
    }

    #[test]
    fn test_zero_and_no_capacity() {
        assert_eq!(size_vote(0, 1.0, 50.0), Sizing::Zero);
        assert_eq!(size_vote(100, 0.0, 50.0), Sizing::Zero);
        assert_eq!(size_vote(100, 1.0, 0.0), Sizing::NoCapacity);
    }

    #[test]
    fn test_realized_pct() {
        assert!((realized_pct(5_000, 0.5) - 25.0).abs() < 1e-9);
    }
}
