//! Day-granularity checkpoint scheduling.
//!
//! # Responsibility
//! - Hold the checkpoint set that triggers member-facing email reminders.
//! - Compute whole-day countdowns and classify records against checkpoints
//!   and the metrics horizon.
//!
//! # Invariants
//! - Countdowns are measured from the start of the UTC day containing `now`
//!   and truncated, never rounded. Any two `now` values within the same UTC
//!   day classify every record identically.
//! - The scan window never includes memberships that expired before `now`.

use crate::model::membership::{MembershipRecord, DAY_MS};
use crate::repo::domain_store::ExpiryWindow;
use std::collections::BTreeSet;

/// Ordered set of "days until expiration" values that trigger a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSchedule {
    days: BTreeSet<u32>,
}

impl CheckpointSchedule {
    pub fn new(days: impl IntoIterator<Item = u32>) -> Self {
        Self {
            days: days.into_iter().collect(),
        }
    }

    pub fn contains(&self, days: i64) -> bool {
        u32::try_from(days).is_ok_and(|days| self.days.contains(&days))
    }

    /// Largest checkpoint; `0` for an empty schedule.
    pub fn max_days(&self) -> u32 {
        self.days.last().copied().unwrap_or(0)
    }

    pub fn days(&self) -> Vec<u32> {
        self.days.iter().copied().collect()
    }
}

impl Default for CheckpointSchedule {
    fn default() -> Self {
        Self::new([0, 1, 7, 14, 21, 28])
    }
}

/// Outcome of evaluating one record against the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub days_until_expiry: i64,
    pub email_eligible: bool,
    pub metrics_eligible: bool,
}

impl Classification {
    pub fn is_relevant(&self) -> bool {
        self.email_eligible || self.metrics_eligible
    }
}

/// Evaluates membership records for one `now`.
#[derive(Debug, Clone)]
pub struct ScheduleEvaluator<'a> {
    schedule: &'a CheckpointSchedule,
    now_ms: i64,
    reference_ms: i64,
}

impl<'a> ScheduleEvaluator<'a> {
    pub fn new(schedule: &'a CheckpointSchedule, now_ms: i64) -> Self {
        Self {
            schedule,
            now_ms,
            reference_ms: day_start(now_ms),
        }
    }

    /// Start of the UTC day containing `now`, used as countdown origin.
    pub fn reference_ms(&self) -> i64 {
        self.reference_ms
    }

    /// Expiration window covering every day up to the largest checkpoint.
    pub fn scan_window(&self) -> ExpiryWindow {
        let horizon_days = i64::from(self.schedule.max_days()) + 1;
        ExpiryWindow {
            from_ms: self.now_ms,
            until_ms: self.reference_ms.saturating_add(horizon_days * DAY_MS),
        }
    }

    pub fn days_until_expiry(&self, expiration_ms: i64) -> i64 {
        expiration_ms
            .saturating_sub(self.reference_ms)
            .div_euclid(DAY_MS)
    }

    pub fn classify(&self, record: &MembershipRecord) -> Classification {
        let days_until_expiry = self.days_until_expiry(record.expiration_ms);
        let in_horizon = record.expiration_ms >= self.now_ms
            && (0..=i64::from(self.schedule.max_days())).contains(&days_until_expiry);
        Classification {
            days_until_expiry,
            email_eligible: in_horizon && self.schedule.contains(days_until_expiry),
            metrics_eligible: in_horizon,
        }
    }
}

/// Truncates an epoch-millisecond instant to the start of its UTC day.
pub fn day_start(epoch_ms: i64) -> i64 {
    epoch_ms.div_euclid(DAY_MS) * DAY_MS
}

#[cfg(test)]
mod tests {
    use super::{day_start, CheckpointSchedule, ScheduleEvaluator};
    use crate::model::membership::{CollectionKind, MembershipRecord, DAY_MS};

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const MIDNIGHT: i64 = 19_675 * DAY_MS;

    fn record(expiration_ms: i64) -> MembershipRecord {
        MembershipRecord {
            domain_name: "sports".to_string(),
            kind: CollectionKind::Role,
            collection_name: "readers".to_string(),
            member_name: "user.joe".to_string(),
            expiration_ms,
        }
    }

    #[test]
    fn countdown_truncates_partial_days() {
        let schedule = CheckpointSchedule::default();
        let evaluator = ScheduleEvaluator::new(&schedule, MIDNIGHT);
        assert_eq!(evaluator.days_until_expiry(MIDNIGHT + 6 * HOUR_MS), 0);
        assert_eq!(evaluator.days_until_expiry(MIDNIGHT + 23 * HOUR_MS), 0);
        assert_eq!(evaluator.days_until_expiry(MIDNIGHT + 24 * HOUR_MS), 1);
        assert_eq!(evaluator.days_until_expiry(MIDNIGHT - HOUR_MS), -1);
    }

    #[test]
    fn checkpoints_drive_email_and_horizon_drives_metrics() {
        let schedule = CheckpointSchedule::default();
        let evaluator = ScheduleEvaluator::new(&schedule, MIDNIGHT + HOUR_MS);

        let at_seven = evaluator.classify(&record(MIDNIGHT + 7 * DAY_MS + 2 * HOUR_MS));
        assert_eq!(at_seven.days_until_expiry, 7);
        assert!(at_seven.email_eligible);
        assert!(at_seven.metrics_eligible);

        let at_eight = evaluator.classify(&record(MIDNIGHT + 8 * DAY_MS + 2 * HOUR_MS));
        assert!(!at_eight.email_eligible);
        assert!(at_eight.metrics_eligible);

        let beyond = evaluator.classify(&record(MIDNIGHT + 29 * DAY_MS + 2 * HOUR_MS));
        assert!(!beyond.is_relevant());

        let already_expired = evaluator.classify(&record(MIDNIGHT + HOUR_MS / 2));
        assert_eq!(already_expired.days_until_expiry, 0);
        assert!(!already_expired.is_relevant());
    }

    #[test]
    fn classification_is_stable_within_one_day() {
        let schedule = CheckpointSchedule::default();
        let expiration = MIDNIGHT + 14 * DAY_MS + 12 * HOUR_MS;
        let early = ScheduleEvaluator::new(&schedule, MIDNIGHT + 1);
        let late = ScheduleEvaluator::new(&schedule, MIDNIGHT + DAY_MS - 1);
        assert_eq!(
            early.classify(&record(expiration)),
            late.classify(&record(expiration))
        );
        assert_eq!(early.reference_ms(), late.reference_ms());
    }

    #[test]
    fn scan_window_spans_through_last_checkpoint_day() {
        let schedule = CheckpointSchedule::new([0, 3]);
        let now = MIDNIGHT + 5 * HOUR_MS;
        let window = ScheduleEvaluator::new(&schedule, now).scan_window();
        assert_eq!(window.from_ms, now);
        assert_eq!(window.until_ms, MIDNIGHT + 4 * DAY_MS);
        assert!(window.contains(MIDNIGHT + 4 * DAY_MS - 1));
        assert!(!window.contains(now - 1));
    }

    #[test]
    fn extreme_expirations_classify_without_overflow() {
        let schedule = CheckpointSchedule::default();
        let evaluator = ScheduleEvaluator::new(&schedule, MIDNIGHT + HOUR_MS);

        let far_past = evaluator.classify(&record(i64::MIN));
        assert!(far_past.days_until_expiry < 0);
        assert!(!far_past.is_relevant());

        let far_future = evaluator.classify(&record(i64::MAX));
        assert!(far_future.days_until_expiry > 28);
        assert!(!far_future.is_relevant());

        let pre_epoch = ScheduleEvaluator::new(&schedule, -HOUR_MS);
        assert!(!pre_epoch.classify(&record(i64::MIN)).is_relevant());
        assert!(!pre_epoch.classify(&record(i64::MAX)).is_relevant());
    }

    #[test]
    fn day_start_handles_pre_epoch_instants() {
        assert_eq!(day_start(-1), -DAY_MS);
        assert_eq!(day_start(DAY_MS + 5), DAY_MS);
    }

    #[test]
    fn negative_countdown_never_matches_checkpoint() {
        let schedule = CheckpointSchedule::default();
        assert!(!schedule.contains(-7));
        assert!(schedule.contains(21));
    }
}
