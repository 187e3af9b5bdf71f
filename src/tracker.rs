//! Completion recording, cumulative totals and the daily streak.
//!
//! All writes go through one tracker-owned mutex so that the
//! load-modify-save of `UserStats` never interleaves with another writer.

use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{ChallengeId, CompletedChallenge, DateRange, NewCompletion, UserStats};
use crate::error::{CoreError, ResetStep};
use crate::store::{ChallengeRepository, SqliteStats, StatsRepository, StoreError};

/// Longest window shown by the daily chart, today included.
pub const CHART_MAX_DAYS: i64 = 30;

/// What a successful `record_completion` returns: the stored row and the new totals.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReceipt {
    pub completion: CompletedChallenge,
    pub stats: UserStats,
}

pub struct StatsTracker<C, S> {
    challenges: C,
    stats: S,
    writer: Mutex<()>,
}

impl<C, S> StatsTracker<C, S>
where
    C: ChallengeRepository,
    S: StatsRepository,
{
    pub fn new(challenges: C, stats: S) -> Self {
        Self {
            challenges,
            stats,
            writer: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn challenges(&self) -> &C {
        &self.challenges
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.stats
    }

    /// Record a completion now (local time).
    pub fn record_completion(
        &self,
        challenge_id: ChallengeId,
        minutes: u32,
    ) -> Result<CompletionReceipt, CoreError> {
        self.record_completion_at(challenge_id, minutes, Local::now().naive_local())
    }

    /// Record a completion at an explicit local timestamp.
    #[instrument(level = "info", skip(self))]
    pub fn record_completion_at(
        &self,
        challenge_id: ChallengeId,
        minutes: u32,
        at: NaiveDateTime,
    ) -> Result<CompletionReceipt, CoreError> {
        let _guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;

        if self.challenges.find_by_id(challenge_id)?.is_none() {
            warn!(target: "stats", challenge_id, "Completion rejected: unknown challenge");
            return Err(CoreError::NotFound(challenge_id));
        }

        let mut stats = self.stats.load_stats()?.unwrap_or_default();
        stats.apply_completion(minutes, at.date());

        let completion = self.stats.commit_completion(
            &NewCompletion {
                challenge_id,
                completed_at: at,
            },
            &stats,
        )?;

        info!(
            target: "stats",
            challenge_id,
            minutes,
            total = stats.total_challenges_completed,
            streak = stats.streak_days,
            "Completion recorded"
        );
        Ok(CompletionReceipt { completion, stats })
    }

    /// Current snapshot; all-zero if nothing was ever stored.
    pub fn stats(&self) -> Result<UserStats, CoreError> {
        Ok(self.stats.load_stats()?.unwrap_or_default())
    }

    /// Delete the completion history, then zero the totals.
    #[instrument(level = "info", skip(self))]
    pub fn reset_stats(&self) -> Result<(), CoreError> {
        let _guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;

        let removed = self.stats.delete_all_completions()?;
        if let Err(e) = self.stats.save_stats(&UserStats::default()) {
            warn!(target: "stats", error = %e, removed, "History cleared but totals not reset");
            return Err(CoreError::InconsistentReset {
                done: vec![ResetStep::History],
                failed: vec![ResetStep::Totals],
            });
        }
        info!(target: "stats", removed, "Stats reset");
        Ok(())
    }

    pub fn history(&self, range: DateRange) -> Result<Vec<CompletedChallenge>, CoreError> {
        Ok(self.stats.list_completions(range)?)
    }

    /// Minutes per day across `range`, zero-filled, oldest first. Each
    /// completion counts its challenge's nominal duration; completions of
    /// deleted challenges count zero.
    pub fn minutes_by_date(&self, range: DateRange) -> Result<Vec<(NaiveDate, u32)>, CoreError> {
        let mut per_day: Vec<(NaiveDate, u32)> = range.days().map(|d| (d, 0)).collect();
        for done in self.stats.list_completions(range)? {
            let minutes = done.challenge.as_ref().map_or(0, |c| c.duration_minutes);
            let slot = range
                .offset_of(done.completed_at.date())
                .and_then(|i| per_day.get_mut(i));
            if let Some((_, total)) = slot {
                *total = total.saturating_add(minutes);
            }
        }
        Ok(per_day)
    }
}

impl<C> StatsTracker<C, SqliteStats>
where
    C: ChallengeRepository,
{
    pub fn history_all(&self) -> Result<Vec<CompletedChallenge>, CoreError> {
        Ok(self.stats.list_all_completions()?)
    }

    pub fn history_for_challenge(&self, id: ChallengeId) -> Result<Vec<CompletedChallenge>, CoreError> {
        Ok(self.stats.completions_for_challenge(id)?)
    }

    pub fn counts_by_category(&self) -> Result<Vec<(String, u32)>, CoreError> {
        Ok(self.stats.counts_by_category()?)
    }

    pub fn counts_by_date(&self, range: DateRange) -> Result<Vec<(NaiveDate, u32)>, CoreError> {
        Ok(self.stats.counts_by_date(range)?)
    }

    /// Day of the oldest recorded completion.
    pub fn earliest_completion(&self) -> Result<Option<NaiveDate>, CoreError> {
        Ok(self
            .stats
            .list_all_completions()?
            .iter()
            .map(|c| c.completed_at.date())
            .min())
    }

    /// Earliest completion day through `today`, limited to the last
    /// `CHART_MAX_DAYS` days. Just `today` when there is no history.
    pub fn chart_range(&self, today: NaiveDate) -> Result<DateRange, CoreError> {
        Ok(chart_range_from(self.earliest_completion()?, today))
    }
}

pub(crate) fn chart_range_from(earliest: Option<NaiveDate>, today: NaiveDate) -> DateRange {
    let floor = today - Duration::days(CHART_MAX_DAYS - 1);
    let start = match earliest {
        Some(e) if e > today => today,
        Some(e) if e < floor => floor,
        Some(e) => e,
        None => return DateRange::single(today),
    };
    DateRange { start, end: today }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::domain::{Challenge, NewChallenge};
    use crate::store::{Database, SqliteChallenges};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, 15, 0).unwrap()
    }

    fn setup() -> (StatsTracker<SqliteChallenges, SqliteStats>, Challenge) {
        let db = Database::open_in_memory().unwrap();
        let challenges = SqliteChallenges::new(db.clone());
        let c = challenges
            .create(&NewChallenge {
                name: "Push-ups".into(),
                description: "Do 30 push-ups".into(),
                category: "Strength".into(),
                difficulty: 3,
                duration_minutes: 2,
                image_path: None,
            })
            .unwrap();
        (StatsTracker::new(challenges, SqliteStats::new(db)), c)
    }

    #[test]
    fn first_completion_on_fresh_state() {
        let (tracker, c) = setup();
        let receipt = tracker.record_completion_at(c.id, 8, at(10, 9)).unwrap();

        assert_eq!(receipt.completion.challenge_id, c.id);
        assert_eq!(receipt.completion.completed_at, at(10, 9));
        assert_eq!(
            receipt.stats,
            UserStats {
                total_challenges_completed: 1,
                total_minutes_exercised: 8,
                streak_days: 1,
                last_challenge_date: Some(day(10)),
            }
        );
        assert_eq!(tracker.history_all().unwrap().len(), 1);
        assert_eq!(tracker.stats().unwrap(), receipt.stats);
    }

    #[test]
    fn next_day_completion_extends_existing_streak() {
        let (tracker, c) = setup();
        tracker
            .store()
            .save_stats(&UserStats {
                total_challenges_completed: 4,
                total_minutes_exercised: 60,
                streak_days: 3,
                last_challenge_date: Some(day(10)),
            })
            .unwrap();

        let receipt = tracker.record_completion_at(c.id, 12, at(11, 7)).unwrap();
        assert_eq!(
            receipt.stats,
            UserStats {
                total_challenges_completed: 5,
                total_minutes_exercised: 72,
                streak_days: 4,
                last_challenge_date: Some(day(11)),
            }
        );
    }

    #[test]
    fn totals_accumulate_and_same_day_keeps_streak() {
        let (tracker, c) = setup();
        for (i, minutes) in [5, 10, 15].into_iter().enumerate() {
            tracker.record_completion_at(c.id, minutes, at(3, 8 + i as u32)).unwrap();
        }
        let s = tracker.stats().unwrap();
        assert_eq!(s.total_minutes_exercised, 30);
        assert_eq!(s.total_challenges_completed, 3);
        assert_eq!(s.streak_days, 1);
    }

    #[test]
    fn gap_breaks_streak() {
        let (tracker, c) = setup();
        tracker.record_completion_at(c.id, 1, at(1, 8)).unwrap();
        tracker.record_completion_at(c.id, 1, at(2, 8)).unwrap();
        assert_eq!(tracker.stats().unwrap().streak_days, 2);
        tracker.record_completion_at(c.id, 1, at(5, 8)).unwrap();
        assert_eq!(tracker.stats().unwrap().streak_days, 1);
    }

    #[test]
    fn unknown_challenge_is_rejected_without_changes() {
        let (tracker, c) = setup();
        tracker.record_completion_at(c.id, 4, at(1, 8)).unwrap();
        let before = tracker.stats().unwrap();

        let err = tracker.record_completion_at(c.id + 100, 10, at(2, 8)).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(id) if id == c.id + 100));
        assert_eq!(tracker.stats().unwrap(), before);
        assert_eq!(tracker.history_all().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_completions_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("fit.db")).unwrap();
        let challenges = SqliteChallenges::new(db.clone());
        let c = challenges
            .create(&NewChallenge {
                name: "Squats".into(),
                description: "Do 30 squats".into(),
                category: "Strength".into(),
                difficulty: 2,
                duration_minutes: 2,
                image_path: None,
            })
            .unwrap();
        let tracker = StatsTracker::new(challenges, SqliteStats::new(db));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        tracker.record_completion(c.id, 2).unwrap();
                    }
                });
            }
        });

        let stats = tracker.stats().unwrap();
        assert_eq!(stats.total_challenges_completed, 200);
        assert_eq!(stats.total_minutes_exercised, 400);
        assert_eq!(tracker.history_all().unwrap().len(), 200);
    }

    #[test]
    fn reset_clears_history_and_totals() {
        let (tracker, c) = setup();
        tracker.record_completion_at(c.id, 4, at(1, 8)).unwrap();
        tracker.record_completion_at(c.id, 6, at(2, 8)).unwrap();

        tracker.reset_stats().unwrap();
        assert_eq!(tracker.stats().unwrap(), UserStats::default());
        assert!(tracker.history_all().unwrap().is_empty());
    }

    #[test]
    fn minutes_by_date_zero_fills_and_uses_nominal_duration() {
        let (tracker, c) = setup();
        tracker.record_completion_at(c.id, 9, at(2, 8)).unwrap();
        tracker.record_completion_at(c.id, 9, at(2, 18)).unwrap();
        tracker.record_completion_at(c.id, 9, at(4, 8)).unwrap();

        let range = DateRange::new(day(1), day(4)).unwrap();
        assert_eq!(
            tracker.minutes_by_date(range).unwrap(),
            vec![(day(1), 0), (day(2), 4), (day(3), 0), (day(4), 2)]
        );
        assert_eq!(tracker.counts_by_date(range).unwrap(), vec![(day(2), 2), (day(4), 1)]);
        assert_eq!(tracker.counts_by_category().unwrap(), vec![("Strength".to_string(), 3)]);
    }

    #[test]
    fn chart_range_clamps_to_thirty_days() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        assert_eq!(chart_range_from(None, today), DateRange::single(today));

        let recent = NaiveDate::from_ymd_opt(2024, 8, 20).unwrap();
        assert_eq!(chart_range_from(Some(recent), today).start, recent);

        let old = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clamped = chart_range_from(Some(old), today);
        assert_eq!(clamped.start, NaiveDate::from_ymd_opt(2024, 8, 2).unwrap());
        assert_eq!(clamped.days().count(), 30);

        let (tracker, c) = setup();
        tracker.record_completion_at(c.id, 1, at(5, 8)).unwrap();
        assert_eq!(tracker.chart_range(day(9)).unwrap(), DateRange::new(day(5), day(9)).unwrap());
    }

    /// Stats store whose writes can be switched to fail.
    struct FlakyStats {
        inner: SqliteStats,
        fail_save: Cell<bool>,
        fail_commit: Cell<bool>,
    }

    fn broken() -> StoreError {
        StoreError::Corrupt("disk full".into())
    }

    impl StatsRepository for FlakyStats {
        fn load_stats(&self) -> Result<Option<UserStats>, StoreError> {
            self.inner.load_stats()
        }
        fn save_stats(&self, stats: &UserStats) -> Result<(), StoreError> {
            if self.fail_save.get() {
                return Err(broken());
            }
            self.inner.save_stats(stats)
        }
        fn append_completion(&self, c: &NewCompletion) -> Result<CompletedChallenge, StoreError> {
            self.inner.append_completion(c)
        }
        fn commit_completion(
            &self,
            c: &NewCompletion,
            stats: &UserStats,
        ) -> Result<CompletedChallenge, StoreError> {
            if self.fail_commit.get() {
                return Err(broken());
            }
            self.inner.commit_completion(c, stats)
        }
        fn delete_all_completions(&self) -> Result<usize, StoreError> {
            self.inner.delete_all_completions()
        }
        fn list_completions(&self, range: DateRange) -> Result<Vec<CompletedChallenge>, StoreError> {
            self.inner.list_completions(range)
        }
    }

    fn flaky_setup() -> (StatsTracker<SqliteChallenges, FlakyStats>, Challenge) {
        let (tracker, c) = setup();
        let StatsTracker { challenges, stats, .. } = tracker;
        let flaky = FlakyStats { inner: stats, fail_save: Cell::new(false), fail_commit: Cell::new(false) };
        (StatsTracker::new(challenges, flaky), c)
    }

    #[test]
    fn failed_commit_leaves_no_partial_state() {
        let (tracker, c) = flaky_setup();
        tracker.store().fail_commit.set(true);

        let err = tracker.record_completion_at(c.id, 5, at(1, 8)).unwrap_err();
        assert!(matches!(err, CoreError::Persistence(_)));
        assert_eq!(tracker.stats().unwrap(), UserStats::default());
        assert!(tracker.store().inner.list_all_completions().unwrap().is_empty());
    }

    #[test]
    fn partial_reset_is_reported() {
        let (tracker, c) = flaky_setup();
        tracker.record_completion_at(c.id, 5, at(1, 8)).unwrap();
        tracker.store().fail_save.set(true);

        let err = tracker.reset_stats().unwrap_err();
        match err {
            CoreError::InconsistentReset { done, failed } => {
                assert_eq!(done, vec![ResetStep::History]);
                assert_eq!(failed, vec![ResetStep::Totals]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(tracker.store().inner.list_all_completions().unwrap().is_empty());
        assert_eq!(tracker.stats().unwrap().total_challenges_completed, 1);
    }
}
