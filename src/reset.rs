//! Whole-application reset: history, totals, reminders, challenge bank, rotation.

use tracing::{info, instrument, warn};

use crate::domain::NewChallenge;
use crate::error::{CoreError, ResetStep};
use crate::notifications::NotificationConfig;
use crate::rotation::ChallengeRotation;
use crate::store::{ChallengeRepository, StatsRepository};
use crate::tracker::StatsTracker;

/// Run every reset step, even after a failure, and report which ones did
/// not complete. On success returns the number of reseeded challenges.
#[instrument(level = "info", skip_all, fields(defaults = defaults.len()))]
pub fn reset_application<C, S, R, N>(
    tracker: &StatsTracker<C, S>,
    challenges: &R,
    notifications: &N,
    rotation: &mut ChallengeRotation,
    defaults: &[NewChallenge],
) -> Result<usize, CoreError>
where
    C: ChallengeRepository,
    S: StatsRepository,
    R: ChallengeRepository + ?Sized,
    N: NotificationConfig + ?Sized,
{
    let mut done = Vec::new();
    let mut failed = Vec::new();

    match tracker.reset_stats() {
        Ok(()) => done.extend([ResetStep::History, ResetStep::Totals]),
        Err(CoreError::InconsistentReset { done: d, failed: f }) => {
            done.extend(d);
            failed.extend(f);
        }
        Err(e) => {
            // the history delete failed, so the totals step never ran
            warn!(target: "stats", error = %e, "Stats reset failed");
            failed.extend([ResetStep::History, ResetStep::Totals]);
        }
    }

    match notifications.restore_defaults() {
        Ok(()) => done.push(ResetStep::Notifications),
        Err(e) => {
            warn!(target: "reminder", error = %e, "Could not restore notification defaults");
            failed.push(ResetStep::Notifications);
        }
    }

    let reseeded = match challenges.replace_all(defaults) {
        Ok(n) => {
            done.push(ResetStep::Challenges);
            n
        }
        Err(e) => {
            warn!(target: "challenge", error = %e, "Could not restore default challenges");
            failed.push(ResetStep::Challenges);
            0
        }
    };

    rotation.reset();

    if !failed.is_empty() {
        return Err(CoreError::InconsistentReset { done, failed });
    }
    info!(target: "fitchallenge_backend", reseeded, "Application reset");
    Ok(reseeded)
}
