//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Picking the next challenge (rotation, or a filtered one-off)
//!   - Crediting minutes and recording a completion
//!   - Listing the bank with optional filters
//!   - History and the daily chart series
//!   - Application reset

use chrono::{Local, NaiveDate};
use tracing::{debug, info, instrument};

use crate::domain::{Challenge, ChallengeId, CompletedChallenge, DateRange};
use crate::error::CoreError;
use crate::protocol::{ChallengeListQuery, DailyOut, HistoryQuery};
use crate::reset::reset_application;
use crate::rotation::ChallengeFilter;
use crate::state::AppState;
use crate::store::ChallengeRepository;
use crate::tracker::{chart_range_from, CompletionReceipt};
use crate::util::{minutes_from_seconds, parse_day};

/// Upper bound for an explicitly reported effort, one day.
pub const MAX_REPORTED_MINUTES: u32 = 24 * 60;

/// Longest date range a history or daily query may span.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Rotation pick when `filter` is empty, otherwise a one-off filtered pick.
#[instrument(level = "info", skip(state))]
pub fn next_challenge(state: &AppState, filter: &ChallengeFilter) -> Result<Option<Challenge>, CoreError> {
  let mut rotation = state.rotation();
  let picked = if filter.is_empty() {
    rotation.next(&state.challenges)?
  } else {
    rotation.pick_filtered(&state.challenges, filter)?
  };
  match &picked {
    Some(c) => info!(target: "challenge", id = c.id, name = %c.name, shown = rotation.state().len(), "Challenge served"),
    None => info!(target: "challenge", "No challenge available"),
  }
  Ok(picked)
}

/// Minutes credited for a completion: an explicit value wins, then elapsed
/// seconds rounded up, then the challenge's full duration.
pub fn completion_minutes(
  challenge: &Challenge,
  minutes: Option<u32>,
  elapsed_secs: Option<u64>,
) -> Result<u32, CoreError> {
  if let Some(m) = minutes {
    if m > MAX_REPORTED_MINUTES {
      return Err(CoreError::InvalidInput(format!("minutes must be at most {MAX_REPORTED_MINUTES}")));
    }
    return Ok(m);
  }
  if let Some(secs) = elapsed_secs {
    return Ok(minutes_from_seconds(secs).min(MAX_REPORTED_MINUTES));
  }
  Ok(challenge.duration_minutes)
}

/// Look up the challenge, credit minutes, record the completion.
#[instrument(level = "info", skip(state))]
pub fn complete_challenge(
  state: &AppState,
  challenge_id: ChallengeId,
  minutes: Option<u32>,
  elapsed_secs: Option<u64>,
) -> Result<(u32, CompletionReceipt), CoreError> {
  // Needed for the duration fallback. The tracker checks existence again
  // under its writer lock, which covers a delete racing this call.
  let challenge = state
    .challenges
    .find_by_id(challenge_id)?
    .ok_or(CoreError::NotFound(challenge_id))?;
  let credited = completion_minutes(&challenge, minutes, elapsed_secs)?;
  debug!(target: "stats", challenge_id, credited, "Minutes credited");
  let receipt = state.tracker.record_completion(challenge_id, credited)?;
  Ok((credited, receipt))
}

/// The bank, narrowed by whichever filters are present.
pub fn list_challenges(state: &AppState, q: &ChallengeListQuery) -> Result<Vec<Challenge>, CoreError> {
  let (min, max) = match (q.min_duration, q.max_duration) {
    (Some(lo), Some(hi)) if lo > hi => {
      return Err(CoreError::InvalidInput("min_duration is greater than max_duration".into()));
    }
    (lo, hi) => (lo, hi),
  };

  // Let the store do the most selective filter, then narrow in memory.
  let mut found = if let Some(category) = q.category.as_deref() {
    state.challenges.find_by_category(category)?
  } else if let Some(d) = q.difficulty {
    state.challenges.find_by_difficulty(d)?
  } else if min.is_some() || max.is_some() {
    state.challenges.find_by_duration_range(min.unwrap_or(0), max.unwrap_or(u32::MAX))?
  } else {
    state.challenges.list_all()?
  };

  let filter = ChallengeFilter { category: q.category.clone(), difficulty: q.difficulty };
  found.retain(|c| {
    filter.matches(c)
      && min.map_or(true, |lo| c.duration_minutes >= lo)
      && max.map_or(true, |hi| c.duration_minutes <= hi)
  });
  Ok(found)
}

/// Optional `start`/`end` into a range; either side may be omitted. A
/// missing end means today; a missing start means the chart range ending
/// at `end`.
fn requested_range(state: &AppState, q: &HistoryQuery) -> Result<Option<DateRange>, CoreError> {
  let start = q.start.as_deref().map(|s| parse_day("start", s)).transpose()?;
  let end = q.end.as_deref().map(|s| parse_day("end", s)).transpose()?;
  let range = match (start, end) {
    (None, None) => return Ok(None),
    (Some(s), Some(e)) => DateRange::new(s, e)?,
    (Some(s), None) => DateRange::new(s, today().max(s))?,
    (None, Some(e)) => chart_range_from(state.tracker.earliest_completion()?, e),
  };
  if range.num_days() > MAX_RANGE_DAYS {
    return Err(CoreError::InvalidInput(format!("date range may span at most {MAX_RANGE_DAYS} days")));
  }
  Ok(Some(range))
}

/// Completions, newest first, optionally narrowed to a challenge and/or dates.
pub fn history(state: &AppState, q: &HistoryQuery) -> Result<Vec<CompletedChallenge>, CoreError> {
  let Some(range) = requested_range(state, q)? else {
    return match q.challenge_id {
      Some(id) => state.tracker.history_for_challenge(id),
      None => state.tracker.history_all(),
    };
  };
  let mut items = state.tracker.history(range)?;
  if let Some(id) = q.challenge_id {
    items.retain(|c| c.challenge_id == id);
  }
  Ok(items)
}

/// Counts and minutes per day, zero-filled, oldest first. Defaults to the chart range.
pub fn daily(state: &AppState, q: &HistoryQuery) -> Result<Vec<DailyOut>, CoreError> {
  let range = match requested_range(state, q)? {
    Some(r) => r,
    None => state.tracker.chart_range(today())?,
  };
  let counts = state.tracker.counts_by_date(range)?;
  let minutes = state.tracker.minutes_by_date(range)?;
  Ok(
    minutes
      .into_iter()
      .map(|(date, minutes)| DailyOut {
        date,
        count: counts.iter().find(|(d, _)| *d == date).map_or(0, |(_, n)| *n),
        minutes,
      })
      .collect(),
  )
}

/// Reset history, totals, reminder settings, the bank and the rotation.
#[instrument(level = "info", skip(state))]
pub fn reset_everything(state: &AppState) -> Result<usize, CoreError> {
  let mut rotation = state.rotation();
  reset_application(&state.tracker, &state.challenges, &state.notifications, &mut rotation, &state.defaults)
}

fn today() -> NaiveDate {
  Local::now().date_naive()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::rotation::ChallengeRotation;
  use crate::store::Database;

  fn state() -> AppState {
    AppState::with_rotation(Database::open_in_memory().unwrap(), &AppConfig::default(), ChallengeRotation::with_seed(4))
      .unwrap()
  }

  fn walk(state: &AppState) -> Challenge {
    state.challenges.list_all().unwrap().into_iter().find(|c| c.name == "Walk").unwrap()
  }

  #[test]
  fn minutes_rule() {
    let st = state();
    let c = walk(&st);
    assert_eq!(completion_minutes(&c, Some(7), Some(600)).unwrap(), 7);
    assert_eq!(completion_minutes(&c, None, Some(61)).unwrap(), 2);
    assert_eq!(completion_minutes(&c, None, None).unwrap(), 21);
    assert!(completion_minutes(&c, Some(MAX_REPORTED_MINUTES + 1), None).is_err());
  }

  #[test]
  fn complete_updates_stats_and_history() {
    let st = state();
    let c = walk(&st);
    let (minutes, receipt) = complete_challenge(&st, c.id, None, Some(90)).unwrap();
    assert_eq!(minutes, 2);
    assert_eq!(receipt.stats.total_minutes_exercised, 2);
    assert_eq!(receipt.stats.streak_days, 1);
    assert_eq!(history(&st, &HistoryQuery::default()).unwrap().len(), 1);

    let err = complete_challenge(&st, 9999, None, None).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(9999)));
  }

  #[test]
  fn rotation_then_filtered_pick() {
    let st = state();
    let total = st.challenges.count().unwrap();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..total {
      seen.insert(next_challenge(&st, &ChallengeFilter::default()).unwrap().unwrap().id);
    }
    assert_eq!(seen.len(), total);

    let mindful = ChallengeFilter { category: Some("mindfulness".into()), difficulty: None };
    assert_eq!(next_challenge(&st, &mindful).unwrap().unwrap().category, "Mindfulness");
  }

  #[test]
  fn listing_filters_combine() {
    let st = state();
    let q = ChallengeListQuery { category: Some("Strength".into()), difficulty: Some(3), ..Default::default() };
    let names: Vec<_> = list_challenges(&st, &q).unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Pull-ups", "Push-ups", "Handstand"]);

    let q = ChallengeListQuery { min_duration: Some(10), ..Default::default() };
    assert_eq!(list_challenges(&st, &q).unwrap().len(), 2);

    let q = ChallengeListQuery { min_duration: Some(10), max_duration: Some(5), ..Default::default() };
    assert!(matches!(list_challenges(&st, &q), Err(CoreError::InvalidInput(_))));
  }

  #[test]
  fn daily_series_is_zero_filled() {
    let st = state();
    let c = walk(&st);
    complete_challenge(&st, c.id, Some(5), None).unwrap();
    let q = HistoryQuery {
      start: Some((today() - chrono::Duration::days(2)).to_string()),
      end: Some(today().to_string()),
      challenge_id: None,
    };
    let days = daily(&st, &q).unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!((days[2].count, days[2].minutes), (1, 21));
    assert_eq!((days[0].count, days[0].minutes), (0, 0));
  }

  #[test]
  fn end_only_range_starts_at_first_completion() {
    let st = state();
    let c = walk(&st);
    let first = today() - chrono::Duration::days(3);
    st.tracker.record_completion_at(c.id, 5, first.and_hms_opt(8, 0, 0).unwrap()).unwrap();

    let q = HistoryQuery { start: None, end: Some(today().to_string()), challenge_id: None };
    let days = daily(&st, &q).unwrap();
    assert_eq!(days.len(), 4);
    assert_eq!(days[0].date, first);
    assert_eq!((days[0].count, days[0].minutes), (1, 21));
    assert_eq!(history(&st, &q).unwrap().len(), 1);

    // Nothing recorded before `end`: a single day.
    let q = HistoryQuery { start: None, end: Some((first - chrono::Duration::days(10)).to_string()), challenge_id: None };
    assert_eq!(daily(&st, &q).unwrap().len(), 1);
  }

  #[test]
  fn oversized_range_is_rejected() {
    let st = state();
    let q = HistoryQuery { start: Some("1970-01-01".into()), end: Some("2024-01-01".into()), challenge_id: None };
    assert!(matches!(daily(&st, &q), Err(CoreError::InvalidInput(_))));
    assert!(matches!(history(&st, &q), Err(CoreError::InvalidInput(_))));

    let q = HistoryQuery { start: Some("2023-01-01".into()), end: Some("2024-01-01".into()), challenge_id: None };
    assert_eq!(daily(&st, &q).unwrap().len(), MAX_RANGE_DAYS as usize);
  }

  #[test]
  fn reset_restores_defaults() {
    let st = state();
    st.challenges.delete(walk(&st).id).unwrap();
    let reseeded = reset_everything(&st).unwrap();
    assert_eq!(reseeded, st.defaults.len());
    assert_eq!(st.challenges.count().unwrap(), st.defaults.len());
  }
}
