//! Domain models: challenges, completion records, cumulative user stats.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub type ChallengeId = i64;
pub type CompletionId = i64;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 3;
pub const MAX_DURATION_MINUTES: u32 = 120;

/// An exercise prompt as stored in the challenge bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
  pub id: ChallengeId,
  pub name: String,
  pub description: String,
  pub category: String,
  pub difficulty: u8,        // 1 (easy) ..= 3 (hard)
  pub duration_minutes: u32,
  #[serde(default)] pub image_path: Option<String>,
}

/// Challenge fields before an id has been assigned (authoring, edits, seeding).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChallenge {
  pub name: String,
  pub description: String,
  pub category: String,
  pub difficulty: u8,
  pub duration_minutes: u32,
  #[serde(default)] pub image_path: Option<String>,
}

impl NewChallenge {
  /// Trim text fields and check ranges. Returns the cleaned value.
  pub fn validated(self) -> Result<Self, CoreError> {
    let name = self.name.trim().to_string();
    let description = self.description.trim().to_string();
    let category = self.category.trim().to_string();

    let mut problems: Vec<String> = vec![];
    if name.is_empty() { problems.push("name is required".into()); }
    if description.is_empty() { problems.push("description is required".into()); }
    if category.is_empty() { problems.push("category is required".into()); }
    if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
      problems.push(format!("difficulty must be between {} and {}", MIN_DIFFICULTY, MAX_DIFFICULTY));
    }
    if self.duration_minutes == 0 || self.duration_minutes > MAX_DURATION_MINUTES {
      problems.push(format!("duration must be between 1 and {} minutes", MAX_DURATION_MINUTES));
    }
    if !problems.is_empty() {
      return Err(CoreError::InvalidInput(problems.join("; ")));
    }

    let image_path = self.image_path
      .map(|p| p.trim().to_string())
      .filter(|p| !p.is_empty());

    Ok(Self { name, description, category, difficulty: self.difficulty, duration_minutes: self.duration_minutes, image_path })
  }

  pub fn with_id(self, id: ChallengeId) -> Challenge {
    Challenge {
      id,
      name: self.name,
      description: self.description,
      category: self.category,
      difficulty: self.difficulty,
      duration_minutes: self.duration_minutes,
      image_path: self.image_path,
    }
  }
}

/// Category labels are free text; lookups ignore case and surrounding space.
pub fn normalize_category(category: &str) -> String {
  category.trim().to_lowercase()
}

/// A completion event about to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCompletion {
  pub challenge_id: ChallengeId,
  pub completed_at: NaiveDateTime,
}

/// One recorded completion, joined with its challenge for display.
/// `challenge` is `None` when the challenge was deleted after the fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletedChallenge {
  pub id: CompletionId,
  pub challenge_id: ChallengeId,
  pub completed_at: NaiveDateTime,
  pub challenge: Option<Challenge>,
}

/// The single cumulative statistics record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
  pub total_challenges_completed: u32,
  pub total_minutes_exercised: u32,
  pub streak_days: u32,
  pub last_challenge_date: Option<NaiveDate>,
}

impl UserStats {
  /// Count one completion of `minutes` on calendar day `today`.
  pub fn apply_completion(&mut self, minutes: u32, today: NaiveDate) {
    self.total_challenges_completed = self.total_challenges_completed.saturating_add(1);
    self.total_minutes_exercised = self.total_minutes_exercised.saturating_add(minutes);
    self.update_streak(today);
  }

  /// Consecutive-day streak rule. `last_challenge_date` always ends up as `today`.
  pub fn update_streak(&mut self, today: NaiveDate) {
    self.streak_days = match self.last_challenge_date {
      None => 1,
      Some(last) if last == today => self.streak_days,
      Some(last) if last.succ_opt() == Some(today) => self.streak_days.saturating_add(1),
      // gap of two or more days, or the clock went backwards
      Some(_) => 1,
    };
    self.last_challenge_date = Some(today);
  }
}

/// Inclusive calendar-date range used by history queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
    if start > end {
      return Err(CoreError::InvalidInput(format!("start date {} is after end date {}", start, end)));
    }
    Ok(Self { start, end })
  }

  pub fn single(day: NaiveDate) -> Self {
    Self { start: day, end: day }
  }

  /// Number of days covered, both ends included.
  pub fn num_days(&self) -> i64 {
    (self.end - self.start).num_days() + 1
  }

  /// Position of `day` counted from `start`, if it falls inside the range.
  pub fn offset_of(&self, day: NaiveDate) -> Option<usize> {
    if day > self.end {
      return None;
    }
    usize::try_from((day - self.start).num_days()).ok()
  }

  /// Every day in the range, in order.
  pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
    let end = self.end;
    self.start.iter_days().take_while(move |d| *d <= end)
  }
}
