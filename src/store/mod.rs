//! Persistence collaborators: repository traits and their SQLite implementations.
//!
//! Core components only see the traits; the SQLite types add the authoring
//! and reporting queries the HTTP layer needs.

use crate::domain::{
    Challenge, ChallengeId, CompletedChallenge, DateRange, NewChallenge, NewCompletion, UserStats,
};

mod challenges;
mod db;
mod settings;
mod stats;

pub use challenges::SqliteChallenges;
pub use db::Database;
pub use settings::SqliteSettings;
pub use stats::SqliteStats;

/// Text layouts used for dates and timestamps in the database.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Read access to the challenge bank, plus the reseed used by application reset.
pub trait ChallengeRepository {
    fn list_all(&self) -> Result<Vec<Challenge>, StoreError>;

    fn find_by_id(&self, id: ChallengeId) -> Result<Option<Challenge>, StoreError>;

    /// Delete every challenge and insert `defaults`. Returns the number inserted.
    fn replace_all(&self, defaults: &[NewChallenge]) -> Result<usize, StoreError>;
}

/// Completion history and the single cumulative stats record.
pub trait StatsRepository {
    fn load_stats(&self) -> Result<Option<UserStats>, StoreError>;

    fn save_stats(&self, stats: &UserStats) -> Result<(), StoreError>;

    fn append_completion(&self, completion: &NewCompletion) -> Result<CompletedChallenge, StoreError>;

    /// Append `completion` and save `stats` as one unit: either both land or neither does.
    fn commit_completion(
        &self,
        completion: &NewCompletion,
        stats: &UserStats,
    ) -> Result<CompletedChallenge, StoreError>;

    /// Returns the number of rows deleted.
    fn delete_all_completions(&self) -> Result<usize, StoreError>;

    /// Completions whose calendar date falls inside `range`, newest first.
    fn list_completions(&self, range: DateRange) -> Result<Vec<CompletedChallenge>, StoreError>;
}
