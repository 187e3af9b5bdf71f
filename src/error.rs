//! Error taxonomy for core operations.
//!
//! An empty challenge bank is not an error: selectors return `Ok(None)`.

use serde::Serialize;

use crate::domain::ChallengeId;
use crate::store::StoreError;

/// A sub-step of a stats or application reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStep {
    /// Completion history deleted.
    History,
    /// Cumulative totals and streak zeroed.
    Totals,
    /// Notification settings restored to defaults.
    Notifications,
    /// Challenge bank deleted and reseeded.
    Challenges,
}

impl ResetStep {
    fn describe_done(&self) -> &'static str {
        match self {
            Self::History => "history cleared",
            Self::Totals => "totals reset",
            Self::Notifications => "notification settings restored",
            Self::Challenges => "default challenges restored",
        }
    }

    fn describe_failed(&self) -> &'static str {
        match self {
            Self::History => "history not cleared",
            Self::Totals => "totals not reset",
            Self::Notifications => "notification settings not restored",
            Self::Challenges => "default challenges not restored",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("challenge {0} not found")]
    NotFound(ChallengeId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("reset incomplete: {failed:?} failed after {done:?} succeeded")]
    InconsistentReset {
        done: Vec<ResetStep>,
        failed: Vec<ResetStep>,
    },
}

impl CoreError {
    /// One sentence suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(id) => format!("The challenge #{id} no longer exists."),
            Self::InvalidInput(msg) => format!("Please fix the following: {msg}."),
            Self::Persistence(_) => "Your data could not be saved or loaded. Please try again.".into(),
            Self::InconsistentReset { done, failed } => {
                let mut parts: Vec<&str> = done.iter().map(ResetStep::describe_done).collect();
                let failed_parts: Vec<&str> = failed.iter().map(ResetStep::describe_failed).collect();
                if parts.is_empty() {
                    parts = failed_parts;
                    return capitalize(&parts.join(", "));
                }
                capitalize(&format!("{} but {}", parts.join(", "), failed_parts.join(", ")))
            }
        }
    }

    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Persistence(_) => "persistence_failure",
            Self::InconsistentReset { .. } => "inconsistent_reset",
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_reset_message_names_both_sides() {
        let err = CoreError::InconsistentReset {
            done: vec![ResetStep::History],
            failed: vec![ResetStep::Totals],
        };
        assert_eq!(err.user_message(), "History cleared but totals not reset.");
        assert_eq!(err.kind(), "inconsistent_reset");
    }

    #[test]
    fn total_reset_failure_lists_failures_only() {
        let err = CoreError::InconsistentReset {
            done: vec![],
            failed: vec![ResetStep::History, ResetStep::Challenges],
        };
        assert_eq!(err.user_message(), "History not cleared, default challenges not restored.");
    }
}
