//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Field names are camelCase on the wire; internal types stay snake_case.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{Challenge, ChallengeId, CompletedChallenge, NewChallenge, UserStats};
use crate::error::ResetStep;
use crate::timer::TimerStatus;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NextChallenge {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        difficulty: Option<u8>,
    },
    StartTimer {
        #[serde(rename = "challengeId")]
        challenge_id: ChallengeId,
    },
    PauseTimer,
    ResumeTimer,
    StopTimer,
    Complete,
    GetStats,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Challenge {
        challenge: Option<ChallengeOut>,
    },
    Timer {
        status: TimerStatus,
        remaining: u32,
        display: String,
    },
    TimerFinished {
        #[serde(rename = "challengeId")]
        challenge_id: ChallengeId,
    },
    Completed {
        minutes: u32,
        stats: StatsOut,
    },
    Stats {
        stats: StatsOut,
    },
    Reminder {
        title: String,
        message: String,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for challenge delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOut {
    pub id: ChallengeId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: u8,
    pub duration_minutes: u32,
    pub image_path: Option<String>,
}

impl From<&Challenge> for ChallengeOut {
    fn from(c: &Challenge) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            difficulty: c.difficulty,
            duration_minutes: c.duration_minutes,
            image_path: c.image_path.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOut {
    pub total_challenges_completed: u32,
    pub total_minutes_exercised: u32,
    pub streak_days: u32,
    pub last_challenge_date: Option<NaiveDate>,
}

impl From<&UserStats> for StatsOut {
    fn from(s: &UserStats) -> Self {
        Self {
            total_challenges_completed: s.total_challenges_completed,
            total_minutes_exercised: s.total_minutes_exercised,
            streak_days: s.streak_days,
            last_challenge_date: s.last_challenge_date,
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct NextOut {
    pub challenge: Option<ChallengeOut>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextChallengeQuery {
    pub category: Option<String>,
    pub difficulty: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeListQuery {
    pub category: Option<String>,
    pub difficulty: Option<u8>,
    pub min_duration: Option<u32>,
    pub max_duration: Option<u32>,
}

/// Body for create and edit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeIn {
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: u8,
    pub duration_minutes: u32,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl From<ChallengeIn> for NewChallenge {
    fn from(c: ChallengeIn) -> Self {
        Self {
            name: c.name,
            description: c.description,
            category: c.category,
            difficulty: c.difficulty,
            duration_minutes: c.duration_minutes,
            image_path: c.image_path,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionIn {
    pub challenge_id: ChallengeId,
    #[serde(default)]
    pub minutes: Option<u32>,
    #[serde(default)]
    pub elapsed_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOut {
    pub id: i64,
    pub challenge_id: ChallengeId,
    pub completed_at: NaiveDateTime,
    pub challenge: Option<ChallengeOut>,
}

impl From<&CompletedChallenge> for CompletionOut {
    fn from(c: &CompletedChallenge) -> Self {
        Self {
            id: c.id,
            challenge_id: c.challenge_id,
            completed_at: c.completed_at,
            challenge: c.challenge.as_ref().map(ChallengeOut::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptOut {
    pub minutes: u32,
    pub completion: CompletionOut,
    pub stats: StatsOut,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "challengeId")]
    pub challenge_id: Option<ChallengeId>,
}

#[derive(Debug, Serialize)]
pub struct CategoryCountOut {
    pub category: String,
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct DailyOut {
    pub date: NaiveDate,
    pub count: u32,
    pub minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct ResetOut {
    pub ok: bool,
    pub reseeded: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<ResetStep>>,
}
