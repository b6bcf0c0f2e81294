use std::collections::VecDeque;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of words drilled as one unit.
pub const BATTERY_SIZE: usize = 5;

pub const FIRST_PHASE: i64 = 1;
pub const FINAL_PHASE: i64 = 3;

/// Per-(learner, word, phase) mastery marker. One vocabulary across the
/// whole engine; presentation-only states (colors, "settling") do not exist
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WordStatus {
    Unseen,
    Correct,
    NeedsRevision,
}

impl WordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordStatus::Unseen => "unseen",
            WordStatus::Correct => "correct",
            WordStatus::NeedsRevision => "needs_revision",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unseen" => Some(WordStatus::Unseen),
            "correct" => Some(WordStatus::Correct),
            "needs_revision" => Some(WordStatus::NeedsRevision),
            _ => None,
        }
    }

    pub fn from_correct(correct: bool) -> Self {
        if correct {
            WordStatus::Correct
        } else {
            WordStatus::NeedsRevision
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Active,
    Paused,
    Completed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Active => "active",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(RunState::Active),
            "paused" => Some(RunState::Paused),
            "completed" => Some(RunState::Completed),
            _ => None,
        }
    }
}

/// Explicit, serializable round tracking. Stored on the session row and
/// carried through every controller call, so an interrupted run resumes
/// exactly where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RoundState {
    #[serde(rename_all = "camelCase")]
    FirstRound {
        position: usize,
        missed: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    RepeatRound { queue: VecDeque<String> },
    PerfectScoreHold,
}

impl RoundState {
    pub fn fresh() -> Self {
        RoundState::FirstRound {
            position: 0,
            missed: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Corrupt(format!("round state encode failed: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::Corrupt(format!("round state decode failed: {e}")))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: String,
    pub learner_id: String,
    pub list_id: String,
    pub phase: i64,
    pub battery_number: i64,
    pub run_state: RunState,
    pub round_state: RoundState,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryState {
    Active,
    Completed,
}

impl BatteryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryState::Active => "active",
            BatteryState::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(BatteryState::Active),
            "completed" => Some(BatteryState::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Battery {
    pub id: String,
    pub session_id: String,
    pub battery_number: i64,
    pub phase: i64,
    pub word_ids: Vec<String>,
    pub state: BatteryState,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPhaseStatus {
    pub learner_id: String,
    pub word_id: String,
    pub phase: i64,
    pub status: WordStatus,
    pub first_attempt_correct: Option<bool>,
    pub total_attempts: i64,
    pub last_attempt_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAttempt {
    pub id: String,
    pub session_id: String,
    pub word_id: String,
    pub phase: i64,
    pub battery_number: i64,
    pub attempt_number: i64,
    pub is_correct: bool,
    pub response_given: String,
    pub displayed_response: Option<String>,
    pub autocorrect_used: bool,
    pub created_at: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active words available for this list")]
    NoContentAvailable,
    #[error("word list not found")]
    ListNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("session is {0}")]
    SessionNotActive(String),
    #[error("stale attempt: {0}")]
    StaleAttempt(String),
    #[error("no pending completion to acknowledge")]
    NothingToAcknowledge,
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("corrupt state: {0}")]
    Corrupt(String),
}

pub fn validate_phase(phase: i64) -> Result<(), EngineError> {
    if (FIRST_PHASE..=FINAL_PHASE).contains(&phase) {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "phase must be between {FIRST_PHASE} and {FINAL_PHASE}, got {phase}"
        )))
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
