use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::config::AdvanceGate;
use crate::engine::attempts::{self, RecordOutcome};
use crate::engine::composer;
use crate::engine::content;
use crate::engine::evaluation::{self, AnswerInput};
use crate::engine::sessions;
use crate::engine::types::{
    now_iso, validate_phase, Battery, EngineError, PracticeSession, RoundState, RunState,
    WordAttempt, WordPhaseStatus, FINAL_PHASE,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProgressionEvent {
    InRound,
    RepeatRoundStarted,
    #[serde(rename_all = "camelCase")]
    NextBattery { battery_number: i64 },
    #[serde(rename_all = "camelCase")]
    PhaseAdvanced { phase: i64 },
    PerfectScoreHold,
    SessionCompleted,
}

#[derive(Debug, Clone)]
pub struct SubmitAttempt {
    pub word_id: String,
    pub phase: i64,
    pub battery_number: i64,
    pub answer: AnswerInput,
    pub attempt_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub attempt_number: i64,
    pub correct: bool,
    pub autocorrect_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WordPhaseStatus>,
    pub round_state: RoundState,
    pub progression: ProgressionEvent,
    pub perfect_score: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Continue,
    RepeatStarted,
    BatteryFinished { perfect: bool },
}

/// The word the round expects next: the battery's word at the current
/// position during FirstRound, the queue head during RepeatRound.
pub fn expected_word<'a>(round: &'a RoundState, battery_words: &'a [String]) -> Option<&'a str> {
    match round {
        RoundState::FirstRound { position, .. } => {
            battery_words.get(*position).map(|s| s.as_str())
        }
        RoundState::RepeatRound { queue } => queue.front().map(|s| s.as_str()),
        RoundState::PerfectScoreHold => None,
    }
}

/// Advances the round value by one answered word. FirstRound collects
/// misses in presentation order; RepeatRound pops the head and re-appends
/// it on a wrong answer, which is what makes the FIFO guarantee hold.
pub fn advance_round(
    round: &RoundState,
    word_id: &str,
    correct: bool,
    battery_len: usize,
) -> (RoundState, RoundOutcome) {
    match round {
        RoundState::FirstRound { position, missed } => {
            let mut missed = missed.clone();
            if !correct {
                missed.push(word_id.to_string());
            }
            let position = position + 1;
            if position < battery_len {
                (
                    RoundState::FirstRound { position, missed },
                    RoundOutcome::Continue,
                )
            } else if missed.is_empty() {
                (
                    RoundState::FirstRound { position, missed },
                    RoundOutcome::BatteryFinished { perfect: true },
                )
            } else {
                (
                    RoundState::RepeatRound {
                        queue: missed.into_iter().collect(),
                    },
                    RoundOutcome::RepeatStarted,
                )
            }
        }
        RoundState::RepeatRound { queue } => {
            let mut queue = queue.clone();
            queue.pop_front();
            if !correct {
                queue.push_back(word_id.to_string());
            }
            if queue.is_empty() {
                (
                    RoundState::RepeatRound { queue },
                    RoundOutcome::BatteryFinished { perfect: false },
                )
            } else {
                (RoundState::RepeatRound { queue }, RoundOutcome::Continue)
            }
        }
        // Callers reject attempts while a hold is pending.
        RoundState::PerfectScoreHold => (RoundState::PerfectScoreHold, RoundOutcome::Continue),
    }
}

async fn count_unmastered(
    conn: &mut SqliteConnection,
    gate: AdvanceGate,
    learner_id: &str,
    list_id: &str,
    phase: i64,
) -> Result<i64, EngineError> {
    let count: i64 = match gate {
        AdvanceGate::EntireList => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM "words" w
                WHERE w."listId" = ? AND w."isActive" = 1
                  AND NOT EXISTS (
                    SELECT 1 FROM "word_phase_status" s
                    WHERE s."learnerId" = ? AND s."wordId" = w."id"
                      AND s."phase" = ? AND s."status" = 'correct'
                  )
                "#,
            )
            .bind(list_id)
            .bind(learner_id)
            .bind(phase)
            .fetch_one(conn)
            .await?
        }
        AdvanceGate::Encountered => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM "words" w
                JOIN "word_phase_status" s
                    ON s."wordId" = w."id" AND s."learnerId" = ? AND s."phase" = ?
                WHERE w."listId" = ? AND w."isActive" = 1 AND s."status" != 'correct'
                "#,
            )
            .bind(learner_id)
            .bind(phase)
            .bind(list_id)
            .fetch_one(conn)
            .await?
        }
    };
    Ok(count)
}

/// Applies the BatteryComplete evaluation: closes the battery, checks the
/// list-wide mastery gate, and moves the session to the next battery, the
/// next phase, or completion. Reads current session state first, so a
/// replayed call settles as a no-op instead of double-advancing.
async fn finish_battery(
    conn: &mut SqliteConnection,
    gate: AdvanceGate,
    session: &PracticeSession,
    battery: &Battery,
) -> Result<ProgressionEvent, EngineError> {
    sqlx::query(
        r#"
        UPDATE "batteries" SET "state" = 'completed', "completedAt" = ?
        WHERE "id" = ? AND "state" = 'active'
        "#,
    )
    .bind(now_iso())
    .bind(&battery.id)
    .execute(&mut *conn)
    .await?;

    let remaining = count_unmastered(
        &mut *conn,
        gate,
        &session.learner_id,
        &session.list_id,
        session.phase,
    )
    .await?;

    if remaining == 0 {
        if session.phase < FINAL_PHASE {
            let next_phase = session.phase + 1;
            sessions::store_phase_advance(conn, &session.id, next_phase).await?;
            tracing::info!(session = %session.id, phase = next_phase, "phase advanced");
            Ok(ProgressionEvent::PhaseAdvanced { phase: next_phase })
        } else {
            sessions::store_completion(conn, &session.id).await?;
            tracing::info!(session = %session.id, "session completed");
            Ok(ProgressionEvent::SessionCompleted)
        }
    } else {
        let next_battery = session.battery_number + 1;
        sessions::store_next_battery(conn, &session.id, next_battery).await?;
        Ok(ProgressionEvent::NextBattery {
            battery_number: next_battery,
        })
    }
}

async fn replay_outcome(
    pool: &sqlx::SqlitePool,
    session: &PracticeSession,
    prev: WordAttempt,
) -> Result<SubmitOutcome, EngineError> {
    let status = attempts::statuses_for_words(
        pool,
        &session.learner_id,
        prev.phase,
        std::slice::from_ref(&prev.word_id),
    )
    .await?
    .into_iter()
    .next();

    Ok(SubmitOutcome {
        accepted: false,
        attempt_number: prev.attempt_number,
        correct: prev.is_correct,
        autocorrect_used: prev.autocorrect_used,
        displayed: prev.displayed_response,
        status,
        round_state: session.round_state.clone(),
        progression: ProgressionEvent::InRound,
        perfect_score: false,
    })
}

/// Evaluates and records one answer, then drives the round state machine.
/// The attempt insert, the status upsert, and every progression write land
/// in one transaction.
pub async fn submit_attempt(
    pool: &sqlx::SqlitePool,
    gate: AdvanceGate,
    learner_id: &str,
    session_id: &str,
    input: SubmitAttempt,
) -> Result<SubmitOutcome, EngineError> {
    validate_phase(input.phase)?;

    let session = sessions::find_owned(pool, session_id, learner_id).await?;

    // A retried submission must short-circuit before any state guard: the
    // original may already have advanced the round, the battery, or even
    // completed the session.
    if let Some(attempt_id) = &input.attempt_id {
        if let Some(prev) = attempts::find_attempt(pool, &session.id, attempt_id).await? {
            return replay_outcome(pool, &session, prev).await;
        }
    }

    match session.run_state {
        RunState::Active => {}
        RunState::Paused => return Err(EngineError::SessionNotActive("paused".to_string())),
        RunState::Completed => return Err(EngineError::SessionNotActive("completed".to_string())),
    }

    if session.phase != input.phase || session.battery_number != input.battery_number {
        return Err(EngineError::StaleAttempt(format!(
            "session is at phase {} battery {}, attempt targeted phase {} battery {}",
            session.phase, session.battery_number, input.phase, input.battery_number
        )));
    }

    if session.round_state == RoundState::PerfectScoreHold {
        return Err(EngineError::StaleAttempt(
            "completion acknowledgement is pending".to_string(),
        ));
    }

    let battery = composer::find_battery(pool, &session.id, session.battery_number, session.phase)
        .await?
        .ok_or_else(|| {
            EngineError::StaleAttempt("battery not composed yet; fetch the battery first".to_string())
        })?;

    if !battery.word_ids.iter().any(|id| id == &input.word_id) {
        return Err(EngineError::StaleAttempt(
            "word is not part of the current battery".to_string(),
        ));
    }

    match expected_word(&session.round_state, &battery.word_ids) {
        Some(expected) if expected == input.word_id => {}
        Some(expected) => {
            return Err(EngineError::StaleAttempt(format!(
                "round expects word {expected} next"
            )));
        }
        None => {
            return Err(EngineError::Corrupt(
                "round state has no next word".to_string(),
            ));
        }
    }

    let word = content::get_word(pool, &input.word_id)
        .await?
        .ok_or_else(|| EngineError::Corrupt("battery references an unknown word".to_string()))?;
    let eval = evaluation::evaluate(session.phase, &word, &input.answer)?;

    let attempt_id = input
        .attempt_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut tx = pool.begin().await?;

    let recorded = attempts::record_attempt(
        &mut tx,
        &attempt_id,
        &session.id,
        learner_id,
        &input.word_id,
        session.phase,
        session.battery_number,
        &eval,
    )
    .await?;

    let (attempt_number, status) = match recorded {
        RecordOutcome::Duplicate(prev) => {
            tx.rollback().await?;
            return replay_outcome(pool, &session, prev).await;
        }
        RecordOutcome::Recorded {
            attempt_number,
            status,
        } => (attempt_number, status),
    };

    let (new_round, outcome) = advance_round(
        &session.round_state,
        &input.word_id,
        eval.correct,
        battery.word_ids.len(),
    );

    let (round_state, progression, perfect_score) = match outcome {
        RoundOutcome::Continue => {
            sessions::store_round_state(&mut tx, &session.id, &new_round).await?;
            (new_round, ProgressionEvent::InRound, false)
        }
        RoundOutcome::RepeatStarted => {
            sessions::store_round_state(&mut tx, &session.id, &new_round).await?;
            (new_round, ProgressionEvent::RepeatRoundStarted, false)
        }
        RoundOutcome::BatteryFinished { perfect } => {
            if perfect && session.phase == FINAL_PHASE {
                let hold = RoundState::PerfectScoreHold;
                sessions::store_round_state(&mut tx, &session.id, &hold).await?;
                (hold, ProgressionEvent::PerfectScoreHold, true)
            } else {
                let event = finish_battery(&mut tx, gate, &session, &battery).await?;
                (RoundState::fresh(), event, false)
            }
        }
    };

    tx.commit().await?;

    Ok(SubmitOutcome {
        accepted: true,
        attempt_number,
        correct: eval.correct,
        autocorrect_used: eval.autocorrect_used,
        displayed: eval.displayed,
        status: Some(status),
        round_state,
        progression,
        perfect_score,
    })
}

/// Applies the BatteryComplete evaluation that a PerfectScoreHold deferred.
/// Acknowledging an already-completed session is a no-op success.
pub async fn acknowledge_completion(
    pool: &sqlx::SqlitePool,
    gate: AdvanceGate,
    learner_id: &str,
    session_id: &str,
) -> Result<(PracticeSession, ProgressionEvent), EngineError> {
    let session = sessions::find_owned(pool, session_id, learner_id).await?;

    if session.run_state == RunState::Completed {
        return Ok((session, ProgressionEvent::SessionCompleted));
    }

    if session.round_state != RoundState::PerfectScoreHold {
        return Err(EngineError::NothingToAcknowledge);
    }

    let battery = composer::find_battery(pool, &session.id, session.battery_number, session.phase)
        .await?
        .ok_or_else(|| EngineError::Corrupt("held session has no battery".to_string()))?;

    let mut tx = pool.begin().await?;
    let event = finish_battery(&mut tx, gate, &session, &battery).await?;
    tx.commit().await?;

    let refreshed = sessions::find_owned(pool, session_id, learner_id).await?;
    Ok((refreshed, event))
}
