use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::engine::types::{now_iso, EngineError, PracticeSession, RoundState, RunState};

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PracticeSession, EngineError> {
    let run_state_raw: String = row.try_get("runState").unwrap_or_default();
    let round_state_raw: String = row.try_get("roundState").unwrap_or_default();

    let run_state = RunState::parse(&run_state_raw)
        .ok_or_else(|| EngineError::Corrupt(format!("unknown run state '{run_state_raw}'")))?;
    let round_state = RoundState::from_json(&round_state_raw)?;

    Ok(PracticeSession {
        id: row.try_get("id").unwrap_or_default(),
        learner_id: row.try_get("learnerId").unwrap_or_default(),
        list_id: row.try_get("listId").unwrap_or_default(),
        phase: row.try_get("phase").unwrap_or(1),
        battery_number: row.try_get("batteryNumber").unwrap_or(1),
        run_state,
        round_state,
        created_at: row.try_get("createdAt").unwrap_or_default(),
        updated_at: row.try_get("updatedAt").unwrap_or_default(),
        completed_at: row.try_get("completedAt").ok(),
    })
}

async fn select_by_key(
    pool: &SqlitePool,
    learner_id: &str,
    list_id: &str,
) -> Result<Option<PracticeSession>, EngineError> {
    let row = sqlx::query(
        r#"SELECT * FROM "practice_sessions" WHERE "learnerId" = ? AND "listId" = ? LIMIT 1"#,
    )
    .bind(learner_id)
    .bind(list_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_session_row).transpose()
}

/// Returns the learner's session for a list, creating it at phase 1 /
/// battery 1 when none exists. Concurrent creates collapse onto the
/// UNIQUE(learnerId, listId) constraint instead of erroring.
pub async fn get_or_create(
    pool: &SqlitePool,
    learner_id: &str,
    list_id: &str,
) -> Result<(PracticeSession, bool), EngineError> {
    if let Some(session) = select_by_key(pool, learner_id, list_id).await? {
        return Ok((session, false));
    }

    let now = now_iso();
    let round_json = RoundState::fresh().to_json()?;
    let result = sqlx::query(
        r#"
        INSERT INTO "practice_sessions"
            ("id", "learnerId", "listId", "phase", "batteryNumber", "runState", "roundState", "createdAt", "updatedAt")
        VALUES (?, ?, ?, 1, 1, 'active', ?, ?, ?)
        ON CONFLICT ("learnerId", "listId") DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(learner_id)
    .bind(list_id)
    .bind(&round_json)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let created = result.rows_affected() == 1;
    let session = select_by_key(pool, learner_id, list_id)
        .await?
        .ok_or(EngineError::SessionNotFound)?;
    Ok((session, created))
}

/// Loads a session, failing closed: a session owned by a different learner
/// is indistinguishable from a missing one.
pub async fn find_owned(
    pool: &SqlitePool,
    session_id: &str,
    learner_id: &str,
) -> Result<PracticeSession, EngineError> {
    let row = sqlx::query(
        r#"SELECT * FROM "practice_sessions" WHERE "id" = ? AND "learnerId" = ? LIMIT 1"#,
    )
    .bind(session_id)
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => map_session_row(&row),
        None => Err(EngineError::SessionNotFound),
    }
}

/// Toggles run state without touching phase, battery, or any status rows.
/// Pausing a paused session (or resuming an active one) is a no-op success.
pub async fn set_run_state(
    pool: &SqlitePool,
    session_id: &str,
    learner_id: &str,
    target: RunState,
) -> Result<PracticeSession, EngineError> {
    let session = find_owned(pool, session_id, learner_id).await?;

    match (session.run_state, target) {
        (RunState::Completed, _) => {
            return Err(EngineError::SessionNotActive("completed".to_string()))
        }
        (current, target) if current == target => return Ok(session),
        (_, RunState::Completed) => {
            return Err(EngineError::Validation(
                "completion is driven by progression, not by run-state updates".to_string(),
            ))
        }
        _ => {}
    }

    sqlx::query(
        r#"UPDATE "practice_sessions" SET "runState" = ?, "updatedAt" = ? WHERE "id" = ?"#,
    )
    .bind(target.as_str())
    .bind(now_iso())
    .bind(session_id)
    .execute(pool)
    .await?;

    find_owned(pool, session_id, learner_id).await
}

pub(crate) async fn store_round_state(
    conn: &mut SqliteConnection,
    session_id: &str,
    round: &RoundState,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"UPDATE "practice_sessions" SET "roundState" = ?, "updatedAt" = ? WHERE "id" = ?"#,
    )
    .bind(round.to_json()?)
    .bind(now_iso())
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn store_next_battery(
    conn: &mut SqliteConnection,
    session_id: &str,
    next_battery: i64,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        UPDATE "practice_sessions"
        SET "batteryNumber" = ?, "roundState" = ?, "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(next_battery)
    .bind(RoundState::fresh().to_json()?)
    .bind(now_iso())
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn store_phase_advance(
    conn: &mut SqliteConnection,
    session_id: &str,
    next_phase: i64,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        UPDATE "practice_sessions"
        SET "phase" = ?, "batteryNumber" = 1, "roundState" = ?, "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(next_phase)
    .bind(RoundState::fresh().to_json()?)
    .bind(now_iso())
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn store_completion(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<(), EngineError> {
    let now = now_iso();
    sqlx::query(
        r#"
        UPDATE "practice_sessions"
        SET "runState" = 'completed', "roundState" = ?, "completedAt" = ?, "updatedAt" = ?
        WHERE "id" = ? AND "runState" != 'completed'
        "#,
    )
    .bind(RoundState::fresh().to_json()?)
    .bind(&now)
    .bind(&now)
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(())
}
