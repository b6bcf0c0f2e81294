use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::engine::types::{
    now_iso, Battery, BatteryState, EngineError, PracticeSession, WordStatus, BATTERY_SIZE,
};

#[derive(Debug, Clone)]
pub struct Candidate {
    pub word_id: String,
    pub status: WordStatus,
    pub total_attempts: i64,
}

fn status_priority(status: WordStatus) -> u8 {
    match status {
        WordStatus::NeedsRevision => 0,
        WordStatus::Unseen => 1,
        WordStatus::Correct => 2,
    }
}

/// Picks up to BATTERY_SIZE word ids: revision words first, then unseen,
/// then mastered; more-attempted revision words surface earlier. The
/// shuffle runs before the stable sort, so ties resolve pseudo-randomly
/// but reproducibly for a given RNG.
pub fn select_battery_words(mut candidates: Vec<Candidate>, rng: &mut ChaCha8Rng) -> Vec<String> {
    candidates.shuffle(rng);
    candidates.sort_by(|a, b| {
        status_priority(a.status)
            .cmp(&status_priority(b.status))
            .then(b.total_attempts.cmp(&a.total_attempts))
    });

    candidates
        .into_iter()
        .take(BATTERY_SIZE)
        .map(|c| c.word_id)
        .collect()
}

fn map_battery_row(row: &sqlx::sqlite::SqliteRow) -> Result<Battery, EngineError> {
    let state_raw: String = row.try_get("state").unwrap_or_default();
    let state = BatteryState::parse(&state_raw)
        .ok_or_else(|| EngineError::Corrupt(format!("unknown battery state '{state_raw}'")))?;
    let word_ids_raw: String = row.try_get("wordIds").unwrap_or_default();
    let word_ids: Vec<String> = serde_json::from_str(&word_ids_raw)
        .map_err(|e| EngineError::Corrupt(format!("battery word ids decode failed: {e}")))?;

    Ok(Battery {
        id: row.try_get("id").unwrap_or_default(),
        session_id: row.try_get("sessionId").unwrap_or_default(),
        battery_number: row.try_get("batteryNumber").unwrap_or(1),
        phase: row.try_get("phase").unwrap_or(1),
        word_ids,
        state,
        created_at: row.try_get("createdAt").unwrap_or_default(),
        completed_at: row.try_get("completedAt").ok(),
    })
}

pub async fn find_battery(
    pool: &SqlitePool,
    session_id: &str,
    battery_number: i64,
    phase: i64,
) -> Result<Option<Battery>, EngineError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "batteries"
        WHERE "sessionId" = ? AND "batteryNumber" = ? AND "phase" = ?
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .bind(battery_number)
    .bind(phase)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(map_battery_row).transpose()
}

async fn load_candidates(
    pool: &SqlitePool,
    session: &PracticeSession,
) -> Result<Vec<Candidate>, EngineError> {
    let rows = sqlx::query(
        r#"
        SELECT
            w."id" AS "wordId",
            COALESCE(s."status", 'unseen') AS "status",
            COALESCE(s."totalAttempts", 0) AS "totalAttempts"
        FROM "words" w
        LEFT JOIN "word_phase_status" s
            ON s."wordId" = w."id" AND s."learnerId" = ? AND s."phase" = ?
        WHERE w."listId" = ? AND w."isActive" = 1
        ORDER BY w."createdAt", w."id"
        "#,
    )
    .bind(&session.learner_id)
    .bind(session.phase)
    .bind(&session.list_id)
    .fetch_all(pool)
    .await?;

    let mut candidates = Vec::with_capacity(rows.len());
    for row in &rows {
        let status_raw: String = row.try_get("status").unwrap_or_default();
        let status = WordStatus::parse(&status_raw)
            .ok_or_else(|| EngineError::Corrupt(format!("unknown word status '{status_raw}'")))?;
        candidates.push(Candidate {
            word_id: row.try_get("wordId").unwrap_or_default(),
            status,
            total_attempts: row.try_get("totalAttempts").unwrap_or(0),
        });
    }
    Ok(candidates)
}

/// Tops a short battery up with distinct words already drilled in earlier
/// batteries of the same phase, so multiple-choice phases always have
/// enough distractors.
async fn backfill_from_previous(
    pool: &SqlitePool,
    session: &PracticeSession,
    selected: &mut Vec<String>,
) -> Result<(), EngineError> {
    let rows = sqlx::query(
        r#"
        SELECT "wordIds" FROM "batteries"
        WHERE "sessionId" = ? AND "phase" = ? AND "batteryNumber" < ?
        ORDER BY "batteryNumber"
        "#,
    )
    .bind(&session.id)
    .bind(session.phase)
    .bind(session.battery_number)
    .fetch_all(pool)
    .await?;

    let mut seen: HashSet<String> = selected.iter().cloned().collect();
    for row in &rows {
        let raw: String = row.try_get("wordIds").unwrap_or_default();
        let ids: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Corrupt(format!("battery word ids decode failed: {e}")))?;
        for id in ids {
            if selected.len() >= BATTERY_SIZE {
                return Ok(());
            }
            if seen.insert(id.clone()) {
                selected.push(id);
            }
        }
    }
    Ok(())
}

/// Returns the battery for the session's current (batteryNumber, phase),
/// composing and persisting it when none exists yet. Concurrent creates
/// collapse onto the unique key.
pub async fn get_or_create_battery(
    pool: &SqlitePool,
    session: &PracticeSession,
    seed: Option<u64>,
) -> Result<Battery, EngineError> {
    if let Some(battery) =
        find_battery(pool, &session.id, session.battery_number, session.phase).await?
    {
        return Ok(battery);
    }

    let candidates = load_candidates(pool, session).await?;
    if candidates.is_empty() {
        return Err(EngineError::NoContentAvailable);
    }

    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut selected = select_battery_words(candidates, &mut rng);

    if selected.len() < BATTERY_SIZE && session.battery_number > 1 {
        backfill_from_previous(pool, session, &mut selected).await?;
    }

    let word_ids_json = serde_json::to_string(&selected)
        .map_err(|e| EngineError::Corrupt(format!("battery word ids encode failed: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO "batteries"
            ("id", "sessionId", "batteryNumber", "phase", "wordIds", "state", "createdAt")
        VALUES (?, ?, ?, ?, ?, 'active', ?)
        ON CONFLICT ("sessionId", "batteryNumber", "phase") DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&session.id)
    .bind(session.battery_number)
    .bind(session.phase)
    .bind(&word_ids_json)
    .bind(now_iso())
    .execute(pool)
    .await?;

    tracing::debug!(
        session = %session.id,
        battery = session.battery_number,
        phase = session.phase,
        words = selected.len(),
        "battery composed"
    );

    find_battery(pool, &session.id, session.battery_number, session.phase)
        .await?
        .ok_or_else(|| EngineError::Corrupt("battery vanished after insert".to_string()))
}
