use serde::Serialize;
use sqlx::{QueryBuilder, Row, SqliteConnection, SqlitePool};

use crate::engine::evaluation::Evaluated;
use crate::engine::types::{now_iso, EngineError, WordAttempt, WordPhaseStatus, WordStatus};

fn map_status_row(row: &sqlx::sqlite::SqliteRow) -> Result<WordPhaseStatus, EngineError> {
    let status_raw: String = row.try_get("status").unwrap_or_default();
    let status = WordStatus::parse(&status_raw)
        .ok_or_else(|| EngineError::Corrupt(format!("unknown word status '{status_raw}'")))?;
    let first_attempt_correct: Option<i64> = row.try_get("firstAttemptCorrect").ok();

    Ok(WordPhaseStatus {
        learner_id: row.try_get("learnerId").unwrap_or_default(),
        word_id: row.try_get("wordId").unwrap_or_default(),
        phase: row.try_get("phase").unwrap_or(1),
        status,
        first_attempt_correct: first_attempt_correct.map(|v| v != 0),
        total_attempts: row.try_get("totalAttempts").unwrap_or(0),
        last_attempt_at: row.try_get("lastAttemptAt").ok(),
    })
}

fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> WordAttempt {
    let is_correct: i64 = row.try_get("isCorrect").unwrap_or(0);
    let autocorrect_used: i64 = row.try_get("autocorrectUsed").unwrap_or(0);
    WordAttempt {
        id: row.try_get("id").unwrap_or_default(),
        session_id: row.try_get("sessionId").unwrap_or_default(),
        word_id: row.try_get("wordId").unwrap_or_default(),
        phase: row.try_get("phase").unwrap_or(1),
        battery_number: row.try_get("batteryNumber").unwrap_or(1),
        attempt_number: row.try_get("attemptNumber").unwrap_or(1),
        is_correct: is_correct != 0,
        response_given: row.try_get("responseGiven").unwrap_or_default(),
        displayed_response: row.try_get("displayedResponse").ok(),
        autocorrect_used: autocorrect_used != 0,
        created_at: row.try_get("createdAt").unwrap_or_default(),
    }
}

pub async fn find_attempt(
    pool: &SqlitePool,
    session_id: &str,
    attempt_id: &str,
) -> Result<Option<WordAttempt>, EngineError> {
    let row = sqlx::query(r#"SELECT * FROM "word_attempts" WHERE "id" = ? AND "sessionId" = ? LIMIT 1"#)
        .bind(attempt_id)
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(map_attempt_row))
}

pub enum RecordOutcome {
    Recorded {
        attempt_number: i64,
        status: WordPhaseStatus,
    },
    /// The same attempt id was already written; the stored fact is returned
    /// untouched so a client retry cannot double-count.
    Duplicate(WordAttempt),
}

/// Appends one attempt and upserts the mastery record as a single unit.
/// Runs on the caller's transaction: attempt numbering (count-then-insert)
/// and the status upsert commit or roll back together.
pub(crate) async fn record_attempt(
    conn: &mut SqliteConnection,
    attempt_id: &str,
    session_id: &str,
    learner_id: &str,
    word_id: &str,
    phase: i64,
    battery_number: i64,
    eval: &Evaluated,
) -> Result<RecordOutcome, EngineError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "word_attempts"
        WHERE "sessionId" = ? AND "wordId" = ? AND "phase" = ? AND "batteryNumber" = ?
        "#,
    )
    .bind(session_id)
    .bind(word_id)
    .bind(phase)
    .bind(battery_number)
    .fetch_one(&mut *conn)
    .await?;

    let attempt_number = count + 1;
    let now = now_iso();

    let inserted = sqlx::query(
        r#"
        INSERT INTO "word_attempts"
            ("id", "sessionId", "wordId", "phase", "batteryNumber", "attemptNumber",
             "isCorrect", "responseGiven", "displayedResponse", "autocorrectUsed", "createdAt")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT ("id") DO NOTHING
        "#,
    )
    .bind(attempt_id)
    .bind(session_id)
    .bind(word_id)
    .bind(phase)
    .bind(battery_number)
    .bind(attempt_number)
    .bind(eval.correct)
    .bind(&eval.response_given)
    .bind(&eval.displayed)
    .bind(eval.autocorrect_used)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() == 0 {
        let row = sqlx::query(r#"SELECT * FROM "word_attempts" WHERE "id" = ? LIMIT 1"#)
            .bind(attempt_id)
            .fetch_one(&mut *conn)
            .await?;
        return Ok(RecordOutcome::Duplicate(map_attempt_row(&row)));
    }

    // firstAttemptCorrect is only set by the INSERT arm; the conflict arm
    // deliberately leaves it alone.
    sqlx::query(
        r#"
        INSERT INTO "word_phase_status"
            ("learnerId", "wordId", "phase", "status", "firstAttemptCorrect",
             "totalAttempts", "lastAttemptAt", "createdAt", "updatedAt")
        VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
        ON CONFLICT ("learnerId", "wordId", "phase") DO UPDATE SET
            "status" = excluded."status",
            "totalAttempts" = "word_phase_status"."totalAttempts" + 1,
            "lastAttemptAt" = excluded."lastAttemptAt",
            "updatedAt" = excluded."updatedAt"
        "#,
    )
    .bind(learner_id)
    .bind(word_id)
    .bind(phase)
    .bind(WordStatus::from_correct(eval.correct).as_str())
    .bind(eval.correct)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        r#"
        SELECT * FROM "word_phase_status"
        WHERE "learnerId" = ? AND "wordId" = ? AND "phase" = ?
        LIMIT 1
        "#,
    )
    .bind(learner_id)
    .bind(word_id)
    .bind(phase)
    .fetch_one(&mut *conn)
    .await?;

    Ok(RecordOutcome::Recorded {
        attempt_number,
        status: map_status_row(&row)?,
    })
}

pub async fn statuses_for_words(
    pool: &SqlitePool,
    learner_id: &str,
    phase: i64,
    word_ids: &[String],
) -> Result<Vec<WordPhaseStatus>, EngineError> {
    if word_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
        r#"SELECT * FROM "word_phase_status" WHERE "learnerId" = "#,
    );
    qb.push_bind(learner_id);
    qb.push(r#" AND "phase" = "#);
    qb.push_bind(phase);
    qb.push(r#" AND "wordId" IN ("#);
    {
        let mut sep = qb.separated(", ");
        for id in word_ids {
            sep.push_bind(id);
        }
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(map_status_row).collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseBreakdown {
    pub phase: i64,
    pub correct: i64,
    pub needs_revision: i64,
    pub unseen: i64,
}

/// Status counts over the list's active words for one phase; words without
/// a status row count as unseen.
pub async fn phase_breakdown(
    pool: &SqlitePool,
    learner_id: &str,
    list_id: &str,
    phase: i64,
) -> Result<PhaseBreakdown, EngineError> {
    let rows = sqlx::query(
        r#"
        SELECT COALESCE(s."status", 'unseen') AS "status", COUNT(*) AS "count"
        FROM "words" w
        LEFT JOIN "word_phase_status" s
            ON s."wordId" = w."id" AND s."learnerId" = ? AND s."phase" = ?
        WHERE w."listId" = ? AND w."isActive" = 1
        GROUP BY COALESCE(s."status", 'unseen')
        "#,
    )
    .bind(learner_id)
    .bind(phase)
    .bind(list_id)
    .fetch_all(pool)
    .await?;

    let mut breakdown = PhaseBreakdown {
        phase,
        correct: 0,
        needs_revision: 0,
        unseen: 0,
    };
    for row in &rows {
        let status_raw: String = row.try_get("status").unwrap_or_default();
        let count: i64 = row.try_get("count").unwrap_or(0);
        match WordStatus::parse(&status_raw) {
            Some(WordStatus::Correct) => breakdown.correct = count,
            Some(WordStatus::NeedsRevision) => breakdown.needs_revision = count,
            Some(WordStatus::Unseen) | None => breakdown.unseen += count,
        }
    }
    Ok(breakdown)
}
