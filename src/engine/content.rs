use std::collections::HashMap;

use serde::Serialize;
use sqlx::{QueryBuilder, Row, SqlitePool};

use crate::engine::types::EngineError;

/// A word as served by the content collaborator. The example sentence
/// carries the base form delimited by `*asterisks*`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWord {
    pub id: String,
    pub base_form: String,
    pub definition: String,
    pub example_sentence: String,
}

fn map_word(row: &sqlx::sqlite::SqliteRow) -> ActiveWord {
    ActiveWord {
        id: row.try_get("id").unwrap_or_default(),
        base_form: row.try_get("baseForm").unwrap_or_default(),
        definition: row.try_get("definition").unwrap_or_default(),
        example_sentence: row.try_get("exampleSentence").unwrap_or_default(),
    }
}

pub async fn list_exists(pool: &SqlitePool, list_id: &str) -> Result<bool, EngineError> {
    let found: Option<String> =
        sqlx::query_scalar(r#"SELECT "id" FROM "word_lists" WHERE "id" = ? LIMIT 1"#)
            .bind(list_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub async fn get_word(
    pool: &SqlitePool,
    word_id: &str,
) -> Result<Option<ActiveWord>, EngineError> {
    let row = sqlx::query(
        r#"
        SELECT "id", "baseForm", "definition", "exampleSentence"
        FROM "words"
        WHERE "id" = ?
        LIMIT 1
        "#,
    )
    .bind(word_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_word))
}

/// Fetches words by id, returned in the order of `word_ids`.
pub async fn words_by_ids(
    pool: &SqlitePool,
    word_ids: &[String],
) -> Result<Vec<ActiveWord>, EngineError> {
    if word_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
        r#"SELECT "id", "baseForm", "definition", "exampleSentence" FROM "words" WHERE "id" IN ("#,
    );
    {
        let mut sep = qb.separated(", ");
        for id in word_ids {
            sep.push_bind(id);
        }
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;
    let mut by_id: HashMap<String, ActiveWord> = rows
        .iter()
        .map(|row| {
            let word = map_word(row);
            (word.id.clone(), word)
        })
        .collect();

    Ok(word_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect())
}
