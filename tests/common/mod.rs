#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use octovox_backend_rust::config::{AdvanceGate, Config};
use octovox_backend_rust::db::Database;
use octovox_backend_rust::state::AppState;

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub app: axum::Router,
    pub db: Database,
    _temp: TempDir,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_gate(AdvanceGate::EntireList).await
}

pub async fn create_test_app_with_gate(gate: AdvanceGate) -> TestApp {
    let temp = TempDir::new().expect("failed to create temp dir");
    let db_path = temp.path().join("test.db");
    let db = Database::connect_at(&db_path)
        .await
        .expect("failed to initialize test database");

    let config = Config {
        host: "127.0.0.1".parse().expect("valid host"),
        port: 0,
        log_level: "warn".to_string(),
        database_path: Some(db_path),
        jwt_secret: TEST_SECRET.to_string(),
        advance_gate: gate,
        composer_seed: Some(42),
    };

    let state = AppState::new(config, db.clone());
    TestApp {
        app: octovox_backend_rust::app(state),
        db,
        _temp: temp,
    }
}

pub fn token_for(learner_id: &str) -> String {
    octovox_backend_rust::auth::issue_token(TEST_SECRET, learner_id, 3600)
}

/// Seeds a word list with (id, baseForm, definition) triples; the example
/// sentence marks the base form with asterisks the way the content importer
/// does.
pub async fn seed_list(db: &Database, list_id: &str, words: &[(&str, &str, &str)]) {
    sqlx::query(r#"INSERT INTO "word_lists" ("id", "title") VALUES (?, ?)"#)
        .bind(list_id)
        .bind(format!("List {list_id}"))
        .execute(db.pool())
        .await
        .expect("failed to seed word list");

    for (word_id, base_form, definition) in words {
        sqlx::query(
            r#"
            INSERT INTO "words" ("id", "listId", "baseForm", "definition", "exampleSentence")
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(word_id)
        .bind(list_id)
        .bind(base_form)
        .bind(definition)
        .bind(format!("The word *{base_form}* appears in this sentence."))
        .execute(db.pool())
        .await
        .expect("failed to seed word");
    }
}

pub async fn deactivate_word(db: &Database, word_id: &str) {
    sqlx::query(r#"UPDATE "words" SET "isActive" = 0 WHERE "id" = ?"#)
        .bind(word_id)
        .execute(db.pool())
        .await
        .expect("failed to deactivate word");
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("failed to build request"),
        None => builder.body(Body::empty()).expect("failed to build request"),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should not error");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

pub async fn get(app: &axum::Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, Some(token), None).await
}

pub async fn get_anonymous(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None, None).await
}

pub async fn post(
    app: &axum::Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(token), Some(body)).await
}

pub async fn post_empty(
    app: &axum::Router,
    uri: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(token), None).await
}
