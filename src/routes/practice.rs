use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthLearner;
use crate::engine::attempts::{self, PhaseBreakdown};
use crate::engine::composer;
use crate::engine::content::{self, ActiveWord};
use crate::engine::evaluation::AnswerInput;
use crate::engine::progression::{self, ProgressionEvent, SubmitAttempt, SubmitOutcome};
use crate::engine::sessions;
use crate::engine::types::{
    Battery, EngineError, PracticeSession, RunState, WordPhaseStatus, FINAL_PHASE, FIRST_PHASE,
};
use crate::response::AppError;
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/sessions", post(get_or_create_session))
        .route("/sessions/:sessionId/battery", get(current_battery))
        .route("/sessions/:sessionId/attempts", post(submit_attempt))
        .route("/sessions/:sessionId/pause", post(pause_session))
        .route("/sessions/:sessionId/resume", post(resume_session))
        .route(
            "/sessions/:sessionId/acknowledge-completion",
            post(acknowledge_completion),
        )
        .route("/sessions/:sessionId/progress", get(session_progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    list_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    session: PracticeSession,
    created: bool,
}

async fn get_or_create_session(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let list_id = payload.list_id.trim().to_string();
    if list_id.is_empty() {
        return Err(AppError::validation("listId is required"));
    }

    let pool = state.db().pool();
    if !content::list_exists(pool, &list_id).await? {
        return Err(EngineError::ListNotFound.into());
    }

    let (session, created) = sessions::get_or_create(pool, &learner.id, &list_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(SuccessResponse {
            success: true,
            data: SessionEnvelope { session, created },
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatteryView {
    session: PracticeSession,
    battery: Battery,
    words: Vec<ActiveWord>,
    statuses: Vec<WordPhaseStatus>,
}

async fn current_battery(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.db().pool();
    let session = sessions::find_owned(pool, &session_id, &learner.id).await?;

    if session.run_state == RunState::Completed {
        return Err(EngineError::SessionNotActive("completed".to_string()).into());
    }

    // An existing battery is served regardless of run state; composing a
    // new one requires an active session.
    let battery = match composer::find_battery(
        pool,
        &session.id,
        session.battery_number,
        session.phase,
    )
    .await?
    {
        Some(battery) => battery,
        None => {
            if session.run_state != RunState::Active {
                return Err(EngineError::SessionNotActive(
                    session.run_state.as_str().to_string(),
                )
                .into());
            }
            composer::get_or_create_battery(pool, &session, state.config().composer_seed).await?
        }
    };

    let words = content::words_by_ids(pool, &battery.word_ids).await?;
    let statuses =
        attempts::statuses_for_words(pool, &learner.id, session.phase, &battery.word_ids).await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: BatteryView {
            session,
            battery,
            words,
            statuses,
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptRequest {
    word_id: String,
    phase: i64,
    battery_number: i64,
    selection: Option<String>,
    keystrokes: Option<String>,
    attempt_id: Option<String>,
}

async fn submit_attempt(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
    Json(payload): Json<AttemptRequest>,
) -> Result<Json<SuccessResponse<SubmitOutcome>>, AppError> {
    if payload.word_id.trim().is_empty() {
        return Err(AppError::validation("wordId is required"));
    }

    let answer = match (payload.selection, payload.keystrokes) {
        (Some(selection), None) => AnswerInput::Selection(selection),
        (None, Some(keystrokes)) => AnswerInput::Keystrokes(keystrokes),
        _ => {
            return Err(AppError::validation(
                "provide exactly one of selection or keystrokes",
            ))
        }
    };

    if let Some(attempt_id) = &payload.attempt_id {
        if attempt_id.trim().is_empty() {
            return Err(AppError::validation("attemptId must not be empty"));
        }
    }

    let outcome = progression::submit_attempt(
        state.db().pool(),
        state.config().advance_gate,
        &learner.id,
        &session_id,
        SubmitAttempt {
            word_id: payload.word_id,
            phase: payload.phase,
            battery_number: payload.battery_number,
            answer,
            attempt_id: payload.attempt_id,
        },
    )
    .await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: outcome,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session: PracticeSession,
}

async fn pause_session(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session =
        sessions::set_run_state(state.db().pool(), &session_id, &learner.id, RunState::Paused)
            .await?;
    Ok(Json(SuccessResponse {
        success: true,
        data: SessionView { session },
    }))
}

async fn resume_session(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session =
        sessions::set_run_state(state.db().pool(), &session_id, &learner.id, RunState::Active)
            .await?;
    Ok(Json(SuccessResponse {
        success: true,
        data: SessionView { session },
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeView {
    session: PracticeSession,
    progression: ProgressionEvent,
}

async fn acknowledge_completion(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (session, progression) = progression::acknowledge_completion(
        state.db().pool(),
        state.config().advance_gate,
        &learner.id,
        &session_id,
    )
    .await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: AcknowledgeView {
            session,
            progression,
        },
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressView {
    session: PracticeSession,
    phases: Vec<PhaseBreakdown>,
}

async fn session_progress(
    State(state): State<AppState>,
    Extension(learner): Extension<AuthLearner>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.db().pool();
    let session = sessions::find_owned(pool, &session_id, &learner.id).await?;

    let mut phases = Vec::with_capacity(FINAL_PHASE as usize);
    for phase in FIRST_PHASE..=FINAL_PHASE {
        phases.push(attempts::phase_breakdown(pool, &learner.id, &session.list_id, phase).await?);
    }

    Ok(Json(SuccessResponse {
        success: true,
        data: ProgressView { session, phases },
    }))
}
