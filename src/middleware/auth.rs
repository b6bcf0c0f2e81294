use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::response::json_error;
use crate::state::AppState;

/// Resolves the bearer token to a learner and stores it in request
/// extensions; everything behind this layer can assume a verified caller.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = crate::auth::extract_token(req.headers());
    let Some(token) = token else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing bearer token")
            .into_response();
    };

    match crate::auth::verify_token(&token, &state.config().jwt_secret) {
        Ok(learner) => {
            req.extensions_mut().insert(learner);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "token verification failed");
            json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "invalid or expired token")
                .into_response()
        }
    }
}
