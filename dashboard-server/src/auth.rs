use crate::routes::responses::ErrorResponse;
use crate::state::ServerState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{instrument, warn};

/// Rejects requests without the configured bearer token. Does nothing when no token is configured.
#[instrument(skip_all)]
pub async fn require_token(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => next.run(request).await,
        Some(_) => {
            warn!("bearer token rejected");
            ErrorResponse::unauthorized().into_response()
        }
        None => {
            warn!("request without bearer token");
            ErrorResponse::unauthorized().into_response()
        }
    }
}
