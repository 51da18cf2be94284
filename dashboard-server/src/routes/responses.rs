use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::borrow::Cow;
use sync_engine::entity::Entity;
use sync_engine::projection::Projection;

/// `{ success: true, data, message?, total? }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(skip)]
    status_code: StatusCode,
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
}

impl Envelope<Entity> {
    pub fn ok(entity: Entity) -> Self {
        Self::new(StatusCode::OK, entity)
    }

    pub fn created(entity: Entity, label: &str) -> Self {
        Self::new(StatusCode::CREATED, entity).with_message(format!("{label} created"))
    }

    pub fn updated(entity: Entity, label: &str) -> Self {
        Self::new(StatusCode::OK, entity).with_message(format!("{label} updated"))
    }

    pub fn deleted(entity: Entity, label: &str) -> Self {
        Self::new(StatusCode::OK, entity).with_message(format!("{label} deleted"))
    }
}

impl Envelope<Vec<Entity>> {
    pub fn page(projection: Projection) -> Self {
        let mut envelope = Self::new(StatusCode::OK, projection.rows);
        envelope.total = Some(projection.total_count);
        envelope
    }
}

impl<T> Envelope<T> {
    fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code,
            success: true,
            data,
            message: None,
            total: None,
        }
    }

    fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

/// `{ success: false, message }`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    status_code: StatusCode,
    success: bool,
    message: Cow<'static, str>,
}

impl ErrorResponse {
    pub fn new(status_code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status_code,
            success: false,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "the requested record does not exist")
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")
    }

    pub fn unprocessable_entity(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
