use crate::routes::responses::ErrorResponse;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use error_stack::Report;
use tracing::{debug, error};

pub type StoreResult<T> = Result<T, Report<StoreError>>;

/// The message a client sees when it deletes a record that is still referenced.
pub const IN_USE_MESSAGE: &str = "In use";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown resource '{0}'")]
    UnknownResource(String),
    #[error("record not found")]
    NotFound,
    #[error("record is in use")]
    Protected,
    #[error("{0}")]
    Invalid(String),
    #[error("a resource form schema failed to build")]
    Schema,
    #[error("no ids left in the sequence")]
    IdsExhausted,
}

#[derive(Debug, thiserror::Error)]
#[error("the development server failed")]
pub struct ServerError;

/// Turns a store report into the `{ success: false, message }` body the dashboard expects.
#[derive(thiserror::Error)]
#[error("there was an error running the endpoint")]
pub struct ServiceError(Report<StoreError>);

impl std::fmt::Debug for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Report<StoreError>> for ServiceError {
    fn from(value: Report<StoreError>) -> Self {
        Self(value)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let response = match self.0.current_context() {
            StoreError::UnknownResource(path) => {
                ErrorResponse::new(StatusCode::NOT_FOUND, format!("unknown resource '{path}'"))
            }
            StoreError::NotFound => ErrorResponse::not_found(),
            StoreError::Protected => ErrorResponse::new(StatusCode::CONFLICT, IN_USE_MESSAGE),
            StoreError::Invalid(message) => ErrorResponse::unprocessable_entity(message.clone()),
            StoreError::Schema | StoreError::IdsExhausted => {
                ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        if response.status_code().is_server_error() {
            error!("request failed: {:?}", self.0);
        } else {
            debug!("request rejected: {:?}", self.0);
        }
        response.into_response()
    }
}
