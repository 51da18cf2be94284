use error_stack::Report;
use std::time::Duration;

pub type CacheResult<T> = Result<T, Report<CacheError>>;
pub type MutationResult<T> = Result<T, Report<MutationError>>;

/// The outcome of a single request against the REST boundary.
///
/// Cache entries keep a copy of the last one of these they saw, so it has to stay cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("server responded with status {status}")]
    Server {
        status: u16,
        message: Option<String>,
    },
    /// The server answered with a 2xx status but flagged `success: false` in the body.
    #[error("server rejected the request")]
    Rejected { message: Option<String> },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    Timeout,
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Unknown,
}

impl ErrorClass {
    pub fn fallback_message(self) -> &'static str {
        match self {
            ErrorClass::Network => "Unable to reach the server. Check your connection and try again.",
            ErrorClass::Timeout => "The server took too long to respond. Please try again.",
            ErrorClass::Unauthorized => "Your session has expired. Please sign in again.",
            ErrorClass::Forbidden => "You do not have permission to perform this action.",
            ErrorClass::NotFound => "The requested record could not be found.",
            ErrorClass::Validation => "The submitted data is invalid.",
            ErrorClass::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl RequestError {
    pub fn server(status: u16, message: Option<String>) -> Self {
        Self::Server { status, message }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RequestError::Network(_) => ErrorClass::Network,
            RequestError::Timeout(_) => ErrorClass::Timeout,
            RequestError::Server { status, .. } => match status {
                401 => ErrorClass::Unauthorized,
                403 => ErrorClass::Forbidden,
                404 => ErrorClass::NotFound,
                400 | 422 => ErrorClass::Validation,
                _ => ErrorClass::Unknown,
            },
            RequestError::Rejected { .. } | RequestError::Decode(_) => ErrorClass::Unknown,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.class() == ErrorClass::Unauthorized
    }

    /// The message a user should see: the server's own message when it sent one,
    /// otherwise the fallback for the error's class.
    pub fn user_message(&self) -> String {
        match self {
            RequestError::Server {
                message: Some(message),
                ..
            }
            | RequestError::Rejected {
                message: Some(message),
            } if !message.trim().is_empty() => message.clone(),
            _ => self.class().fallback_message().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to fetch collection")]
    Fetch,
    #[error("failed to fetch entity")]
    FetchOne,
    #[error("cache entry has no data")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("failed to create entity")]
    Create,
    #[error("failed to update entity")]
    Update,
    #[error("failed to delete entity")]
    Delete,
}

#[derive(Debug, thiserror::Error)]
pub enum UiStateError {
    #[error("cannot submit while the modal is closed")]
    ModalClosed,
    #[error("the entity being edited has no id")]
    MissingId,
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid form state transition")]
    InvalidTransition,
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("invalid validation pattern")]
    InvalidPattern,
}

/// Pulls the user facing message out of a report, wherever the [`RequestError`] sits in it.
pub fn user_message<C>(report: &Report<C>) -> String {
    report
        .downcast_ref::<RequestError>()
        .map(RequestError::user_message)
        .unwrap_or_else(|| ErrorClass::Unknown.fallback_message().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::ResultExt;
    use rstest::rstest;

    #[rstest]
    #[case::unauthorized(401, ErrorClass::Unauthorized)]
    #[case::forbidden(403, ErrorClass::Forbidden)]
    #[case::not_found(404, ErrorClass::NotFound)]
    #[case::bad_request(400, ErrorClass::Validation)]
    #[case::unprocessable(422, ErrorClass::Validation)]
    #[case::server_error(500, ErrorClass::Unknown)]
    fn status_maps_to_class(#[case] status: u16, #[case] class: ErrorClass) {
        assert_eq!(class, RequestError::server(status, None).class());
    }

    #[test]
    fn server_message_is_surfaced_verbatim() {
        let err = RequestError::server(409, Some("In use".to_string()));
        assert_eq!("In use", err.user_message());
    }

    #[test]
    fn blank_server_message_falls_back_to_class_message() {
        let err = RequestError::server(404, Some("   ".to_string()));
        assert_eq!(ErrorClass::NotFound.fallback_message(), err.user_message());
    }

    #[test]
    fn user_message_is_found_below_changed_context() {
        let result: Result<(), RequestError> =
            Err(RequestError::server(409, Some("In use".to_string())));
        let report = result.change_context(MutationError::Delete).unwrap_err();

        assert_eq!("In use", user_message(&report));
    }
}
