//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Identity headers missing or malformed.
    Unauthenticated(String),
    /// Request could not be parsed into a command.
    BadRequest { field: &'static str, message: String },
    Domain(DomainError),
    /// A read model could not be brought up to date.
    Projection(ProjectionError),
}

impl ApiError {
    pub fn bad_request(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            field,
            message: message.into(),
        }
    }

    /// The `kind` reported in the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::BadRequest { .. } => ErrorKind::Validation.as_str(),
            ApiError::Domain(err) => err.kind().as_str(),
            ApiError::Projection(_) => ErrorKind::Infrastructure.as_str(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => status_for(err.kind()),
            ApiError::Projection(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {msg}"),
            ApiError::BadRequest { field, message } => write!(f, "Invalid {field}: {message}"),
            ApiError::Domain(err) => err.fmt(f),
            ApiError::Projection(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Domain(err) => Some(err),
            ApiError::Projection(err) => Some(err),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "request failed on infrastructure");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

#[cfg(test)]
mod tests {
    use common::OfferId;
    use domain::{NeedError, WithdrawalError};

    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::Validation, 400),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::StateConflict, 409),
            (ErrorKind::InsufficientFunds, 402),
            (ErrorKind::Infrastructure, 503),
        ];
        for (kind, code) in cases {
            assert_eq!(status_for(kind).as_u16(), code, "{kind}");
        }
    }

    #[test]
    fn domain_errors_carry_their_kind() {
        let err = ApiError::from(DomainError::from(NeedError::OfferNotAvailable(OfferId::new())));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), "state_conflict");

        let err = ApiError::from(DomainError::from(WithdrawalError::MissingAccount));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_requests_name_the_field() {
        let err = ApiError::bad_request("price", "must be a number of cents");
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("price"));
    }
}
