use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use domain::error::{DomainErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind};

extern crate log;

pub type Result<T> = core::result::Result<T, Error>;

pub(crate) const NOT_AUTHENTICATED: &str = "Not authenticated";

#[derive(Debug)]
pub enum Error {
    /// Failure reported by the graph database or the domain layer.
    Domain(DomainError),
    /// A request parameter is missing or malformed.
    BadRequest(String),
    /// No logged-in session, or the login itself was refused.
    Unauthenticated(String),
    /// The session's role does not allow the operation.
    Forbidden(String),
    /// The session store failed.
    Session(String),
}

impl Error {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(message.into())
    }

    pub fn unauthenticated() -> Self {
        Error::Unauthenticated(NOT_AUTHENTICATED.to_string())
    }

    pub fn session(err: impl std::fmt::Display) -> Self {
        Error::Session(err.to_string())
    }

    // List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Domain(err) => match &err.error_kind {
                DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                    InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                },
                DomainErrorKind::External(external_error_kind) => match external_error_kind {
                    ExternalErrorKind::Network => StatusCode::BAD_GATEWAY,
                    ExternalErrorKind::Query(_)
                    | ExternalErrorKind::PermissionDenied(_)
                    | ExternalErrorKind::Other(_) => StatusCode::BAD_REQUEST,
                },
            },
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Error::Domain(err) => err.message(),
            Error::BadRequest(message)
            | Error::Unauthenticated(message)
            | Error::Forbidden(message)
            | Error::Session(message) => message.clone(),
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed with {status}: {self}");
        } else {
            log::debug!("Request rejected with {status}: {self}");
        }
        (status, Json(json!({ "message": self.message() }))).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self::Domain(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_are_bad_requests_with_the_database_message() {
        let err = Error::from(DomainError::query("Invalid input 'RETRN'"));

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid input 'RETRN'");
    }

    #[test]
    fn network_errors_are_bad_gateway() {
        let err = Error::from(DomainError {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
        });

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn unauthenticated_renders_a_json_message() {
        let response = Error::unauthenticated().into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({ "message": "Not authenticated" }));
    }
}
