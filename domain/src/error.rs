//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in the database client below it. The `source` field is used to hold the original
/// error that caused the domain error. `web` uses the `error_kind`s to pick HTTP
/// status codes and messages, and never looks at `redis` errors directly.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Other(String),
}

/// Enum representing the kinds of errors reported by the graph database.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The database could not be reached or the connection dropped.
    Network,
    /// The database rejected or failed to run a query. Carries its message.
    Query(String),
    /// The connected user lacks the ACL permission for a command.
    PermissionDenied(String),
    Other(String),
}

impl Error {
    pub fn query(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::Query(message.into())),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(message.into())),
        }
    }

    /// The message shown to API clients.
    pub fn message(&self) -> String {
        match &self.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Query(message))
            | DomainErrorKind::External(ExternalErrorKind::PermissionDenied(message))
            | DomainErrorKind::External(ExternalErrorKind::Other(message))
            | DomainErrorKind::Internal(InternalErrorKind::Other(message)) => message.clone(),
            DomainErrorKind::External(ExternalErrorKind::Network) => self
                .source
                .as_ref()
                .map(|source| source.to_string())
                .unwrap_or_else(|| "Database connection failed".to_string()),
            DomainErrorKind::Internal(InternalErrorKind::Config) => {
                "Invalid configuration".to_string()
            }
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self.error_kind,
            DomainErrorKind::External(ExternalErrorKind::PermissionDenied(_))
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the database client to the `domain` layer.
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let message = reply_text(&err);
        let error_kind = if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            DomainErrorKind::External(ExternalErrorKind::Network)
        } else if err.code() == Some("NOPERM") || message.starts_with("NOPERM") {
            DomainErrorKind::External(ExternalErrorKind::PermissionDenied(message))
        } else if message.is_empty() {
            DomainErrorKind::External(ExternalErrorKind::Other(err.to_string()))
        } else {
            DomainErrorKind::External(ExternalErrorKind::Query(message))
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

// redis splits an error reply at its first space into `code` and `detail`.
// FalkorDB replies carry no `ERR` prefix, so the code is the first word of the message.
fn reply_text(err: &redis::RedisError) -> String {
    let detail = err.detail().unwrap_or_default();
    match err.code() {
        None | Some("ERR") => detail.to_string(),
        Some(code) if detail.is_empty() => code.to_string(),
        Some(code) => format!("{code} {detail}"),
    }
}
