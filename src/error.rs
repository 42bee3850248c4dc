//! Error types
//!
//! A single error enum covers the whole client. Load-time variants
//! (`Configuration`, `ResourceTree`, `SchemaNotFound`, `InvalidSchema`) abort
//! client construction; caller-time variants carry the resource path and
//! operation so a failed call can be diagnosed without re-running it.

use crate::resource::Verb;
use std::fmt;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request (or one attempt of it) exceeded its timeout
    Timeout,
    /// The connection could not be established or was reset
    ConnectionFailed,
    /// The server answered with a 5xx status
    ServerError,
    /// The server answered with a 4xx status
    ClientError,
    /// The server answered 2xx but the body was not valid JSON
    InvalidBody,
}

impl TransportKind {
    /// Whether a failure of this kind is worth another attempt
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportKind::Timeout | TransportKind::ConnectionFailed | TransportKind::ServerError
        )
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Timeout => "timeout",
            TransportKind::ConnectionFailed => "connection failed",
            TransportKind::ServerError => "server error",
            TransportKind::ClientError => "client error",
            TransportKind::InvalidBody => "invalid response body",
        };
        f.write_str(s)
    }
}

/// A value that did not match its schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Schema the value was validated against
    pub schema: String,
    /// Dotted path to the offending field, `$` for the value itself
    pub field_path: String,
    pub reason: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at `{}`: {}", self.schema, self.field_path, self.reason)
    }
}

/// Errors produced by the Campus client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid client configuration: {0}")]
    Configuration(String),

    #[error("invalid resource tree at `{path}`: {reason}")]
    ResourceTree { path: String, reason: String },

    #[error("schema `{name}` not found (referenced by {referenced_by})")]
    SchemaNotFound { name: String, referenced_by: String },

    #[error("invalid schema `{schema}`: {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("unknown resource `{name}` under `{path}`")]
    UnknownResource { path: String, name: String },

    #[error("value `{value}` for `{path}` does not match pattern `{pattern}`")]
    InvalidParameter {
        path: String,
        value: String,
        pattern: String,
    },

    #[error("operation {verb} not allowed on `{path}` (allowed: {})", format_verbs(.allowed))]
    OperationNotAllowed {
        path: String,
        verb: Verb,
        allowed: Vec<Verb>,
    },

    #[error("invalid request body: {0}")]
    InvalidRequest(Mismatch),

    #[error("response does not match schema: {0}")]
    SchemaMismatch(Mismatch),

    #[error("{kind} for {url}{} after {attempts} attempt(s): {message}", format_status(.status))]
    Transport {
        kind: TransportKind,
        url: String,
        status: Option<u16>,
        message: String,
        attempts: u32,
    },

    #[error("failed to obtain credentials: {0}")]
    Credentials(String),
}

impl Error {
    /// Whether the transport layer should retry after this error
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// Transport failure kind, if this is a transport error
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The offending field path for schema errors
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Error::SchemaMismatch(m) | Error::InvalidRequest(m) => Some(&m.field_path),
            _ => None,
        }
    }

    pub(crate) fn tree(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ResourceTree {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn schema(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidSchema {
            schema: schema.into(),
            reason: reason.into(),
        }
    }
}

fn format_verbs(verbs: &[Verb]) -> String {
    if verbs.is_empty() {
        return "none".to_string();
    }
    verbs
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(TransportKind::Timeout.is_transient());
        assert!(TransportKind::ConnectionFailed.is_transient());
        assert!(TransportKind::ServerError.is_transient());
        assert!(!TransportKind::ClientError.is_transient());
        assert!(!TransportKind::InvalidBody.is_transient());
    }

    #[test]
    fn test_operation_not_allowed_message_lists_verbs() {
        let err = Error::OperationNotAllowed {
            path: "/users/alice".to_string(),
            verb: Verb::Post,
            allowed: vec![Verb::Get, Verb::Delete],
        };
        assert_eq!(
            err.to_string(),
            "operation POST not allowed on `/users/alice` (allowed: GET, DELETE)"
        );
    }

    #[test]
    fn test_transport_message_includes_status() {
        let err = Error::Transport {
            kind: TransportKind::ServerError,
            url: "http://localhost/v1/users".to_string(),
            status: Some(503),
            message: "unavailable".to_string(),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 503"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_field_path_only_for_schema_errors() {
        let mismatch = Mismatch {
            schema: "User".to_string(),
            field_path: "name".to_string(),
            reason: "required field is missing".to_string(),
        };
        assert_eq!(Error::SchemaMismatch(mismatch).field_path(), Some("name"));
        assert_eq!(Error::Configuration("x".to_string()).field_path(), None);
    }
}
