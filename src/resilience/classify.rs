//! Failure classification.
//!
//! Every error a downstream call reports is mapped to one [`ErrorKind`] here
//! and nowhere else. Retry decisions read the static [`RETRYABLE`] table
//! instead of branching on concrete error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Timeout,
    ConnectionError,
    ServerError,
    AuthError,
    BadRequest,
    /// Synthesized locally when the breaker rejects a call.
    CircuitOpen,
    Unknown,
}

/// Retry policy as data: which kinds are worth another attempt.
pub const RETRYABLE: [(ErrorKind, bool); 8] = [
    (ErrorKind::RateLimited, true),
    (ErrorKind::Timeout, true),
    (ErrorKind::ConnectionError, true),
    (ErrorKind::ServerError, true),
    (ErrorKind::AuthError, false),
    (ErrorKind::BadRequest, false),
    (ErrorKind::CircuitOpen, false),
    (ErrorKind::Unknown, false),
];

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::RateLimited,
        ErrorKind::Timeout,
        ErrorKind::ConnectionError,
        ErrorKind::ServerError,
        ErrorKind::AuthError,
        ErrorKind::BadRequest,
        ErrorKind::CircuitOpen,
        ErrorKind::Unknown,
    ];

    /// Look up the kind in [`RETRYABLE`].
    pub fn is_retryable(self) -> bool {
        RETRYABLE
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, retryable)| *retryable)
            .unwrap_or(false)
    }

    /// Stable identifier, identical to the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection_error",
            Self::ServerError => "server_error",
            Self::AuthError => "auth_error",
            Self::BadRequest => "bad_request",
            Self::CircuitOpen => "circuit_open",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error a wrapped call may surface.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// The classification boundary used by the retry executor.
pub fn classify<E: Classify + ?Sized>(err: &E) -> ErrorKind {
    err.kind()
}

/// Map an HTTP status reported by a transport.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited,
        401 | 403 => ErrorKind::AuthError,
        408 => ErrorKind::Timeout,
        400 | 413 | 422 => ErrorKind::BadRequest,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Unknown,
    }
}

impl Classify for reqwest::Error {
    fn kind(&self) -> ErrorKind {
        if self.is_timeout() {
            ErrorKind::Timeout
        } else if self.is_connect() {
            ErrorKind::ConnectionError
        } else if let Some(status) = self.status() {
            classify_status(status.as_u16())
        } else if self.is_builder() {
            ErrorKind::BadRequest
        } else {
            ErrorKind::Unknown
        }
    }
}

impl Classify for std::io::Error {
    fn kind(&self) -> ErrorKind {
        use std::io::ErrorKind as Io;
        match std::io::Error::kind(self) {
            Io::TimedOut => ErrorKind::Timeout,
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::BrokenPipe => ErrorKind::ConnectionError,
            _ => ErrorKind::Unknown,
        }
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Timeout
    }
}

/// A classified failure of one guarded call.
///
/// `detail` is the raw error text, kept for logs. Callers outside the
/// layer only ever see the normalized message for `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn circuit_open() -> Self {
        Self::new(ErrorKind::CircuitOpen, "circuit breaker is open")
    }

    /// Classify a raw error from a wrapped call.
    pub fn from_error<E: Classify + fmt::Display + ?Sized>(err: &E) -> Self {
        Self::new(classify(err), err.to_string())
    }
}
