//! Normalized call results.
//!
//! Every failure leaves the layer as a fixed, user-safe message chosen by
//! its [`ErrorKind`]; raw error text stays in the logs. Only `error_kind`
//! is meant for programmatic branching.

use serde::Serialize;

use crate::resilience::{ErrorKind, Failure};

/// The message shown to end users for a failure of `kind`.
pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::RateLimited => "API rate limit exceeded. Please try again later.",
        ErrorKind::Timeout => "Request timed out. Please try again.",
        ErrorKind::ConnectionError => "Unable to connect to AI service. Please try again later.",
        ErrorKind::ServerError => "The AI service is experiencing problems. Please try again later.",
        ErrorKind::AuthError => "AI service authentication failed. Please contact support.",
        ErrorKind::BadRequest => "Invalid request to AI service. Please try rephrasing your message.",
        ErrorKind::CircuitOpen => "The AI service is temporarily unavailable. Please try again later.",
        ErrorKind::Unknown => "An unexpected error occurred. Please try again later.",
    }
}

/// Outcome of one guarded call, as handed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallResult<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl<T> CallResult<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            success: false,
            value: None,
            error_kind: Some(kind),
            error_message: Some(user_message(kind).to_string()),
        }
    }

    /// Normalize an executor outcome. The failure detail is dropped.
    pub fn from_outcome(outcome: Result<T, Failure>) -> Self {
        match outcome {
            Ok(value) => Self::ok(value),
            Err(failure) => Self::failed(failure.kind),
        }
    }

    /// Back to a `Result`, with the error kind as the error.
    pub fn into_result(self) -> Result<T, ErrorKind> {
        match self.value {
            Some(value) if self.success => Ok(value),
            _ => Err(self.error_kind.unwrap_or(ErrorKind::Unknown)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        CallResult {
            success: self.success,
            value: self.value.map(f),
            error_kind: self.error_kind,
            error_message: self.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_detail_never_surfaces() {
        let result: CallResult<()> = CallResult::from_outcome(Err(Failure::new(
            ErrorKind::AuthError,
            "invalid api key sk-live-123",
        )));
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::AuthError));
        assert_eq!(
            result.error_message.as_deref(),
            Some("AI service authentication failed. Please contact support.")
        );
        assert!(!serde_json::to_string(&result).unwrap().contains("sk-live"));
    }

    #[test]
    fn test_every_kind_has_a_distinct_message() {
        let mut messages: Vec<_> = ErrorKind::ALL.into_iter().map(user_message).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_serialized_shape() {
        let ok = serde_json::to_value(CallResult::ok("hello")).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["value"], "hello");
        assert!(ok["error_kind"].is_null());

        let failed = serde_json::to_value(CallResult::<String>::failed(ErrorKind::CircuitOpen)).unwrap();
        assert_eq!(failed["error_kind"], "circuit_open");
        assert!(failed["value"].is_null());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(CallResult::ok(3).into_result(), Ok(3));
        assert_eq!(
            CallResult::<u8>::failed(ErrorKind::Timeout).into_result(),
            Err(ErrorKind::Timeout)
        );
        assert_eq!(CallResult::ok(2).map(|v| v * 2).value, Some(4));
    }
}
