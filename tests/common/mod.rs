//! Shared utilities for the reliability scenario tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use inference_guard::client::{ChatMessage, ChatRequest, Transport, TransportError};

/// Transport that replays scripted failures in order, then keeps succeeding
/// (or keeps failing with `fallback`, when set).
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportError>>,
    fallback: Option<TransportError>,
    attempts: AtomicU32,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_then_ok(failures: Vec<TransportError>) -> Self {
        Self {
            script: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn always_failing(error: TransportError) -> Self {
        Self {
            fallback: Some(error),
            ..Self::default()
        }
    }

    /// Downstream invocations seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Response = u32;
    type Error = TransportError;

    async fn send(&self, _request: &ChatRequest) -> Result<u32, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = self.script.lock().unwrap().pop_front() {
            return Err(err);
        }
        match &self.fallback {
            Some(err) => Err(err.clone()),
            None => Ok(attempt),
        }
    }
}

#[allow(dead_code)]
pub fn server_error() -> TransportError {
    TransportError::Status {
        status: 503,
        message: "upstream overloaded".into(),
    }
}

#[allow(dead_code)]
pub fn auth_error() -> TransportError {
    TransportError::Status {
        status: 401,
        message: "Incorrect API key provided".into(),
    }
}

#[allow(dead_code)]
pub fn request() -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user("How do I reset my password?")])
}
