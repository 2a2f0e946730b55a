//! Failure-injecting transport for drills and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::client::transport::{ChatRequest, Transport, TransportError};

/// How an injected failure looks to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Status(u16),
    Timeout,
    Connect,
}

impl InjectedFailure {
    fn into_error(self) -> TransportError {
        match self {
            Self::Status(status) => TransportError::Status {
                status,
                message: format!("simulated status {status}"),
            },
            Self::Timeout => TransportError::Timeout(Duration::from_secs(30)),
            Self::Connect => TransportError::Connect("simulated connection reset".into()),
        }
    }
}

/// Reply produced by [`SimulatedTransport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedReply {
    pub id: u64,
    pub model: String,
    pub content: String,
}

/// A transport that fails a configurable share of requests.
#[derive(Debug)]
pub struct SimulatedTransport {
    failure_rate: f64,
    latency: Duration,
    failures: Vec<InjectedFailure>,
    sent: AtomicU64,
}

impl SimulatedTransport {
    /// `failure_rate` is clamped to `0.0..=1.0`.
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() { 0.0 } else { failure_rate.clamp(0.0, 1.0) };
        Self {
            failure_rate,
            latency: Duration::ZERO,
            failures: vec![
                InjectedFailure::Status(429),
                InjectedFailure::Status(500),
                InjectedFailure::Status(503),
                InjectedFailure::Timeout,
                InjectedFailure::Connect,
            ],
            sent: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Failure modes to draw from; an empty list keeps the defaults.
    pub fn with_failures(mut self, failures: Vec<InjectedFailure>) -> Self {
        if !failures.is_empty() {
            self.failures = failures;
        }
        self
    }

    /// Requests received so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn roll(&self) -> Option<InjectedFailure> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            self.failures.choose(&mut rng).copied()
        } else {
            None
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    type Response = SimulatedReply;
    type Error = TransportError;

    async fn send(&self, request: &ChatRequest) -> Result<SimulatedReply, TransportError> {
        let id = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(failure) = self.roll() {
            return Err(failure.into_error());
        }

        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(SimulatedReply {
            id,
            model: request.model.clone(),
            content: format!("echo: {prompt}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::ChatMessage;
    use crate::resilience::{Classify, ErrorKind};

    #[tokio::test]
    async fn test_never_fails_at_zero_rate() {
        let transport = SimulatedTransport::new(0.0);
        let request = ChatRequest::new(vec![ChatMessage::user("ping")]).with_model("m");
        for _ in 0..20 {
            let reply = transport.send(&request).await.unwrap();
            assert_eq!(reply.content, "echo: ping");
        }
        assert_eq!(transport.sent(), 20);
    }

    #[tokio::test]
    async fn test_always_fails_at_full_rate() {
        let transport = SimulatedTransport::new(3.0).with_failures(vec![InjectedFailure::Status(401)]);
        let err = transport.send(&ChatRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthError);
    }

    #[test]
    fn test_injected_failures_classify() {
        assert_eq!(InjectedFailure::Timeout.into_error().kind(), ErrorKind::Timeout);
        assert_eq!(InjectedFailure::Connect.into_error().kind(), ErrorKind::ConnectionError);
        assert_eq!(InjectedFailure::Status(503).into_error().kind(), ErrorKind::ServerError);
    }
}
