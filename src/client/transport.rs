//! Downstream transport contract and chat request types.
//!
//! The guard never talks to the network itself. A [`Transport`] performs the
//! actual request and reports failures through an error type that
//! implements [`Classify`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::{classify_status, Classify, ErrorKind};

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A chat completion request as sent downstream.
///
/// `model` and `temperature` left unset are filled from the client
/// defaults. `tool_choice` is only sent together with `tools`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Additional provider parameters, sent as top-level fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Attach tool definitions; `tool_choice` defaults to `auto`.
    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        if !tools.is_empty() {
            self.tools = Some(tools);
            self.tool_choice.get_or_insert_with(|| "auto".to_string());
        }
        self
    }

    pub fn with_tool_choice(mut self, choice: impl Into<String>) -> Self {
        self.tool_choice = Some(choice.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Fill defaults and drop fields the provider must not receive.
    pub fn prepared(mut self, default_model: &str, default_temperature: f32) -> Self {
        if self.model.is_empty() {
            self.model = default_model.to_string();
        }
        self.temperature.get_or_insert(default_temperature);
        if self.tools.as_ref().map_or(true, Vec::is_empty) {
            self.tools = None;
            self.tool_choice = None;
        }
        self
    }
}

/// Failures a transport reports back to the guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider answered with a non-success HTTP status.
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// No answer within the per-attempt deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or broke.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl Classify for TransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { status, .. } => classify_status(*status),
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Connect(_) => ErrorKind::ConnectionError,
            Self::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// The collaborator that performs one downstream request.
#[async_trait]
pub trait Transport: Send + Sync {
    type Response: Send;
    type Error: Classify + std::fmt::Display + Send;

    async fn send(&self, request: &ChatRequest) -> Result<Self::Response, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepared_fills_defaults() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).prepared("gpt-4o-mini", 0.7);
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, Some(0.7));

        let request = ChatRequest::new(vec![])
            .with_model("custom")
            .with_temperature(0.1)
            .prepared("gpt-4o-mini", 0.7);
        assert_eq!(request.model, "custom");
        assert_eq!(request.temperature, Some(0.1));
    }

    #[test]
    fn test_tool_choice_only_with_tools() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_tool_choice("required")
            .prepared("m", 0.5);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());

        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_tools(vec![json!({"type": "function", "function": {"name": "lookup"}})])
            .prepared("m", 0.5);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_serialized_body_shape() {
        let request = ChatRequest::new(vec![ChatMessage::system("be brief"), ChatMessage::user("hi")])
            .with_max_tokens(64)
            .with_param("top_p", json!(0.9))
            .prepared("gpt-3.5-turbo", 0.7);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("extra").is_none());
    }

    #[test]
    fn test_transport_error_kinds() {
        let status = |status| TransportError::Status {
            status,
            message: "x".into(),
        };
        assert_eq!(status(429).kind(), ErrorKind::RateLimited);
        assert_eq!(status(401).kind(), ErrorKind::AuthError);
        assert_eq!(status(400).kind(), ErrorKind::BadRequest);
        assert_eq!(status(502).kind(), ErrorKind::ServerError);
        assert_eq!(TransportError::Timeout(Duration::from_secs(30)).kind(), ErrorKind::Timeout);
        assert_eq!(TransportError::Connect("refused".into()).kind(), ErrorKind::ConnectionError);
        assert_eq!(TransportError::Other("?".into()).kind(), ErrorKind::Unknown);
    }
}
