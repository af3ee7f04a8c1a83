//! Completion-service client abstraction.
//!
//! The agent talks to a function-calling-capable model through the
//! [`CompletionClient`] trait. The conversation is re-sent on every call
//! (the generation API is stateless); the orchestrator owns the history.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolDescriptor;

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// Conversation roles understood by the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One unit inside a conversation entry.
///
/// There is exactly one internal payload type and one serializer to the
/// wire shape (`gemini::part_to_wire`); no alternate construction paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Plain text.
    Text(String),
    /// A function call emitted by the model.
    FunctionCall { name: String, args: Value },
    /// The result of a function call, fed back to the model.
    FunctionResponse { name: String, response: Value },
}

/// One entry in the conversation history.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn containing a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A user turn carrying a function result back to the model.
    pub fn function_result(name: impl Into<String>, response: Value) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::FunctionResponse {
                name: name.into(),
                response,
            }],
        }
    }

    /// A model turn echoing the parts the service returned.
    pub fn model_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// What the model said, resolved once per turn.
///
/// Only the first candidate's first part is considered; additional
/// candidates or parts are ignored. That policy lives in one place
/// (`gemini::parse_reply`) so callers branch on this enum instead of
/// indexing into the raw response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// A plain text answer (possibly empty).
    Text(String),
    /// The model requests a tool invocation.
    FunctionCall { name: String, args: Value },
    /// No candidate, no content, or an unrecognized part shape.
    Empty,
}

/// A function-calling-capable completion client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the full conversation plus the advertised tool set, and
    /// resolve the response into a [`ModelReply`].
    async fn generate(
        &self,
        history: &[Content],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, CompletionError>;
}

/// Client for the embedding endpoint, used to vectorize search queries.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CompletionError>;
}
