//! API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolDescriptor;

/// Request to chat with the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentChatRequest {
    /// The user's message
    pub message: String,
}

/// The agent's final answer.
#[derive(Debug, Clone, Serialize)]
pub struct AgentChatResponse {
    /// Final answer text
    pub reply: String,
}

/// Request to invoke a tool directly on the tool server.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name
    pub name: String,

    /// Tool arguments as a JSON object
    #[serde(default)]
    pub arguments: Value,
}

/// Result of a direct tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResponse {
    /// The tool's text output
    pub result: String,
}

/// The tool set exposed by the tool server.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

/// Error payload for failed requests.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error detail
    pub detail: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
