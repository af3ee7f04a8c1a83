//! Tool dispatch table.
//!
//! A fixed registry, built once at startup, mapping tool names to
//! executable handlers. The arithmetic handlers forward to the tool
//! protocol session; the retrieval handler queries the knowledge
//! service. Handlers catch their own failures and return degraded
//! results, so the agent loop is driven by function-call structure
//! rather than handler-level errors.

mod math;
mod retrieval;

pub use math::{AddTool, MultiplyTool};
pub use retrieval::RetrieveKnowledgeTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::knowledge::KnowledgeSearch;
use crate::session::ToolBackend;

/// An advertised tool: what the completion service sees, and what the
/// tool server reports from `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema describing the tool's input.
    #[serde(default = "empty_object_schema", rename = "inputSchema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// An executable tool handler.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Execute with parsed arguments. Arguments are not validated
    /// against the schema before dispatch; a malformed set surfaces as
    /// whatever the handler makes of it.
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Registry of all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Build the fixed tool set: arithmetic tools forwarding to the
    /// tool server, plus document retrieval.
    pub fn new(backend: Arc<dyn ToolBackend>, knowledge: Arc<dyn KnowledgeSearch>) -> Self {
        Self::from_tools(vec![
            Arc::new(AddTool::new(Arc::clone(&backend))),
            Arc::new(MultiplyTool::new(backend)),
            Arc::new(RetrieveKnowledgeTool::new(knowledge)),
        ])
    }

    /// Build a registry from an explicit tool set.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for tool in tools {
            order.push(tool.name().to_string());
            map.insert(tool.name().to_string(), tool);
        }

        Self { tools: map, order }
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a tool by name.
    pub async fn invoke(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let tool = self
            .resolve(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args).await
    }

    /// The immutable descriptor set advertised to the completion service.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SearchHit;
    use crate::session::SessionError;

    struct NullBackend;

    #[async_trait]
    impl ToolBackend for NullBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
            Ok(vec![])
        }

        async fn call_tool(&self, _name: &str, _args: Value) -> Result<String, SessionError> {
            Err(SessionError::NotConnected)
        }
    }

    struct NullKnowledge;

    #[async_trait]
    impl KnowledgeSearch for NullKnowledge {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<SearchHit>> {
            Ok(vec![])
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(NullBackend), Arc::new(NullKnowledge))
    }

    #[test]
    fn resolve_known_and_unknown() {
        let registry = registry();
        assert!(registry.resolve("add").is_some());
        assert!(registry.resolve("multiply").is_some());
        assert!(registry.resolve("retrieve_knowledge").is_some());
        assert!(registry.resolve("unknown_tool").is_none());
    }

    #[test]
    fn descriptors_are_stable() {
        let registry = registry();
        let first = registry.descriptors();
        let second = registry.descriptors();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].name, "add");
        assert_eq!(first[1].name, "multiply");
        assert_eq!(first[2].name, "retrieve_knowledge");
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_an_error() {
        let registry = registry();
        let err = registry
            .invoke("unknown_tool", Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown_tool"));
    }

    #[test]
    fn descriptor_deserializes_tool_server_shape() {
        let json = r#"{"name":"add","description":"Add two numbers","inputSchema":{"type":"object","properties":{"a":{"type":"integer"}}}}"#;
        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.name, "add");
        assert!(descriptor.input_schema["properties"]["a"].is_object());
    }
}
