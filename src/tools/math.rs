//! Arithmetic tools forwarding to the tool protocol session.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::session::ToolBackend;

use super::Tool;

/// Add two integers via the tool server.
pub struct AddTool {
    backend: Arc<dyn ToolBackend>,
}

impl AddTool {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two integers and return the sum."
    }

    fn parameters_schema(&self) -> Value {
        integer_pair_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        Ok(json!(forward(&*self.backend, "add", args).await))
    }
}

/// Multiply two integers via the tool server.
pub struct MultiplyTool {
    backend: Arc<dyn ToolBackend>,
}

impl MultiplyTool {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two integers and return the product."
    }

    fn parameters_schema(&self) -> Value {
        integer_pair_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        Ok(json!(forward(&*self.backend, "multiply", args).await))
    }
}

fn integer_pair_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "integer", "description": "First operand" },
            "b": { "type": "integer", "description": "Second operand" }
        },
        "required": ["a", "b"]
    })
}

/// Round trip to the tool server, parsing the first text content as an
/// integer. Any failure degrades to 0 rather than erroring out of the
/// dispatch boundary.
async fn forward(backend: &dyn ToolBackend, name: &str, args: Value) -> i64 {
    match backend.call_tool(name, args).await {
        Ok(text) => match text.trim().parse::<i64>() {
            Ok(n) => n,
            Err(_) => {
                warn!("Tool '{}' returned non-numeric payload: {:?}", name, text);
                0
            }
        },
        Err(e) => {
            warn!("Tool '{}' call failed: {}", name, e);
            0
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use crate::tools::ToolDescriptor;

    struct FixedBackend {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl ToolBackend for FixedBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
            Ok(vec![])
        }

        async fn call_tool(&self, _name: &str, _args: Value) -> Result<String, SessionError> {
            self.reply
                .clone()
                .map_err(|_| SessionError::NotConnected)
        }
    }

    #[tokio::test]
    async fn add_parses_tool_server_text() {
        let backend = Arc::new(FixedBackend {
            reply: Ok("5".to_string()),
        });
        let tool = AddTool::new(backend);
        let result = tool.execute(json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn add_degrades_to_zero_on_session_error() {
        let backend = Arc::new(FixedBackend { reply: Err(()) });
        let tool = AddTool::new(backend);
        let result = tool.execute(json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(result, json!(0));
    }

    #[tokio::test]
    async fn multiply_degrades_to_zero_on_garbage_payload() {
        let backend = Arc::new(FixedBackend {
            reply: Ok("not a number".to_string()),
        });
        let tool = MultiplyTool::new(backend);
        let result = tool.execute(json!({"a": 6, "b": 7})).await.unwrap();
        assert_eq!(result, json!(0));
    }
}
