//! Core agent loop implementation.

use std::sync::Arc;

use serde_json::json;

use crate::llm::{CompletionClient, Content, ModelReply, Part};
use crate::tools::ToolRegistry;

/// Maximum conversation iterations per chat request. An adversarial or
/// buggy model could request function calls forever; this ceiling is
/// the sole backpressure mechanism.
pub const MAX_ITERATIONS: usize = 10;

const NO_RESPONSE: &str = "Sorry, no response could be generated.";
const EMPTY_RESPONSE: &str = "Sorry, an empty response was returned.";
const TOO_COMPLEX: &str = "The request was too complex to complete.";

/// The conversational agent.
pub struct Agent {
    llm: Arc<dyn CompletionClient>,
    tools: ToolRegistry,
}

impl Agent {
    /// Create a new agent over a completion client and a dispatch table.
    pub fn new(llm: Arc<dyn CompletionClient>, tools: ToolRegistry) -> Self {
        Self { llm, tools }
    }

    /// Answer a user message, invoking tools as the model requests them.
    ///
    /// Never fails: every failure mode is converted into a user-facing
    /// message. At most `MAX_ITERATIONS + 1` completion round trips are
    /// made per call.
    pub async fn run_chat(&self, user_message: &str) -> String {
        match self.run_chat_inner(user_message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Agent chat failed: {:#}", e);
                format!(
                    "Sorry, an error occurred while processing your request: {}",
                    e
                )
            }
        }
    }

    async fn run_chat_inner(&self, user_message: &str) -> anyhow::Result<String> {
        tracing::info!("Starting agent chat: {}", truncate(user_message, 100));

        let descriptors = self.tools.descriptors();
        tracing::debug!("Advertising {} tools to the model", descriptors.len());

        // The conversation is owned by this run and discarded with it.
        let mut history = vec![Content::user_text(user_message)];
        let mut reply = self.llm.generate(&history, &descriptors).await?;

        for iteration in 1..=MAX_ITERATIONS {
            tracing::debug!("Agent iteration {}/{}", iteration, MAX_ITERATIONS);

            let (name, args) = match reply {
                ModelReply::Empty => {
                    tracing::warn!("No usable content in model response");
                    return Ok(NO_RESPONSE.to_string());
                }
                ModelReply::Text(text) => {
                    if text.is_empty() {
                        tracing::warn!("Model returned an empty text response");
                        return Ok(EMPTY_RESPONSE.to_string());
                    }
                    tracing::info!("Final response: {}", truncate(&text, 100));
                    return Ok(text);
                }
                ModelReply::FunctionCall { name, args } => (name, args),
            };

            tracing::info!("Model requests tool: {} args={}", name, args);

            let tool = match self.tools.resolve(&name) {
                Some(tool) => tool,
                None => {
                    tracing::error!("Unknown tool requested: {}", name);
                    return Ok(format!("tool '{}' is not available.", name));
                }
            };

            // Record the model's own call before its result so the
            // service sees a consistent conversation.
            history.push(Content::model_parts(vec![Part::FunctionCall {
                name: name.clone(),
                args: args.clone(),
            }]));

            match tool.execute(args).await {
                Ok(result) => {
                    tracing::debug!(
                        "Tool '{}' result: {}",
                        name,
                        truncate(&result.to_string(), 200)
                    );
                    history.push(Content::function_result(&name, json!({ "result": result })));
                    reply = self.llm.generate(&history, &descriptors).await?;
                }
                Err(e) => {
                    tracing::error!("Tool '{}' execution failed: {:#}", name, e);
                    return Ok(format!(
                        "An error occurred while executing tool '{}': {}",
                        name, e
                    ));
                }
            }
        }

        // Budget exhausted: settle for the last response's text if it
        // carried one.
        tracing::warn!("Reached max iterations ({})", MAX_ITERATIONS);
        match reply {
            ModelReply::Text(text) if !text.is_empty() => Ok(text),
            _ => Ok(TOO_COMPLEX.to_string()),
        }
    }
}

/// Truncate a string for logging purposes.
fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::knowledge::{KnowledgeSearch, SearchHit};
    use crate::llm::CompletionError;
    use crate::session::{SessionError, ToolBackend};
    use crate::tools::{Tool, ToolDescriptor};

    /// Completion client that replays a fixed script of replies.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<ModelReply, CompletionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<ModelReply, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn generate(
            &self,
            _history: &[Content],
            _tools: &[ToolDescriptor],
        ) -> Result<ModelReply, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelReply::Empty))
        }
    }

    /// Tool backend answering every arithmetic call with a fixed text.
    struct EchoBackend {
        reply: String,
    }

    #[async_trait]
    impl ToolBackend for EchoBackend {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
            Ok(vec![])
        }

        async fn call_tool(&self, _name: &str, _args: Value) -> Result<String, SessionError> {
            Ok(self.reply.clone())
        }
    }

    struct EmptyKnowledge;

    #[async_trait]
    impl KnowledgeSearch for EmptyKnowledge {
        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<SearchHit>> {
            Ok(vec![])
        }
    }

    /// A tool that always succeeds with a fixed value.
    struct OkTool;

    #[async_trait]
    impl Tool for OkTool {
        fn name(&self) -> &str {
            "ok_tool"
        }
        fn description(&self) -> &str {
            "Always succeeds."
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            Ok(json!("ok"))
        }
    }

    /// A tool that always fails.
    struct BoomTool;

    #[async_trait]
    impl Tool for BoomTool {
        fn name(&self) -> &str {
            "boom"
        }
        fn description(&self) -> &str {
            "Always fails."
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            anyhow::bail!("backend exploded")
        }
    }

    fn default_registry() -> ToolRegistry {
        ToolRegistry::new(
            Arc::new(EchoBackend {
                reply: "5".to_string(),
            }),
            Arc::new(EmptyKnowledge),
        )
    }

    fn call(name: &str, args: Value) -> Result<ModelReply, CompletionError> {
        Ok(ModelReply::FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    fn text(s: &str) -> Result<ModelReply, CompletionError> {
        Ok(ModelReply::Text(s.to_string()))
    }

    #[tokio::test]
    async fn add_round_trip_returns_final_text() {
        // Model asks for add(2, 3); tool server answers 5; model then
        // produces the final text "5".
        let client = ScriptedClient::new(vec![
            call("add", json!({ "a": 2, "b": 3 })),
            text("5"),
        ]);
        let agent = Agent::new(client.clone(), default_registry());

        assert_eq!(agent.run_chat("what is 2 + 3?").await, "5");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_stops_the_loop() {
        let client = ScriptedClient::new(vec![call("unknown_tool", json!({}))]);
        let agent = Agent::new(client.clone(), default_registry());

        assert_eq!(
            agent.run_chat("do something").await,
            "tool 'unknown_tool' is not available."
        );
        // No further round trip after the unknown name.
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn failing_tool_on_third_iteration_stops_before_a_fourth() {
        let registry =
            ToolRegistry::from_tools(vec![Arc::new(OkTool), Arc::new(BoomTool)]);
        let client = ScriptedClient::new(vec![
            call("ok_tool", json!({})),
            call("ok_tool", json!({})),
            call("boom", json!({})),
            text("never reached"),
        ]);
        let agent = Agent::new(client.clone(), registry);

        let reply = agent.run_chat("go").await;
        assert!(reply.contains("boom"));
        assert!(reply.contains("backend exploded"));
        // Two successful tool rounds produced two extra completions;
        // the failure terminates without another.
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn iteration_budget_is_enforced() {
        let script: Vec<_> = (0..20).map(|_| call("ok_tool", json!({}))).collect();
        let client = ScriptedClient::new(script);
        let registry = ToolRegistry::from_tools(vec![Arc::new(OkTool)]);
        let agent = Agent::new(client.clone(), registry);

        assert_eq!(agent.run_chat("loop forever").await, TOO_COMPLEX);
        assert_eq!(client.calls(), MAX_ITERATIONS + 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_keeps_last_text() {
        let mut script: Vec<_> = (0..MAX_ITERATIONS)
            .map(|_| call("ok_tool", json!({})))
            .collect();
        script.push(text("partial answer"));
        let client = ScriptedClient::new(script);
        let registry = ToolRegistry::from_tools(vec![Arc::new(OkTool)]);
        let agent = Agent::new(client.clone(), registry);

        assert_eq!(agent.run_chat("deep question").await, "partial answer");
        assert_eq!(client.calls(), MAX_ITERATIONS + 1);
    }

    #[tokio::test]
    async fn empty_reply_yields_fallback() {
        let client = ScriptedClient::new(vec![Ok(ModelReply::Empty)]);
        let agent = Agent::new(client, default_registry());
        assert_eq!(agent.run_chat("hello").await, NO_RESPONSE);
    }

    #[tokio::test]
    async fn empty_text_yields_fixed_message_not_empty_string() {
        let client = ScriptedClient::new(vec![text("")]);
        let agent = Agent::new(client, default_registry());
        assert_eq!(agent.run_chat("hello").await, EMPTY_RESPONSE);
    }

    #[tokio::test]
    async fn completion_failure_becomes_user_facing_message() {
        let client = ScriptedClient::new(vec![Err(CompletionError::Network(
            "connection refused".to_string(),
        ))]);
        let agent = Agent::new(client, default_registry());

        let reply = agent.run_chat("hello").await;
        assert!(reply.starts_with("Sorry, an error occurred"));
        assert!(reply.contains("connection refused"));
    }
}
