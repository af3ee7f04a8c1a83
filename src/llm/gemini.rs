//! Gemini API client: request building, response parsing, embeddings.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Config;

use super::{CompletionClient, CompletionError, Content, Embedder, ModelReply, Part, Role};
use crate::tools::ToolDescriptor;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini completion-service client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    embed_model: String,
    timeout_secs: u64,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            embed_model: config.knowledge.embed_model.clone(),
            timeout_secs: config.request_timeout_secs,
            http: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }

    fn embed_url(&self) -> String {
        format!("{}/{}:embedContent", GEMINI_API_BASE, self.embed_model)
    }

    /// Build the JSON request body for `generateContent`.
    fn build_request_body(&self, history: &[Content], tools: &[ToolDescriptor]) -> Value {
        let contents: Vec<Value> = history.iter().map(content_to_wire).collect();

        let mut body = json!({ "contents": contents });

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        body
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, CompletionError> {
        let request = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send();

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            request,
        )
        .await
        .map_err(|_| CompletionError::Timeout(self.timeout_secs))?
        .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn generate(
        &self,
        history: &[Content],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, CompletionError> {
        let body = self.build_request_body(history, tools);

        tracing::debug!(model = %self.model, turns = history.len(), "Completion request");

        let json = self.post_json(&self.generate_url(), &body).await?;
        Ok(parse_reply(&json))
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CompletionError> {
        let body = json!({
            "model": format!("models/{}", self.embed_model),
            "content": { "parts": [{ "text": text }] }
        });

        let json = self.post_json(&self.embed_url(), &body).await?;

        let values = json["embedding"]["values"]
            .as_array()
            .ok_or_else(|| CompletionError::Parse("no embedding values in response".to_string()))?;

        Ok(values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect())
    }
}

// ── Wire serialization ────────────────────────────────────────────

/// Serialize a conversation entry to the Gemini `contents` element shape.
fn content_to_wire(content: &Content) -> Value {
    let role = match content.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = content.parts.iter().map(part_to_wire).collect();
    json!({ "role": role, "parts": parts })
}

/// The single serializer from [`Part`] to the wire shape.
fn part_to_wire(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::FunctionCall { name, args } => json!({
            "functionCall": { "name": name, "args": args }
        }),
        Part::FunctionResponse { name, response } => json!({
            "functionResponse": { "name": name, "response": response }
        }),
    }
}

// ── Response parsing ──────────────────────────────────────────────

/// Resolve a raw `generateContent` response into a [`ModelReply`].
///
/// Policy: only the first candidate's first content part is inspected.
/// A function call wins over text within that part; anything else is
/// `Empty`.
pub(crate) fn parse_reply(json: &Value) -> ModelReply {
    let first_part = json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .map(|candidate| &candidate["content"]["parts"])
        .and_then(|p| p.as_array())
        .and_then(|p| p.first());

    let part = match first_part {
        Some(p) => p,
        None => return ModelReply::Empty,
    };

    if let Some(fc) = part.get("functionCall") {
        let name = fc["name"].as_str().unwrap_or("").to_string();
        let args = fc.get("args").cloned().unwrap_or_else(|| json!({}));
        return ModelReply::FunctionCall { name, args };
    }

    if let Some(text) = part["text"].as_str() {
        return ModelReply::Text(text.to_string());
    }

    ModelReply::Empty
}

// ── Tests ─────────────────────────────────────────────────────────
