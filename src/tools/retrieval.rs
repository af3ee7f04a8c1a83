//! Document retrieval tool backed by the knowledge service.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::knowledge::KnowledgeSearch;

use super::Tool;

/// Number of hits fetched per query.
const TOP_K: usize = 5;

const NO_RESULTS: &str = "No relevant information found.";
const SEARCH_FAILED: &str = "An error occurred while searching.";

/// Search the indexed documents and return the best-matching fragments
/// as a single text block.
pub struct RetrieveKnowledgeTool {
    knowledge: Arc<dyn KnowledgeSearch>,
}

impl RetrieveKnowledgeTool {
    pub fn new(knowledge: Arc<dyn KnowledgeSearch>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Tool for RetrieveKnowledgeTool {
    fn name(&self) -> &str {
        "retrieve_knowledge"
    }

    fn description(&self) -> &str {
        "Search the indexed documents (resumes, work histories, internal files) and return relevant passages. Use this whenever the user asks about a candidate's skills, background, or experience."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or a question to search for"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = match args["query"].as_str() {
            Some(q) => q,
            None => {
                warn!("retrieve_knowledge called without a 'query' argument");
                return Ok(json!(SEARCH_FAILED));
            }
        };

        info!("Searching knowledge base: {}", query);

        match self.knowledge.search(query, TOP_K).await {
            Ok(hits) if hits.is_empty() => Ok(json!(NO_RESULTS)),
            Ok(hits) => {
                let context = hits
                    .iter()
                    .map(|hit| format!("[Source: {}]\n{}", hit.filename, hit.text))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(json!(context))
            }
            Err(e) => {
                warn!("Knowledge search failed: {}", e);
                Ok(json!(SEARCH_FAILED))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────
