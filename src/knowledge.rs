//! Knowledge-service client: top-K similarity search over the indexed
//! document chunks.
//!
//! Thin I/O wrapper around Qdrant's REST query endpoint; queries are
//! vectorized through the completion service's embedding endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::KnowledgeConfig;
use crate::llm::Embedder;

/// A ranked text fragment returned by the search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub filename: String,
    pub score: f32,
}

/// Similarity search over the document index.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Qdrant-backed implementation.
pub struct QdrantKnowledge {
    base_url: String,
    collection: String,
    embedder: Arc<dyn Embedder>,
    http: reqwest::Client,
}

impl QdrantKnowledge {
    pub fn new(config: &KnowledgeConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            embedder,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl KnowledgeSearch for QdrantKnowledge {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;

        let url = format!(
            "{}/collections/{}/points/query",
            self.base_url, self.collection
        );
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Knowledge service request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Knowledge service returned HTTP {}: {}", status, body);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse knowledge response: {}", e))?;

        Ok(parse_points(&json))
    }
}

/// Extract ranked hits from a Qdrant query response.
fn parse_points(json: &Value) -> Vec<SearchHit> {
    json["result"]["points"]
        .as_array()
        .map(|points| {
            points
                .iter()
                .map(|hit| SearchHit {
                    text: hit["payload"]["text"].as_str().unwrap_or("").to_string(),
                    filename: hit["payload"]["filename"]
                        .as_str()
                        .unwrap_or("unknown")
                        .to_string(),
                    score: hit["score"].as_f64().unwrap_or(0.0) as f32,
                })
                .collect()
        })
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_points_extracts_payload() {
        let json = json!({
            "result": {
                "points": [
                    { "score": 0.91, "payload": { "text": "Rust since 2019.", "filename": "resume.pdf" } },
                    { "score": 0.80, "payload": { "text": "Led a team." } }
                ]
            }
        });
        let hits = parse_points(&json);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Rust since 2019.");
        assert_eq!(hits[0].filename, "resume.pdf");
        assert!((hits[0].score - 0.91).abs() < 1e-6);
        // Missing filename falls back rather than dropping the hit.
        assert_eq!(hits[1].filename, "unknown");
    }

    #[test]
    fn parse_points_handles_empty_and_malformed() {
        assert!(parse_points(&json!({ "result": { "points": [] } })).is_empty());
        assert!(parse_points(&json!({})).is_empty());
    }
}
