//! Configuration management for DocuBrain.
//!
//! Configuration can be set via environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the completion service.
//! - `GEMINI_MODEL` - Optional. Generation model. Defaults to `gemini-2.5-flash`.
//! - `EMBEDDING_MODEL` - Optional. Embedding model. Defaults to `text-embedding-004`.
//! - `TOOL_SERVER_PATH` - Optional. Path to the tool server executable. Defaults to `/app/bin/math-server`.
//! - `QDRANT_URL` - Optional. Qdrant base URL. Defaults to `http://localhost:6333`.
//! - `QDRANT_COLLECTION` - Optional. Collection name. Defaults to `docubrain_collection`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Deadline for completion-service calls. Defaults to `120`.
//! - `TOOL_CALL_TIMEOUT_SECS` - Optional. Deadline for tool-server round trips. Defaults to `30`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Knowledge-service (vector search) configuration.
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    /// Qdrant base URL
    pub qdrant_url: String,

    /// Collection holding the document chunks
    pub collection: String,

    /// Embedding model used to vectorize queries
    pub embed_model: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "docubrain_collection".to_string(),
            embed_model: "text-embedding-004".to_string(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Completion-service API key
    pub api_key: String,

    /// Generation model identifier
    pub model: String,

    /// Fixed path to the tool server executable
    pub tool_server_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Deadline for completion-service calls (seconds)
    pub request_timeout_secs: u64,

    /// Deadline for a single tool-server round trip (seconds)
    pub tool_call_timeout_secs: u64,

    /// Knowledge-service configuration
    pub knowledge: KnowledgeConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model = std::env::var("GEMINI_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        let tool_server_path = std::env::var("TOOL_SERVER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/app/bin/math-server"));

        let host = std::env::var("HOST")
            .unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let tool_call_timeout_secs = std::env::var("TOOL_CALL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("TOOL_CALL_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let knowledge = KnowledgeConfig {
            qdrant_url: std::env::var("QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6333".to_string()),
            collection: std::env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "docubrain_collection".to_string()),
            embed_model: std::env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-004".to_string()),
        };

        Ok(Self {
            api_key,
            model,
            tool_server_path,
            host,
            port,
            request_timeout_secs,
            tool_call_timeout_secs,
            knowledge,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, model: String, tool_server_path: PathBuf) -> Self {
        Self {
            api_key,
            model,
            tool_server_path,
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 120,
            tool_call_timeout_secs: 30,
            knowledge: KnowledgeConfig::default(),
        }
    }
}
