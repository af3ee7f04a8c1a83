//! Tool protocol session.
//!
//! Owns the lifecycle of the out-of-process tool server: locate the
//! executable at its fixed path, spawn it, run the initialize handshake,
//! serve `tools/list` / `tools/call` round trips, and tear everything
//! down in reverse-acquisition order. One session instance is shared for
//! the lifetime of the service and injected where needed; there is no
//! ambient global.

mod transport;
pub mod types;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::tools::ToolDescriptor;

use transport::StdioTransport;
use types::{
    extract_text, ClientInfo, InitializeParams, InitializeResult, JsonRpcRequest, ToolCallParams,
    ToolCallResult, ToolsListResult, PROTOCOL_VERSION,
};

/// Timeout for the initialize handshake (seconds).
const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Errors from the tool protocol session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Tool server artifact not found at {}", .0.display())]
    ServerNotFound(PathBuf),

    #[error("Tool session is not connected")]
    NotConnected,

    #[error("Tool session is already connected")]
    AlreadyConnected,

    #[error("Failed to spawn tool server: {0}")]
    Spawn(String),

    #[error("Initialize handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Tool server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Tool call timed out after {0}s")]
    Timeout(u64),
}

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Ready,
    Closing,
    Closed,
}

struct Inner {
    state: SessionState,
    transport: Option<Arc<StdioTransport>>,
}

/// The process-wide tool session (a connection pool of size one).
pub struct ToolSession {
    server_path: PathBuf,
    call_timeout_secs: u64,
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl ToolSession {
    pub fn new(config: &Config) -> Self {
        Self {
            server_path: config.tool_server_path.clone(),
            call_timeout_secs: config.tool_call_timeout_secs,
            inner: Mutex::new(Inner {
                state: SessionState::Unconnected,
                transport: None,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().expect("session lock poisoned").state
    }

    /// Spawn the tool server and perform the initialize handshake.
    ///
    /// Fails fast if the executable is missing from its fixed path. On
    /// handshake failure the spawned process and stream handles are
    /// released before the error is returned, and the session drops back
    /// to `Unconnected`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            match inner.state {
                SessionState::Unconnected | SessionState::Closed => {
                    inner.state = SessionState::Connecting;
                }
                _ => return Err(SessionError::AlreadyConnected),
            }
        }

        match self.connect_inner().await {
            Ok(transport) => {
                let mut inner = self.inner.lock().expect("session lock poisoned");
                inner.transport = Some(transport);
                inner.state = SessionState::Ready;
                info!("Tool session ready");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.lock().expect("session lock poisoned");
                inner.transport = None;
                inner.state = SessionState::Unconnected;
                Err(e)
            }
        }
    }

    async fn connect_inner(&self) -> Result<Arc<StdioTransport>, SessionError> {
        // No fallback path resolution: the artifact lives at one fixed,
        // configured location or the connect fails.
        if !self.server_path.exists() {
            return Err(SessionError::ServerNotFound(self.server_path.clone()));
        }

        let transport = Arc::new(StdioTransport::spawn(&self.server_path).await?);

        if let Err(e) = self.handshake(&transport).await {
            transport.shutdown().await;
            return Err(e);
        }

        Ok(transport)
    }

    async fn handshake(&self, transport: &StdioTransport) -> Result<(), SessionError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "docubrain".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let req = JsonRpcRequest::new(
            self.next_id(),
            "initialize",
            Some(
                serde_json::to_value(&params)
                    .map_err(|e| SessionError::Handshake(e.to_string()))?,
            ),
        );

        let resp = transport.send_request(req, HANDSHAKE_TIMEOUT_SECS).await?;

        if let Some(err) = resp.error {
            return Err(SessionError::Handshake(format!(
                "{} (code={})",
                err.message, err.code
            )));
        }

        let result = resp
            .result
            .ok_or_else(|| SessionError::Handshake("empty initialize result".to_string()))?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| SessionError::Handshake(format!("parse initialize result: {}", e)))?;

        info!(
            "Tool server initialized (protocol={}, server={})",
            init.protocol_version,
            init.server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unknown")
        );

        transport
            .send_notification("notifications/initialized", None)
            .await?;

        Ok(())
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let result = self.request("tools/list", None).await?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| SessionError::Transport(format!("parse tools/list result: {}", e)))?;
        Ok(list.tools)
    }

    /// Call a tool and return its text content.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, SessionError> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(&params)
            .map_err(|e| SessionError::Transport(format!("serialize tools/call params: {}", e)))?;

        let result = self.request("tools/call", Some(params)).await?;
        let call: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| SessionError::Transport(format!("parse tools/call result: {}", e)))?;

        let text = extract_text(&call.content);
        if call.is_error {
            return Err(SessionError::Rpc {
                code: 0,
                message: text,
            });
        }
        Ok(text)
    }

    /// Release the handshake session, the stream handles, and the child
    /// process, in reverse-acquisition order. Idempotent; safe to call
    /// after a failed `connect`.
    pub async fn close(&self) {
        let transport = {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            if inner.transport.is_some() {
                inner.state = SessionState::Closing;
            }
            inner.transport.take()
        };

        if let Some(transport) = transport {
            transport.shutdown().await;
            info!("Tool session closed");
        }

        let mut inner = self.inner.lock().expect("session lock poisoned");
        inner.state = SessionState::Closed;
    }

    /// One full round trip. Fails immediately (never blocks) unless the
    /// session is `Ready`.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, SessionError> {
        let transport = {
            let inner = self.inner.lock().expect("session lock poisoned");
            match (inner.state, &inner.transport) {
                (SessionState::Ready, Some(t)) => Arc::clone(t),
                _ => return Err(SessionError::NotConnected),
            }
        };

        let req = JsonRpcRequest::new(self.next_id(), method, params);
        let resp = transport.send_request(req, self.call_timeout_secs).await?;

        if let Some(err) = resp.error {
            return Err(SessionError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        resp.result
            .ok_or_else(|| SessionError::Transport(format!("{}: empty result", method)))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Seam between the dispatch table and the tool server, so handlers can
/// be exercised without a live child process.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, SessionError>;
}

#[async_trait]
impl ToolBackend for ToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        ToolSession::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, SessionError> {
        ToolSession::call_tool(self, name, arguments).await
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        let transport = self
            .inner
            .lock()
            .map(|mut inner| inner.transport.take())
            .unwrap_or(None);
        if let Some(transport) = transport {
            warn!("Tool session dropped without close(); terminating child");
            drop(transport); // StdioTransport::drop kills the child
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_path(path: PathBuf) -> ToolSession {
        let config = Config::new("key".to_string(), "model".to_string(), path);
        ToolSession::new(&config)
    }

    #[tokio::test]
    async fn calls_before_connect_fail_fast() {
        let session = session_with_path(PathBuf::from("/nonexistent/tool-server"));

        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));

        let err = session
            .call_tool("add", serde_json::json!({"a": 1, "b": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn connect_fails_fast_when_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-server");
        let session = session_with_path(missing.clone());

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::ServerNotFound(p) if p == missing));
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[tokio::test]
    async fn close_is_idempotent_without_connect() {
        let session = session_with_path(PathBuf::from("/nonexistent/tool-server"));
        session.close().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        // Calls after close still fail with NotConnected.
        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn close_after_failed_connect_is_safe() {
        let session = session_with_path(PathBuf::from("/nonexistent/tool-server"));
        let _ = session.connect().await;
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
    }
}
