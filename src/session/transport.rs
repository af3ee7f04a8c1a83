//! Stdio transport for the tool protocol.
//!
//! Spawns the tool server as a child process and exchanges JSON-RPC
//! messages over its stdin/stdout using Content-Length framed messages.
//! A single writer task drains an mpsc queue to the child's stdin, so
//! outbound requests are serialized; a reader task matches responses to
//! pending requests by their correlation id.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use super::types::{JsonRpcRequest, JsonRpcResponse};
use super::SessionError;

/// A running stdio transport. Owns the child process and the stream
/// routing tasks.
pub struct StdioTransport {
    /// Sender feeding the writer task; `None` after shutdown.
    writer_tx: std::sync::Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    /// Requests awaiting responses, keyed by correlation id.
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
    /// Child process handle, taken on shutdown.
    child: Arc<Mutex<Option<Child>>>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn the tool server and wire up both stream halves.
    ///
    /// The child inherits this process's environment.
    pub async fn spawn(server_path: &Path) -> Result<Self, SessionError> {
        info!("Spawning tool server: {}", server_path.display());

        let mut child = Command::new(server_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SessionError::Spawn(format!("{}: {}", server_path.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to open child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to open child stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::Spawn("failed to open child stderr".to_string()))?;

        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        // Writer task: frames queued messages onto the child's stdin.
        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(64);
        let _writer_handle = {
            let mut stdin = stdin;
            tokio::spawn(async move {
                while let Some(msg) = writer_rx.recv().await {
                    let frame = format!("Content-Length: {}\r\n\r\n", msg.len());
                    if let Err(e) = stdin.write_all(frame.as_bytes()).await {
                        warn!("Tool server stdin write error: {}", e);
                        break;
                    }
                    if let Err(e) = stdin.write_all(&msg).await {
                        warn!("Tool server stdin write error: {}", e);
                        break;
                    }
                    if let Err(e) = stdin.flush().await {
                        warn!("Tool server stdin flush error: {}", e);
                        break;
                    }
                }
                debug!("Tool server writer task exiting");
            })
        };

        // Reader task: routes framed responses to their waiters.
        let _reader_handle = {
            let pending = Arc::clone(&pending);
            let mut reader = BufReader::new(stdout);
            tokio::spawn(async move {
                loop {
                    match read_message(&mut reader).await {
                        Ok(Some(data)) => {
                            match serde_json::from_slice::<JsonRpcResponse>(&data) {
                                Ok(resp) => {
                                    if let Some(id) = resp.id {
                                        let mut map = pending.lock().await;
                                        if let Some(tx) = map.remove(&id) {
                                            let _ = tx.send(resp);
                                        } else {
                                            debug!("Response for unknown id={}, ignoring", id);
                                        }
                                    } else {
                                        debug!("Notification from tool server, ignoring");
                                    }
                                }
                                Err(e) => warn!("Unparseable tool server message: {}", e),
                            }
                        }
                        Ok(None) => {
                            info!("Tool server stdout closed");
                            break;
                        }
                        Err(e) => {
                            warn!("Tool server read error: {}", e);
                            break;
                        }
                    }
                }
            })
        };

        // Drain stderr into the log.
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            debug!("tool-server stderr: {}", trimmed);
                        }
                    }
                }
            }
        });

        Ok(Self {
            writer_tx: std::sync::Mutex::new(Some(writer_tx)),
            pending,
            child: Arc::new(Mutex::new(Some(child))),
            _reader_handle,
            _writer_handle,
        })
    }

    /// Send a request and wait for its correlated response, bounded by
    /// `timeout_secs`.
    pub async fn send_request(
        &self,
        request: JsonRpcRequest,
        timeout_secs: u64,
    ) -> Result<JsonRpcResponse, SessionError> {
        let id = request.id;
        let (tx, rx) = oneshot::channel();

        {
            let mut map = self.pending.lock().await;
            map.insert(id, tx);
        }

        let body = serde_json::to_vec(&request)
            .map_err(|e| SessionError::Transport(format!("serialize request: {}", e)))?;
        self.send_bytes(body).await?;

        match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(SessionError::Transport(
                "response channel dropped".to_string(),
            )),
            Err(_) => {
                // Expired: the waiter must not leak.
                self.pending.lock().await.remove(&id);
                Err(SessionError::Timeout(timeout_secs))
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), SessionError> {
        let notif = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or_else(|| serde_json::json!({})),
        });
        let body = serde_json::to_vec(&notif)
            .map_err(|e| SessionError::Transport(format!("serialize notification: {}", e)))?;
        self.send_bytes(body).await
    }

    async fn send_bytes(&self, body: Vec<u8>) -> Result<(), SessionError> {
        let tx = self
            .writer_tx
            .lock()
            .expect("writer lock poisoned")
            .clone()
            .ok_or_else(|| SessionError::Transport("transport closed".to_string()))?;
        tx.send(body)
            .await
            .map_err(|_| SessionError::Transport("transport writer closed".to_string()))
    }

    /// Tear down in reverse-acquisition order: drop pending waiters,
    /// close the outbound stream, then terminate the child process.
    pub async fn shutdown(&self) {
        self.pending.lock().await.clear();

        // Dropping the sender ends the writer task and closes stdin.
        self.writer_tx.lock().expect("writer lock poisoned").take();

        let mut guard = self.child.lock().await;
        if let Some(ref mut child) = *guard {
            info!("Terminating tool server process");
            let _ = child.kill().await;
        }
        *guard = None;
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // Best-effort kill if shutdown() was never called.
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
            *guard = None;
        }
    }
}

// ── Content-Length framed message reader ──────────────────────────

/// Read one framed message. Returns `Ok(None)` on clean EOF.
async fn read_message<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Option<Vec<u8>>, SessionError> {
    let mut content_length: Option<usize> = None;
    let mut header_line = String::new();

    loop {
        header_line.clear();
        let n = reader
            .read_line(&mut header_line)
            .await
            .map_err(|e| SessionError::Transport(format!("header read: {}", e)))?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = header_line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(val) = trimmed.strip_prefix("Content-Length:") {
            content_length = val.trim().parse::<usize>().ok();
        }
        // Other headers are ignored.
    }

    let len = content_length
        .ok_or_else(|| SessionError::Transport("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| SessionError::Transport(format!("body read: {}", e)))?;

    Ok(Some(body))
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_message_basic() {
        let data = b"Content-Length: 13\r\n\r\n{\"test\":true}";
        let mut reader = BufReader::new(&data[..]);
        let result = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(result, b"{\"test\":true}");
    }

    #[tokio::test]
    async fn read_message_eof() {
        let data = b"";
        let mut reader = BufReader::new(&data[..]);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_message_skips_extra_headers() {
        let data = b"Content-Length: 2\r\nContent-Type: application/json\r\n\r\n{}";
        let mut reader = BufReader::new(&data[..]);
        let result = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(result, b"{}");
    }

    #[tokio::test]
    async fn read_message_two_in_sequence() {
        let data = b"Content-Length: 2\r\n\r\n{}Content-Length: 4\r\n\r\ntrue";
        let mut reader = BufReader::new(&data[..]);
        assert_eq!(read_message(&mut reader).await.unwrap().unwrap(), b"{}");
        assert_eq!(read_message(&mut reader).await.unwrap().unwrap(), b"true");
    }

    #[tokio::test]
    async fn read_message_missing_length_is_error() {
        let data = b"Content-Type: application/json\r\n\r\n{}";
        let mut reader = BufReader::new(&data[..]);
        assert!(read_message(&mut reader).await.is_err());
    }
}
