//! Minimal stdio tool server exposing arithmetic tools.
//!
//! Speaks the tool protocol (JSON-RPC 2.0, Content-Length framed) over
//! stdin/stdout: `initialize`, `tools/list`, `tools/call`. Spawned as a
//! child process by the tool session; requests are handled one at a
//! time in arrival order.

use std::io::{self, BufRead, BufReader, Read, Write};

use serde_json::{json, Value};

const PROTOCOL_VERSION: &str = "2024-11-05";

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    while let Some(data) = read_message(&mut reader)? {
        let message: Value = match serde_json::from_slice(&data) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("unparseable message: {}", e);
                continue;
            }
        };

        if let Some(response) = handle(&message) {
            write_message(&mut writer, &response)?;
        }
    }

    Ok(())
}

/// Dispatch one message. Notifications produce no response.
fn handle(message: &Value) -> Option<Value> {
    let method = message["method"].as_str().unwrap_or("");
    let id = message["id"].as_u64();

    // Notifications carry no id and expect no reply.
    let id = match id {
        Some(id) => id,
        None => return None,
    };

    let response = match method {
        "initialize" => ok(id, initialize_result()),
        "tools/list" => ok(id, json!({ "tools": tool_list() })),
        "tools/call" => call_tool(id, &message["params"]),
        other => error(id, -32601, &format!("Method not found: {}", other)),
    };

    Some(response)
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "math-server",
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

fn tool_list() -> Value {
    json!([
        {
            "name": "add",
            "description": "Add two integers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }
        },
        {
            "name": "multiply",
            "description": "Multiply two integers.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"]
            }
        }
    ])
}

fn call_tool(id: u64, params: &Value) -> Value {
    let name = params["name"].as_str().unwrap_or("");
    let args = &params["arguments"];

    let (a, b) = match (args["a"].as_i64(), args["b"].as_i64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return tool_error(id, "arguments 'a' and 'b' must be integers"),
    };

    let result = match name {
        "add" => a + b,
        "multiply" => a * b,
        other => return tool_error(id, &format!("unknown tool: {}", other)),
    };

    ok(
        id,
        json!({
            "content": [{ "type": "text", "text": result.to_string() }],
            "isError": false
        }),
    )
}

fn ok(id: u64, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error(id: u64, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

/// Tool-level failures are reported in-band, not as protocol errors.
fn tool_error(id: u64, message: &str) -> Value {
    ok(
        id,
        json!({
            "content": [{ "type": "text", "text": message }],
            "isError": true
        }),
    )
}

// ── Content-Length framing ────────────────────────────────────────

fn read_message<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    let mut header_line = String::new();

    loop {
        header_line.clear();
        let n = reader.read_line(&mut header_line)?;
        if n == 0 {
            return Ok(None); // EOF
        }
        let trimmed = header_line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(val) = trimmed.strip_prefix("Content-Length:") {
            content_length = val.trim().parse::<usize>().ok();
        }
    }

    let len = content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing Content-Length"))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

fn write_message<W: Write>(writer: &mut W, value: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(value)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}

// ── Tests ─────────────────────────────────────────────────────────
