use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::handlers::{self, ServerState};
use crate::protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcId};

/// Maximum bytes per JSON-RPC message (1 MiB).
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Cap on concurrently in-flight network-backed tool calls.
const MAX_INFLIGHT_NETWORK_CALLS: usize = 16;

/// MCP server that communicates over stdio using newline-delimited JSON-RPC 2.0.
///
/// Two execution lanes: subprocess-backed and local tools run inline and
/// block the read loop (response order equals request order for them);
/// network-backed tools run on a bounded task set while the loop keeps
/// reading, so their responses correlate to requests by id only.
pub struct McpServer {
    state: Arc<ServerState>,
    initialized: bool,
}

/// Shared stdout writer. Each message is one line written and flushed under
/// the lock, so lines from the two lanes never interleave.
#[derive(Clone)]
pub struct MessageWriter {
    inner: Arc<Mutex<tokio::io::Stdout>>,
}

impl MessageWriter {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(tokio::io::stdout())),
        }
    }

    pub async fn write_message<T: Serialize>(&self, msg: &T) -> std::io::Result<()> {
        let out = serde_json::to_string(msg)
            .expect("protocol messages must serialize to JSON");
        let mut stdout = self.inner.lock().await;
        stdout.write_all(out.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(config)),
            initialized: false,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = tokio::io::stdin();
        let writer = MessageWriter::new();
        let mut reader = BufReader::new(stdin);
        let mut raw = Vec::new();
        let mut network_calls: JoinSet<()> = JoinSet::new();

        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw).await?;
            if n == 0 {
                break;
            }

            // Malformed input never gets a response; the line is logged and
            // dropped so one bad message cannot wedge the stream.
            if n > MAX_MESSAGE_BYTES {
                tracing::warn!("dropping oversized message: {n} bytes (limit {MAX_MESSAGE_BYTES})");
                continue;
            }

            let trimmed = match std::str::from_utf8(&raw) {
                Ok(s) => s.trim(),
                Err(_) => {
                    tracing::warn!("dropping non-UTF-8 message");
                    continue;
                }
            };

            if trimmed.is_empty() {
                continue;
            }

            let req: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("dropping unparseable message: {e}");
                    continue;
                }
            };

            // Validate jsonrpc version
            if req.jsonrpc != "2.0" {
                writer
                    .write_message(&JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_request(),
                    ))
                    .await?;
                continue;
            }

            // Initialization gate: only `initialize` is allowed before the
            // handshake completes.
            if !self.initialized && req.method != "initialize" {
                if req.id.is_none() {
                    continue;
                }
                writer
                    .write_message(&JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_request_with("Server not initialized"),
                    ))
                    .await?;
                continue;
            }

            if self.initialized && is_network_call(&req) {
                // Suspending lane: keep reading while the call is in flight.
                if network_calls.len() >= MAX_INFLIGHT_NETWORK_CALLS {
                    network_calls.join_next().await;
                }
                let state = Arc::clone(&self.state);
                let task_writer = writer.clone();
                network_calls.spawn(async move {
                    let id = req.id.clone();
                    let resp =
                        run_guarded(id, async move { handlers::dispatch(&req, &state).await })
                            .await;
                    if let Some(resp) = resp {
                        if let Err(e) = task_writer.write_message(&resp).await {
                            tracing::warn!("failed to write response: {e}");
                        }
                    }
                });
                continue;
            }

            // Blocking lane: no further input is read until the response is
            // on the wire.
            let method = req.method.clone();
            let id = req.id.clone();
            let state = Arc::clone(&self.state);
            let resp =
                run_guarded(id, async move { handlers::dispatch(&req, &state).await }).await;
            if let Some(resp) = resp {
                writer.write_message(&resp).await?;

                if method == "initialize" {
                    self.initialized = true;
                    writer
                        .write_message(&JsonRpcNotification::new("notifications/ready"))
                        .await?;
                }
            }
        }

        // Let in-flight network calls finish before exiting on EOF.
        while let Some(joined) = network_calls.join_next().await {
            if let Err(e) = joined {
                tracing::error!("network tool task failed: {e}");
            }
        }

        Ok(())
    }
}

/// Run a dispatch future on its own task so that a handler panic is contained
/// instead of tearing down the read loop. A join failure becomes an internal
/// error (-32603) addressed to the caller's id; if the message was a
/// notification there is no one to tell, so the failure is only logged.
pub async fn run_guarded<F>(id: Option<RpcId>, fut: F) -> Option<JsonRpcResponse>
where
    F: std::future::Future<Output = Option<JsonRpcResponse>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!("dispatch task failed: {e}");
            id.map(|id| {
                JsonRpcResponse::error(
                    Some(id),
                    JsonRpcError::internal_error(format!("Handler failed: {e}")),
                )
            })
        }
    }
}

fn is_network_call(req: &JsonRpcRequest) -> bool {
    req.method == "tools/call"
        && req
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .is_some_and(handlers::is_network_tool)
}
