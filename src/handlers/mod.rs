pub mod analysis;
pub mod build;
pub mod code;
pub mod git;
pub mod search;
pub mod todo;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::protocol::{
    ErrorCode, ErrorReport, InitializeParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ToolCallParams, ToolResult,
};
use crate::registry::ToolRegistry;

/// Everything a handler can see: configuration, the static registry, and the
/// shared HTTP client. Built once at startup.
pub struct ServerState {
    pub config: ServerConfig,
    pub registry: ToolRegistry,
    pub http: reqwest::Client,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = ToolRegistry::new(&config);
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcp-devtools-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("default reqwest client must build");
        Self {
            config,
            registry,
            http,
        }
    }
}

/// True for tools that suspend on the network rather than blocking on a
/// subprocess; these run on the spawned lane so the read loop keeps going.
pub fn is_network_tool(name: &str) -> bool {
    name == "search.query"
}

/// Dispatch a JSON-RPC request to the appropriate handler.
///
/// Returns `None` for notifications (no response required).
pub async fn dispatch(req: &JsonRpcRequest, state: &ServerState) -> Option<JsonRpcResponse> {
    // A message without an id is a notification: it never gets a response,
    // whatever the method. Nothing in the catalogue is worth running
    // fire-and-forget, so notifications are dropped outright.
    if req.id.is_none() {
        return None;
    }

    match req.method.as_str() {
        "initialize" => {
            if let Some(params) = req
                .params
                .as_ref()
                .and_then(|v| serde_json::from_value::<InitializeParams>(v.clone()).ok())
            {
                if let Some(client) = &params.client_info {
                    tracing::debug!(
                        "initialize from client {} {}",
                        client.name.as_deref().unwrap_or("<unnamed>"),
                        client.version.as_deref().unwrap_or("")
                    );
                }
                if let Some(requested) = &params.protocol_version {
                    if *requested != state.config.protocol_version {
                        tracing::debug!(
                            "client requested protocol {requested}, serving {}",
                            state.config.protocol_version
                        );
                    }
                }
            }
            let result = serde_json::json!({
                "protocolVersion": state.config.protocol_version,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "mcp-devtools-server",
                    "version": env!("CARGO_PKG_VERSION")
                }
            });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "notifications/initialized" => None,

        "ping" => Some(JsonRpcResponse::success(req.id.clone(), serde_json::json!({}))),

        "tools/list" => Some(JsonRpcResponse::success(
            req.id.clone(),
            state.registry.descriptors(),
        )),

        "tools/call" => {
            let params: ToolCallParams = match &req.params {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::invalid_params(format!(
                                "Invalid tools/call params: {e}"
                            )),
                        ));
                    }
                },
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for tools/call"),
                    ));
                }
            };

            // An unregistered tool name is a protocol-level failure, not a
            // tool-level one.
            let Some(spec) = state.registry.get(&params.name) else {
                return Some(JsonRpcResponse::error(
                    req.id.clone(),
                    JsonRpcError::unknown_tool(&params.name),
                ));
            };

            let args = params.arguments.clone().unwrap_or(Value::Object(Default::default()));
            let tool_result = match spec.validate_args(&args) {
                Ok(()) => dispatch_tool_call(&params.name, &args, state).await,
                Err(msg) => ErrorReport::new(ErrorCode::MissingArgument, msg).into(),
            };

            let result_json = serde_json::to_value(&tool_result)
                .expect("ToolResult must serialize to JSON Value");
            Some(JsonRpcResponse::success(req.id.clone(), result_json))
        }

        _ => Some(JsonRpcResponse::error(
            req.id.clone(),
            JsonRpcError::method_not_found(&req.method),
        )),
    }
}

async fn dispatch_tool_call(name: &str, args: &Value, state: &ServerState) -> ToolResult {
    let config: &ServerConfig = &state.config;
    match name {
        "search.query" => match parse_args(name, args) {
            Ok(p) => search::handle(p, &config.search, &state.http).await,
            Err(r) => r,
        },

        "code.search" => match parse_args(name, args) {
            Ok(p) => code::handle_search(p, config).await,
            Err(r) => r,
        },
        "code.read" => match parse_args(name, args) {
            Ok(p) => code::handle_read(p, config),
            Err(r) => r,
        },

        "build.detect" => build::handle_detect(config),
        "build.run" => match parse_args(name, args) {
            Ok(p) => build::handle_run(p, config, build::CommandKind::Build).await,
            Err(r) => r,
        },
        "test.run" => match parse_args(name, args) {
            Ok(p) => build::handle_run(p, config, build::CommandKind::Test).await,
            Err(r) => r,
        },

        "git.status" => git::handle_status(config).await,
        "git.diff" => match parse_args(name, args) {
            Ok(p) => git::handle_diff(p, config).await,
            Err(r) => r,
        },

        "todo.scan" => todo::handle_scan(config),
        "todo.read" => match parse_args(name, args) {
            Ok(p) => todo::handle_read(p, config),
            Err(r) => r,
        },
        "todo.update" => match parse_args(name, args) {
            Ok(p) => todo::handle_update(p, config),
            Err(r) => r,
        },
        "todo.next" => match parse_args(name, args) {
            Ok(p) => todo::handle_next(p, config),
            Err(r) => r,
        },

        "static.detect" => analysis::handle_detect(config),
        "lint.code" => analysis::handle_run(config, analysis::AnalysisKind::Lint).await,
        "format.code" => analysis::handle_run(config, analysis::AnalysisKind::Format).await,

        // The registry lookup in `dispatch` makes this unreachable, but a
        // registry/dispatch mismatch should fail loudly at the tool tier.
        _ => ErrorReport::new(
            ErrorCode::InternalError,
            format!("tool {name} is registered but has no handler"),
        )
        .into(),
    }
}

/// Deserialize schema-validated arguments into a tool's parameter struct.
fn parse_args<T: DeserializeOwned>(name: &str, args: &Value) -> Result<T, ToolResult> {
    serde_json::from_value(args.clone()).map_err(|e| {
        ErrorReport::new(
            ErrorCode::MissingArgument,
            format!("Invalid arguments for {name}: {e}"),
        )
        .into()
    })
}
