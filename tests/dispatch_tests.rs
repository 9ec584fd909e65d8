//! Tests for the full JSON-RPC dispatch flow: method routing, the two error
//! tiers, and boundary validation of tool arguments.

use std::path::Path;
use std::time::Duration;

use mcp_devtools_server::config::{SearchConfig, ServerConfig};
use mcp_devtools_server::handlers::{self, ServerState};
use mcp_devtools_server::protocol::{JsonRpcRequest, RpcId};
use mcp_devtools_server::registry::ToolRegistry;
use mcp_devtools_server::server;
use serde_json::json;

fn test_state(workroot: &Path) -> ServerState {
    ServerState::new(ServerConfig {
        workroot: workroot.to_path_buf(),
        protocol_version: "2024-11-05".to_string(),
        tool_timeout: Duration::from_secs(30),
        max_output_bytes: 8 * 1024 * 1024,
        todo_file: "TODO.md".into(),
        search: SearchConfig::default(),
    })
}

fn request(id: Option<RpcId>, method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id,
        method: method.to_string(),
        params,
    }
}

#[tokio::test]
async fn initialize_echoes_id_and_advertises_tools() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(Some(RpcId::Str("init-1".into())), "initialize", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    assert_eq!(resp.id, Some(RpcId::Str("init-1".into())));
    assert!(resp.error.is_none());

    let result = resp.result.unwrap();
    assert_eq!(result["protocolVersion"].as_str().unwrap(), "2024-11-05");
    assert!(
        result["capabilities"].get("tools").is_some(),
        "capability set must be non-empty"
    );
    assert_eq!(
        result["serverInfo"]["name"].as_str().unwrap(),
        "mcp-devtools-server"
    );
}

#[tokio::test]
async fn initialize_respects_version_override() {
    let tmp = tempfile::tempdir().unwrap();
    let mut state = test_state(tmp.path());
    state.config.protocol_version = "2025-03-26".to_string();

    let req = request(Some(RpcId::Number(1)), "initialize", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();
    assert_eq!(
        resp.result.unwrap()["protocolVersion"].as_str().unwrap(),
        "2025-03-26"
    );
}

#[tokio::test]
async fn tools_list_returns_full_registry() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(Some(RpcId::Number(2)), "tools/list", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 15);
    for tool in &tools {
        assert!(tool["name"].is_string());
        assert!(tool["description"].is_string());
        assert!(tool["inputSchema"].is_object());
    }
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        Some(RpcId::Number(3)),
        "tools/call",
        Some(json!({ "name": "no.such.tool", "arguments": {} })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    assert!(resp.result.is_none(), "must not be a tool-level error");
    let error = resp.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("no.such.tool"));
}

#[tokio::test]
async fn unknown_method_with_id_gets_method_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(Some(RpcId::Number(4)), "resources/list", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();
    assert_eq!(resp.error.unwrap().code, -32601);
}

#[tokio::test]
async fn unknown_method_notification_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(None, "resources/list", None);
    assert!(handlers::dispatch(&req, &state).await.is_none());
}

#[tokio::test]
async fn initialized_notification_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(None, "notifications/initialized", None);
    assert!(handlers::dispatch(&req, &state).await.is_none());
}

#[tokio::test]
async fn ping_notification_gets_no_response() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(None, "ping", None);
    assert!(handlers::dispatch(&req, &state).await.is_none());
}

#[tokio::test]
async fn tools_call_notification_gets_no_response() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        None,
        "tools/call",
        Some(json!({ "name": "git.status", "arguments": {} })),
    );
    assert!(handlers::dispatch(&req, &state).await.is_none());
}

#[tokio::test]
async fn initialize_notification_gets_no_response() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(None, "initialize", None);
    assert!(handlers::dispatch(&req, &state).await.is_none());
}

#[tokio::test]
async fn initialize_accepts_client_info() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        Some(RpcId::Number(11)),
        "initialize",
        Some(json!({
            "protocolVersion": "2025-03-26",
            "clientInfo": { "name": "test-client", "version": "0.0.1" }
        })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    // The server always answers with its own version, whatever the client
    // asked for.
    assert!(resp.error.is_none());
    assert_eq!(
        resp.result.unwrap()["protocolVersion"].as_str().unwrap(),
        "2024-11-05"
    );
}

#[tokio::test]
async fn panicking_dispatch_becomes_internal_error() {
    let resp = server::run_guarded(Some(RpcId::Number(12)), async {
        panic!("handler blew up")
    })
    .await
    .unwrap();

    assert_eq!(resp.id, Some(RpcId::Number(12)));
    assert_eq!(resp.error.unwrap().code, -32603);
}

#[tokio::test]
async fn panicking_dispatch_for_notification_is_swallowed() {
    let resp = server::run_guarded(None, async { panic!("handler blew up") }).await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn ping_returns_empty_success() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(Some(RpcId::Number(5)), "ping", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();
    assert_eq!(resp.result.unwrap(), json!({}));
}

#[tokio::test]
async fn tools_call_without_params_is_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(Some(RpcId::Number(6)), "tools/call", None);
    let resp = handlers::dispatch(&req, &state).await.unwrap();
    assert_eq!(resp.error.unwrap().code, -32602);
}

#[tokio::test]
async fn schema_validation_rejects_wrong_types() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    // code.read requires `path` to be a string.
    let req = request(
        Some(RpcId::Number(7)),
        "tools/call",
        Some(json!({ "name": "code.read", "arguments": { "path": 5 } })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    assert!(resp.error.is_none(), "validation failure is tool-level");
    let result = resp.result.unwrap();
    assert_eq!(result["isError"].as_bool(), Some(true));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("input schema"));
}

#[tokio::test]
async fn schema_validation_rejects_unknown_parameters() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        Some(RpcId::Number(8)),
        "tools/call",
        Some(json!({ "name": "git.status", "arguments": { "bogus": true } })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    let result = resp.result.unwrap();
    assert_eq!(result["isError"].as_bool(), Some(true));
}

#[tokio::test]
async fn search_without_engine_is_tool_level_error() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        Some(RpcId::Number(9)),
        "tools/call",
        Some(json!({ "name": "search.query", "arguments": { "query": "rust" } })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    assert!(resp.error.is_none(), "missing engine is not a protocol failure");
    let result = resp.result.unwrap();
    assert_eq!(result["isError"].as_bool(), Some(true));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("engine_unavailable"));
}

#[tokio::test]
async fn search_without_query_is_tool_level_error() {
    let tmp = tempfile::tempdir().unwrap();
    let state = test_state(tmp.path());

    let req = request(
        Some(RpcId::Number(10)),
        "tools/call",
        Some(json!({ "name": "search.query", "arguments": {} })),
    );
    let resp = handlers::dispatch(&req, &state).await.unwrap();

    let result = resp.result.unwrap();
    assert_eq!(result["isError"].as_bool(), Some(true));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("missing_argument"));
}

#[tokio::test]
async fn search_query_is_the_only_network_tool() {
    assert!(handlers::is_network_tool("search.query"));
    assert!(!handlers::is_network_tool("code.search"));
    assert!(!handlers::is_network_tool("git.status"));
}

#[tokio::test]
async fn registry_descriptions_reflect_configuration() {
    let tmp = tempfile::tempdir().unwrap();

    let unconfigured = test_state(tmp.path());
    let search = unconfigured.registry.get("search.query").unwrap();
    assert!(search.description.contains("no engine configured"));

    let mut config = ServerConfig {
        workroot: tmp.path().to_path_buf(),
        protocol_version: "2024-11-05".to_string(),
        tool_timeout: Duration::from_secs(30),
        max_output_bytes: 8 * 1024 * 1024,
        todo_file: "TODO.md".into(),
        search: SearchConfig::default(),
    };
    config.search.serpapi_key = Some("key".into());
    let registry = ToolRegistry::new(&config);
    assert!(registry
        .get("search.query")
        .unwrap()
        .description
        .contains("serpapi"));
}
