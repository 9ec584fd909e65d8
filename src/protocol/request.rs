use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 ID — may be a number or string per spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Str(String),
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

/// Parameters for the `search.query` tool.
///
/// `q` is an accepted alias for `query`; exactly one of the two must be
/// present, which the handler checks (JSON Schema `oneOf` is deliberately
/// avoided to keep the advertised schemas flat).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQueryParams {
    pub query: Option<String>,
    pub q: Option<String>,
    pub num: Option<i64>,
    pub site: Option<String>,
    pub engine: Option<String>,
    pub date_restrict: Option<String>,
}

impl SearchQueryParams {
    /// The logical query, whichever alias carried it (`query` wins).
    pub fn effective_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or(self.q.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Parameters for the `code.search` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeSearchParams {
    pub query: String,
    #[serde(default)]
    pub globs: Vec<String>,
    pub max_results: Option<usize>,
    pub context_lines: Option<u32>,
}

/// Parameters for the `code.read` tool.
///
/// `start`/`end` accept i64 so out-of-range values are caught before casting.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeReadParams {
    pub path: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub max_bytes: Option<usize>,
}

/// Parameters for `build.run` and `test.run`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRunParams {
    /// Build target or test filter, appended verbatim to the dispatched
    /// command as a single argument.
    pub target: Option<String>,
}

/// Parameters for the `git.diff` tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitDiffParams {
    #[serde(default)]
    pub staged: bool,
}

/// Parameters for `todo.read`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPathParams {
    pub path: Option<String>,
}

/// One update entry for `todo.update`, matched against existing tasks by
/// normalized title.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskUpdate {
    pub title: String,
    pub done: Option<bool>,
    pub priority: Option<String>,
}

/// Parameters for `todo.update`.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoUpdateParams {
    pub path: Option<String>,
    pub updates: Vec<TaskUpdate>,
}

/// Parameters for `todo.next`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoNextParams {
    pub path: Option<String>,
    pub limit: Option<usize>,
}
