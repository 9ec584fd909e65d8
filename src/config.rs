use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for subprocess-backed tool operations (30 seconds).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Default ceiling on captured subprocess output and file reads (8 MiB).
const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

/// Default MCP protocol version advertised during `initialize`.
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Default checklist file, relative to the working root.
const DEFAULT_TODO_FILE: &str = "TODO.md";

/// Server configuration loaded from environment variables.
///
/// The environment is read exactly once at process start; everything else
/// receives this struct by reference. Handlers never touch `std::env`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub workroot: PathBuf,
    pub protocol_version: String,
    pub tool_timeout: Duration,
    pub max_output_bytes: usize,
    pub todo_file: PathBuf,
    pub search: SearchConfig,
}

/// Credentials for the two supported web search engines.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub serpapi_key: Option<String>,
    pub google_cse_key: Option<String>,
    pub google_cse_cx: Option<String>,
}

impl SearchConfig {
    pub fn serpapi_configured(&self) -> bool {
        self.serpapi_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Google Custom Search needs both the API key and the engine id.
    pub fn google_configured(&self) -> bool {
        self.google_cse_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            && self.google_cse_cx.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    pub fn any_configured(&self) -> bool {
        self.serpapi_configured() || self.google_configured()
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `DEVTOOLS_WORKROOT` (optional, default: current directory) — root all
    ///   file-system tools are confined to
    /// - `DEVTOOLS_PROTOCOL_VERSION` (optional) — protocol version override
    /// - `DEVTOOLS_TOOL_TIMEOUT_SECS` (optional, default 30) — max seconds per
    ///   subprocess invocation
    /// - `DEVTOOLS_MAX_OUTPUT_BYTES` (optional, default 8 MiB) — cap on
    ///   captured output and file reads
    /// - `DEVTOOLS_TODO_FILE` (optional, default `TODO.md`) — checklist file
    /// - `SERPAPI_KEY`, `GOOGLE_CSE_KEY` + `GOOGLE_CSE_CX` — search engine
    ///   credentials, each pair optional
    pub fn from_env() -> Result<Self, String> {
        let workroot = match std::env::var("DEVTOOLS_WORKROOT") {
            Ok(val) => PathBuf::from(val),
            Err(_) => std::env::current_dir()
                .map_err(|e| format!("cannot determine current directory: {e}"))?,
        };

        let protocol_version = std::env::var("DEVTOOLS_PROTOCOL_VERSION")
            .unwrap_or_else(|_| DEFAULT_PROTOCOL_VERSION.to_string());

        let tool_timeout_secs = match std::env::var("DEVTOOLS_TOOL_TIMEOUT_SECS") {
            Ok(val) => val
                .parse::<u64>()
                .map_err(|_| "DEVTOOLS_TOOL_TIMEOUT_SECS must be a positive integer".to_string())?,
            Err(_) => DEFAULT_TOOL_TIMEOUT_SECS,
        };

        let max_output_bytes = match std::env::var("DEVTOOLS_MAX_OUTPUT_BYTES") {
            Ok(val) => val
                .parse::<usize>()
                .map_err(|_| "DEVTOOLS_MAX_OUTPUT_BYTES must be a positive integer".to_string())?,
            Err(_) => DEFAULT_MAX_OUTPUT_BYTES,
        };

        let todo_file = std::env::var("DEVTOOLS_TODO_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TODO_FILE));

        let search = SearchConfig {
            serpapi_key: std::env::var("SERPAPI_KEY").ok(),
            google_cse_key: std::env::var("GOOGLE_CSE_KEY").ok(),
            google_cse_cx: std::env::var("GOOGLE_CSE_CX").ok(),
        };

        Ok(Self {
            workroot,
            protocol_version,
            tool_timeout: Duration::from_secs(tool_timeout_secs),
            max_output_bytes,
            todo_file,
            search,
        })
    }
}
