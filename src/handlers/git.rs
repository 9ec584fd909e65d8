use crate::config::ServerConfig;
use crate::exec::run_command;
use crate::protocol::{ErrorCode, ErrorReport, GitDiffParams, ToolResult};

/// Handle a `git.status` tool call: fixed argv, output passed through.
pub async fn handle_status(config: &ServerConfig) -> ToolResult {
    run_git(&["status", "--short", "--branch"], config).await
}

/// Handle a `git.diff` tool call, optionally staged changes only.
pub async fn handle_diff(params: GitDiffParams, config: &ServerConfig) -> ToolResult {
    if params.staged {
        run_git(&["diff", "--cached"], config).await
    } else {
        run_git(&["diff"], config).await
    }
}

async fn run_git(args: &[&str], config: &ServerConfig) -> ToolResult {
    let result = run_command(
        "git",
        args,
        &config.workroot,
        config.tool_timeout,
        config.max_output_bytes,
    )
    .await;

    let payload = serde_json::to_string(&result);
    match payload {
        Ok(json) => ToolResult::text(json),
        Err(e) => {
            ErrorReport::new(ErrorCode::InternalError, format!("serialization failed: {e}")).into()
        }
    }
}
