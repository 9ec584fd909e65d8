use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::config::ServerConfig;
use crate::exec::run_command;
use crate::protocol::{ErrorCode, ErrorReport, ToolResult};

/// Which fixed command family to run per ecosystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Lint,
    Format,
}

/// A lint/format-capable ecosystem: marker file plus its two fixed commands.
#[derive(Debug)]
pub struct Ecosystem {
    pub name: &'static str,
    pub marker: &'static str,
    pub lint: (&'static str, &'static [&'static str]),
    pub format: (&'static str, &'static [&'static str]),
}

pub const ECOSYSTEMS: &[Ecosystem] = &[
    Ecosystem {
        name: "rust",
        marker: "Cargo.toml",
        lint: ("cargo", &["clippy", "--quiet"]),
        format: ("cargo", &["fmt"]),
    },
    Ecosystem {
        name: "go",
        marker: "go.mod",
        lint: ("go", &["vet", "./..."]),
        format: ("gofmt", &["-w", "."]),
    },
    Ecosystem {
        name: "node",
        marker: "package.json",
        lint: ("npx", &["eslint", "."]),
        format: ("npx", &["prettier", "--write", "."]),
    },
    Ecosystem {
        name: "python",
        marker: "pyproject.toml",
        lint: ("ruff", &["check", "."]),
        format: ("ruff", &["format", "."]),
    },
];

/// Every ecosystem whose marker file exists in `root`. Unlike build
/// dispatch, all detected ecosystems are acted on, not just the first.
pub fn detect_ecosystems(root: &Path) -> Vec<&'static Ecosystem> {
    ECOSYSTEMS
        .iter()
        .filter(|e| root.join(e.marker).is_file())
        .collect()
}

fn display_command(program: &str, args: &[&str]) -> String {
    format!("{program} {}", args.join(" "))
}

/// Handle a `static.detect` tool call.
pub fn handle_detect(config: &ServerConfig) -> ToolResult {
    let ecosystems: Vec<_> = detect_ecosystems(&config.workroot)
        .into_iter()
        .map(|e| {
            json!({
                "name": e.name,
                "marker": e.marker,
                "lint_command": display_command(e.lint.0, e.lint.1),
                "format_command": display_command(e.format.0, e.format.1),
            })
        })
        .collect();
    ToolResult::text(json!({ "ecosystems": ecosystems }).to_string())
}

#[derive(Debug, Serialize)]
struct AnalysisEntry {
    ecosystem: &'static str,
    command: String,
    status: i32,
    stdout: String,
    stderr: String,
}

/// Handle a `lint.code` or `format.code` tool call: one fixed command per
/// detected ecosystem, one aggregated result entry each.
pub async fn handle_run(config: &ServerConfig, kind: AnalysisKind) -> ToolResult {
    let detected = detect_ecosystems(&config.workroot);
    if detected.is_empty() {
        return ErrorReport::new(
            ErrorCode::NoProjectType,
            "no supported ecosystem detected in working root",
        )
        .into();
    }

    let mut entries = Vec::with_capacity(detected.len());
    for eco in detected {
        let (program, args) = match kind {
            AnalysisKind::Lint => eco.lint,
            AnalysisKind::Format => eco.format,
        };
        let result = run_command(
            program,
            args,
            &config.workroot,
            config.tool_timeout,
            config.max_output_bytes,
        )
        .await;
        entries.push(AnalysisEntry {
            ecosystem: eco.name,
            command: display_command(program, args),
            status: result.status,
            stdout: result.stdout,
            stderr: result.stderr,
        });
    }

    match serde_json::to_string(&json!({ "results": entries })) {
        Ok(json) => ToolResult::text(json),
        Err(e) => {
            ErrorReport::new(ErrorCode::InternalError, format!("serialization failed: {e}")).into()
        }
    }
}
