use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::config::ServerConfig;
use crate::exec::run_command;
use crate::protocol::{BuildRunParams, ErrorCode, ErrorReport, ToolResult};

/// Which of a project kind's two fixed commands to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Build,
    Test,
}

/// A supported project ecosystem: marker file plus its two fixed commands.
#[derive(Debug)]
pub struct ProjectKind {
    pub kind: &'static str,
    pub marker: &'static str,
    pub build: (&'static str, &'static [&'static str]),
    pub test: (&'static str, &'static [&'static str]),
}

/// Detection priority order; the first present marker wins for `run`.
pub const PROJECT_KINDS: &[ProjectKind] = &[
    ProjectKind {
        kind: "rust",
        marker: "Cargo.toml",
        build: ("cargo", &["build"]),
        test: ("cargo", &["test"]),
    },
    ProjectKind {
        kind: "go",
        marker: "go.mod",
        build: ("go", &["build", "./..."]),
        test: ("go", &["test", "./..."]),
    },
    ProjectKind {
        kind: "node",
        marker: "package.json",
        build: ("npm", &["run", "build"]),
        test: ("npm", &["test"]),
    },
    ProjectKind {
        kind: "python",
        marker: "pyproject.toml",
        build: ("python", &["-m", "compileall", "-q", "."]),
        test: ("python", &["-m", "pytest"]),
    },
    ProjectKind {
        kind: "make",
        marker: "Makefile",
        build: ("make", &[]),
        test: ("make", &["test"]),
    },
];

/// All project kinds whose marker file exists in `root`, in priority order.
pub fn detect_projects(root: &Path) -> Vec<&'static ProjectKind> {
    PROJECT_KINDS
        .iter()
        .filter(|k| root.join(k.marker).is_file())
        .collect()
}

fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Handle a `build.detect` tool call.
pub fn handle_detect(config: &ServerConfig) -> ToolResult {
    let projects: Vec<_> = detect_projects(&config.workroot)
        .into_iter()
        .map(|k| {
            json!({
                "kind": k.kind,
                "marker": k.marker,
                "build_command": display_command(k.build.0, k.build.1),
                "test_command": display_command(k.test.0, k.test.1),
            })
        })
        .collect();
    ToolResult::text(json!({ "projects": projects }).to_string())
}

#[derive(Debug, Serialize)]
struct RunResponse<'a> {
    kind: &'a str,
    command: String,
    status: i32,
    stdout: String,
    stderr: String,
}

/// Handle a `build.run` or `test.run` tool call.
///
/// Dispatches exactly one fixed command for the highest-priority detected
/// kind. A caller-supplied target/filter is appended as one extra argument,
/// never reinterpreted per ecosystem.
pub async fn handle_run(
    params: BuildRunParams,
    config: &ServerConfig,
    which: CommandKind,
) -> ToolResult {
    let Some(project) = detect_projects(&config.workroot).into_iter().next() else {
        return ErrorReport::new(
            ErrorCode::NoProjectType,
            "no supported project type detected in working root",
        )
        .into();
    };

    let (program, fixed_args) = match which {
        CommandKind::Build => project.build,
        CommandKind::Test => project.test,
    };

    let mut args: Vec<&str> = fixed_args.to_vec();
    if let Some(target) = params.target.as_deref() {
        let target = target.trim();
        if !target.is_empty() {
            args.push(target);
        }
    }

    let result = run_command(
        program,
        &args,
        &config.workroot,
        config.tool_timeout,
        config.max_output_bytes,
    )
    .await;

    let payload = RunResponse {
        kind: project.kind,
        command: display_command(program, &args),
        status: result.status,
        stdout: result.stdout,
        stderr: result.stderr,
    };
    match serde_json::to_string(&payload) {
        Ok(json) => ToolResult::text(json),
        Err(e) => {
            ErrorReport::new(ErrorCode::InternalError, format!("serialization failed: {e}")).into()
        }
    }
}
