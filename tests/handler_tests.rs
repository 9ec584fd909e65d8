//! Integration tests for the file-system and subprocess-backed handlers.
//!
//! Handlers are exercised directly with a fixture ServerConfig pointing at a
//! temporary working root.

use std::fs;
use std::path::Path;
use std::time::Duration;

use mcp_devtools_server::config::{SearchConfig, ServerConfig};
use mcp_devtools_server::handlers::{analysis, build, code, git, todo};
use mcp_devtools_server::protocol::{
    BuildRunParams, CodeReadParams, GitDiffParams, TodoNextParams, TodoPathParams,
    TodoUpdateParams,
};

fn test_config(workroot: &Path) -> ServerConfig {
    ServerConfig {
        workroot: workroot.to_path_buf(),
        protocol_version: "2024-11-05".to_string(),
        tool_timeout: Duration::from_secs(30),
        max_output_bytes: 8 * 1024 * 1024,
        todo_file: "TODO.md".into(),
        search: SearchConfig::default(),
    }
}

fn text_json(result: &mcp_devtools_server::protocol::ToolResult) -> serde_json::Value {
    serde_json::from_str(&result.content[0].text).expect("tool output must be JSON")
}

// ---------------------------------------------------------------------------
// code.read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn code_read_line_range() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "one\ntwo\nthree\nfour\nfive\n").unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "a.txt".into(),
            start: Some(2),
            end: Some(3),
            max_bytes: None,
        },
        &config,
    );
    assert!(!result.is_error);

    let value = text_json(&result);
    assert_eq!(value["content"].as_str().unwrap(), "two\nthree");
    assert_eq!(value["truncated"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn code_read_whole_file() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "hello\nworld\n").unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "a.txt".into(),
            start: None,
            end: None,
            max_bytes: None,
        },
        &config,
    );
    assert!(!result.is_error);
    assert_eq!(text_json(&result)["content"].as_str().unwrap(), "hello\nworld\n");
}

#[tokio::test]
async fn code_read_byte_cap_truncates() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("big.txt"), "abcdefghij").unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "big.txt".into(),
            start: None,
            end: None,
            max_bytes: Some(4),
        },
        &config,
    );
    assert!(!result.is_error, "oversize content truncates, never errors");

    let value = text_json(&result);
    assert_eq!(value["content"].as_str().unwrap(), "abcd");
    assert_eq!(value["truncated"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn code_read_exact_cap_is_not_truncated() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("fit.txt"), "abcdefghij").unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "fit.txt".into(),
            start: None,
            end: None,
            max_bytes: Some(10),
        },
        &config,
    );
    assert!(!result.is_error);

    let value = text_json(&result);
    assert_eq!(value["content"].as_str().unwrap(), "abcdefghij");
    assert_eq!(value["truncated"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn code_read_rejects_traversal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "../../etc/passwd".into(),
            start: None,
            end: None,
            max_bytes: None,
        },
        &config,
    );
    assert!(result.is_error);
    assert!(result.content[0].text.contains("invalid_path"));
}

#[tokio::test]
async fn code_read_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "nope.txt".into(),
            start: None,
            end: None,
            max_bytes: None,
        },
        &config,
    );
    assert!(result.is_error);
    assert!(result.content[0].text.contains("not_found"));
}

#[tokio::test]
async fn code_read_rejects_directory() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    let config = test_config(tmp.path());

    let result = code::handle_read(
        CodeReadParams {
            path: "sub".into(),
            start: None,
            end: None,
            max_bytes: None,
        },
        &config,
    );
    assert!(result.is_error);
}

// ---------------------------------------------------------------------------
// todo handlers
// ---------------------------------------------------------------------------

const CHECKLIST: &str = "\
# Sprint tasks

- [ ] [P2] tune the cache
- [x] ship the release
- [ ] [P1] fix the login bug
- [ ] write docs
";

#[tokio::test]
async fn todo_read_parses_tasks_and_counts() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("TODO.md"), CHECKLIST).unwrap();
    let config = test_config(tmp.path());

    let result = todo::handle_read(TodoPathParams::default(), &config);
    assert!(!result.is_error);

    let value = text_json(&result);
    assert_eq!(value["tasks"].as_array().unwrap().len(), 4);
    assert_eq!(value["open"].as_u64().unwrap(), 3);
    assert_eq!(value["done"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn todo_next_orders_by_tier_with_limit() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("TODO.md"), CHECKLIST).unwrap();
    let config = test_config(tmp.path());

    let result = todo::handle_next(
        TodoNextParams {
            path: None,
            limit: Some(2),
        },
        &config,
    );
    assert!(!result.is_error);

    let value = text_json(&result);
    let tasks = value["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["title"].as_str().unwrap(), "fix the login bug");
    assert_eq!(tasks[1]["title"].as_str().unwrap(), "tune the cache");
}

#[tokio::test]
async fn todo_update_matches_normalized_title_and_rewrites() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("TODO.md");
    fs::write(&path, CHECKLIST).unwrap();
    let config = test_config(tmp.path());

    let updates: TodoUpdateParams = serde_json::from_value(serde_json::json!({
        "updates": [
            { "title": "  Write   DOCS ", "done": true },
            { "title": "no such task", "done": true }
        ]
    }))
    .unwrap();

    let result = todo::handle_update(updates, &config);
    assert!(!result.is_error);

    let value = text_json(&result);
    assert_eq!(value["applied"].as_u64().unwrap(), 1);
    assert_eq!(value["unmatched"].as_array().unwrap().len(), 1);

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("- [x] write docs"));
    assert!(
        rewritten.contains("# Sprint tasks"),
        "non-task lines survive the rewrite"
    );
    assert!(rewritten.contains("- [ ] [P1] fix the login bug"));
}

#[tokio::test]
async fn todo_scan_finds_checklist_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("TODO.md"), "- [ ] a\n- [x] b\n").unwrap();
    fs::create_dir_all(tmp.path().join("sub")).unwrap();
    fs::write(tmp.path().join("sub/backend.todo.md"), "- [ ] c\n").unwrap();
    fs::write(tmp.path().join("notes.md"), "- [ ] not scanned\n").unwrap();
    let config = test_config(tmp.path());

    let result = todo::handle_scan(&config);
    assert!(!result.is_error);

    let value = text_json(&result);
    let files = value["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    // Sorted by path.
    assert_eq!(files[0]["path"].as_str().unwrap(), "TODO.md");
    assert_eq!(files[0]["open"].as_u64().unwrap(), 1);
    assert_eq!(files[0]["done"].as_u64().unwrap(), 1);
    assert_eq!(files[1]["path"].as_str().unwrap(), "sub/backend.todo.md");
}

#[tokio::test]
async fn todo_read_missing_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = todo::handle_read(TodoPathParams::default(), &config);
    assert!(result.is_error);
    assert!(result.content[0].text.contains("not_found"));
}

// ---------------------------------------------------------------------------
// build / static analysis detection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn build_detect_priority_order() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("package.json"), "{}").unwrap();
    fs::write(tmp.path().join("Cargo.toml"), "[package]").unwrap();
    let config = test_config(tmp.path());

    let result = build::handle_detect(&config);
    assert!(!result.is_error);

    let value = text_json(&result);
    let projects = value["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["kind"].as_str().unwrap(), "rust");
    assert_eq!(projects[1]["kind"].as_str().unwrap(), "node");
}

#[tokio::test]
async fn build_run_without_project_type() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = build::handle_run(
        BuildRunParams::default(),
        &config,
        build::CommandKind::Build,
    )
    .await;
    assert!(result.is_error);
    assert!(result.content[0].text.contains("no_project_type"));
}

#[tokio::test]
async fn static_detect_lists_all_ecosystems() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("pyproject.toml"), "").unwrap();
    fs::write(tmp.path().join("go.mod"), "module x").unwrap();
    let config = test_config(tmp.path());

    let result = analysis::handle_detect(&config);
    assert!(!result.is_error);

    let value = text_json(&result);
    let ecosystems = value["ecosystems"].as_array().unwrap();
    assert_eq!(ecosystems.len(), 2);
    assert_eq!(ecosystems[0]["name"].as_str().unwrap(), "go");
    assert_eq!(ecosystems[1]["name"].as_str().unwrap(), "python");
}

#[tokio::test]
async fn lint_without_ecosystem_is_tool_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = analysis::handle_run(&config, analysis::AnalysisKind::Lint).await;
    assert!(result.is_error);
    assert!(result.content[0].text.contains("no_project_type"));
}

// ---------------------------------------------------------------------------
// git passthrough
// ---------------------------------------------------------------------------

#[tokio::test]
async fn git_status_is_passthrough_even_outside_a_repo() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    // Not a git repo: the command fails, but that is reported as data, not
    // as a tool-level error.
    let result = git::handle_status(&config).await;
    assert!(!result.is_error);

    let value = text_json(&result);
    assert!(value["status"].is_i64());
}

#[tokio::test]
async fn git_diff_staged_flag_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let result = git::handle_diff(GitDiffParams { staged: true }, &config).await;
    assert!(!result.is_error);
}

// ---------------------------------------------------------------------------
// code.search (subprocess-backed; relies on rg or grep being installed)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn code_search_finds_matches() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
    let config = test_config(tmp.path());

    let params = serde_json::from_value(serde_json::json!({ "query": "alpha" })).unwrap();
    let result = code::handle_search(params, &config).await;
    assert!(!result.is_error);

    let value = text_json(&result);
    let matches = value["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["file"].as_str().unwrap(), "a.rs");
    assert_eq!(matches[0]["line"].as_u64().unwrap(), 1);
    assert!(matches[0]["preview"].as_str().unwrap().contains("alpha"));
}

#[tokio::test]
async fn code_search_caps_match_count() {
    let tmp = tempfile::tempdir().unwrap();
    let body: String = (0..20).map(|i| format!("needle {i}\n")).collect();
    fs::write(tmp.path().join("hay.txt"), body).unwrap();
    let config = test_config(tmp.path());

    let params = serde_json::from_value(serde_json::json!({
        "query": "needle",
        "max_results": 5
    }))
    .unwrap();
    let result = code::handle_search(params, &config).await;
    assert!(!result.is_error);

    let value = text_json(&result);
    assert_eq!(value["matches"].as_array().unwrap().len(), 5);
    assert_eq!(value["truncated"].as_bool().unwrap(), true);
}
