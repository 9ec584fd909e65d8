use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use crate::config::ServerConfig;
use crate::pathguard::resolve_within;
use crate::protocol::{
    ErrorCode, ErrorReport, TodoNextParams, TodoPathParams, TodoUpdateParams, ToolResult,
};

/// Default number of tasks proposed by `todo.next`.
const DEFAULT_NEXT_LIMIT: usize = 3;

/// Directories never descended into while scanning for checklist files.
const SCAN_SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Maximum directory depth for `todo.scan`.
const SCAN_MAX_DEPTH: usize = 5;

/// Recognized priority tiers. Untagged tasks sort below both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    P1,
    P2,
}

/// One checklist task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub title: String,
    pub done: bool,
    pub priority: Option<Priority>,
}

impl Task {
    fn tier_rank(&self) -> u8 {
        match self.priority {
            Some(Priority::P1) => 0,
            Some(Priority::P2) => 1,
            None => 2,
        }
    }

    fn render(&self) -> String {
        let mark = if self.done { 'x' } else { ' ' };
        match self.priority {
            Some(Priority::P1) => format!("- [{mark}] [P1] {}", self.title),
            Some(Priority::P2) => format!("- [{mark}] [P2] {}", self.title),
            None => format!("- [{mark}] {}", self.title),
        }
    }
}

/// One parsed checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoLine {
    Task(Task),
    /// Anything that is not a checklist entry; preserved verbatim on rewrite.
    Other,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TodoParseError {
    #[error("malformed checkbox: {0}")]
    BadCheckbox(String),
    #[error("checklist entry with empty title: {0}")]
    EmptyTitle(String),
}

/// Parse one line of a checklist file.
///
/// Recognized shape: `- [ ] title` / `- [x] title`, with an optional leading
/// `[P1]` or `[P2]` tag in the title position. Lines that do not start with
/// `- [` are not checklist entries; lines that do but then go wrong are
/// explicit parse errors rather than silently dropped tasks.
pub fn parse_todo_line(line: &str) -> Result<TodoLine, TodoParseError> {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("- [") else {
        return Ok(TodoLine::Other);
    };

    let done = match rest.chars().next() {
        Some(' ') => false,
        Some('x') | Some('X') => true,
        _ => return Err(TodoParseError::BadCheckbox(line.to_string())),
    };
    let Some(rest) = rest.get(1..).and_then(|r| r.strip_prefix(']')) else {
        return Err(TodoParseError::BadCheckbox(line.to_string()));
    };

    let mut title = rest.trim();
    let mut priority = None;
    if let Some(stripped) = title.strip_prefix("[P1]") {
        priority = Some(Priority::P1);
        title = stripped.trim_start();
    } else if let Some(stripped) = title.strip_prefix("[P2]") {
        priority = Some(Priority::P2);
        title = stripped.trim_start();
    }

    if title.is_empty() {
        return Err(TodoParseError::EmptyTitle(line.to_string()));
    }

    Ok(TodoLine::Task(Task {
        title: title.to_string(),
        done,
        priority,
    }))
}

/// Title normalization used for `todo.update` matching: case-insensitive
/// with inner whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A checklist file decomposed into task and non-task lines, in order.
enum FileLine {
    Task(Task),
    Raw(String),
}

struct TodoFile {
    lines: Vec<FileLine>,
}

impl TodoFile {
    fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| match parse_todo_line(line) {
                Ok(TodoLine::Task(task)) => FileLine::Task(task),
                Ok(TodoLine::Other) => FileLine::Raw(line.to_string()),
                Err(e) => {
                    tracing::debug!("keeping malformed checklist line verbatim: {e}");
                    FileLine::Raw(line.to_string())
                }
            })
            .collect();
        Self { lines }
    }

    fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.lines.iter().filter_map(|l| match l {
            FileLine::Task(t) => Some(t),
            FileLine::Raw(_) => None,
        })
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                FileLine::Task(t) => out.push_str(&t.render()),
                FileLine::Raw(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }
}

/// Resolve the checklist path: explicit paths go through the Path Guard,
/// otherwise the configured default file under the working root.
fn resolve_todo_path(
    path: Option<&str>,
    config: &ServerConfig,
) -> Result<PathBuf, ToolResult> {
    match path {
        Some(p) => resolve_within(&config.workroot, p)
            .map_err(|e| ErrorReport::new(ErrorCode::InvalidPath, e.to_string()).into()),
        None => {
            if config.todo_file.is_absolute() {
                Ok(config.todo_file.clone())
            } else {
                Ok(config.workroot.join(&config.todo_file))
            }
        }
    }
}

fn read_todo_file(path: &Path) -> Result<TodoFile, ToolResult> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        let report = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorReport::new(
                ErrorCode::NotFound,
                format!("checklist file not found: {}", path.display()),
            )
        } else {
            ErrorReport::new(ErrorCode::IoError, format!("cannot read checklist: {e}"))
        };
        ToolResult::from(report)
    })?;
    Ok(TodoFile::parse(&content))
}

/// Handle a `todo.read` tool call.
pub fn handle_read(params: TodoPathParams, config: &ServerConfig) -> ToolResult {
    let path = match resolve_todo_path(params.path.as_deref(), config) {
        Ok(p) => p,
        Err(r) => return r,
    };
    let file = match read_todo_file(&path) {
        Ok(f) => f,
        Err(r) => return r,
    };

    let tasks: Vec<&Task> = file.tasks().collect();
    let open = tasks.iter().filter(|t| !t.done).count();
    let done = tasks.len() - open;
    ToolResult::text(
        json!({
            "path": path.display().to_string(),
            "tasks": tasks,
            "open": open,
            "done": done,
        })
        .to_string(),
    )
}

/// Handle a `todo.update` tool call.
///
/// Each update matches existing tasks by normalized title; the whole file is
/// rewritten, with non-task lines and task order preserved.
pub fn handle_update(params: TodoUpdateParams, config: &ServerConfig) -> ToolResult {
    let path = match resolve_todo_path(params.path.as_deref(), config) {
        Ok(p) => p,
        Err(r) => return r,
    };
    let mut file = match read_todo_file(&path) {
        Ok(f) => f,
        Err(r) => return r,
    };

    let mut applied = 0usize;
    let mut unmatched: Vec<&str> = Vec::new();

    for update in &params.updates {
        let wanted = normalize_title(&update.title);
        let mut hit = false;
        for line in &mut file.lines {
            let FileLine::Task(task) = line else { continue };
            if normalize_title(&task.title) != wanted {
                continue;
            }
            hit = true;
            if let Some(done) = update.done {
                task.done = done;
            }
            match update.priority.as_deref() {
                Some("P1") => task.priority = Some(Priority::P1),
                Some("P2") => task.priority = Some(Priority::P2),
                Some("none") => task.priority = None,
                Some(_) | None => {}
            }
        }
        if hit {
            applied += 1;
        } else {
            unmatched.push(&update.title);
        }
    }

    if let Err(e) = std::fs::write(&path, file.render()) {
        return ErrorReport::new(ErrorCode::IoError, format!("cannot rewrite checklist: {e}"))
            .into();
    }

    ToolResult::text(
        json!({
            "path": path.display().to_string(),
            "applied": applied,
            "unmatched": unmatched,
        })
        .to_string(),
    )
}

/// Order unfinished tasks by priority tier, keeping relative order within a
/// tier, and cut to `limit`.
pub fn next_tasks(tasks: &[Task], limit: usize) -> Vec<Task> {
    let mut open: Vec<Task> = tasks.iter().filter(|t| !t.done).cloned().collect();
    // sort_by_key is stable: untagged items keep their relative order.
    open.sort_by_key(Task::tier_rank);
    open.truncate(limit);
    open
}

/// Handle a `todo.next` tool call.
pub fn handle_next(params: TodoNextParams, config: &ServerConfig) -> ToolResult {
    let path = match resolve_todo_path(params.path.as_deref(), config) {
        Ok(p) => p,
        Err(r) => return r,
    };
    let file = match read_todo_file(&path) {
        Ok(f) => f,
        Err(r) => return r,
    };

    let all: Vec<Task> = file.tasks().cloned().collect();
    let limit = params.limit.unwrap_or(DEFAULT_NEXT_LIMIT).max(1);
    let tasks = next_tasks(&all, limit);

    ToolResult::text(
        json!({
            "path": path.display().to_string(),
            "tasks": tasks,
        })
        .to_string(),
    )
}

/// Handle a `todo.scan` tool call: find checklist files under the working
/// root and report per-file open/done counts, sorted by path.
pub fn handle_scan(config: &ServerConfig) -> ToolResult {
    let mut files = Vec::new();
    scan_dir(&config.workroot, &config.workroot, 0, &mut files);
    files.sort_by(|a, b| a.path.cmp(&b.path));
    ToolResult::text(json!({ "files": files }).to_string())
}

#[derive(Debug, Serialize)]
struct ScanEntry {
    path: String,
    open: usize,
    done: usize,
}

fn is_checklist_name(name: &str) -> bool {
    name == "TODO.md" || name.ends_with(".todo.md")
}

fn scan_dir(root: &Path, dir: &Path, depth: usize, out: &mut Vec<ScanEntry>) {
    if depth > SCAN_MAX_DEPTH {
        return;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("skipping unreadable directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else { continue };

        if file_type.is_dir() {
            if !SCAN_SKIP_DIRS.contains(&name.as_str()) {
                scan_dir(root, &path, depth + 1, out);
            }
        } else if file_type.is_file() && is_checklist_name(&name) {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let file = TodoFile::parse(&content);
            let tasks: Vec<&Task> = file.tasks().collect();
            let open = tasks.iter().filter(|t| !t.done).count();
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .display()
                .to_string();
            out.push(ScanEntry {
                path: rel,
                open,
                done: tasks.len() - open,
            });
        }
    }
}
