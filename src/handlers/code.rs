use serde::Serialize;

use crate::config::ServerConfig;
use crate::exec::run_command;
use crate::pathguard::resolve_within;
use crate::protocol::{CodeReadParams, CodeSearchParams, ErrorCode, ErrorReport, ToolResult};

/// Default cap on returned search matches.
const DEFAULT_MAX_RESULTS: usize = 50;

/// One content-search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub file: String,
    pub line: u64,
    pub column: u64,
    pub preview: String,
}

/// One parsed line of search-utility output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchLine {
    /// `path:line:column:text` — a match.
    Match(MatchRecord),
    /// `path-line-text` — a context line around a match.
    Context { file: String, text: String },
    /// `--` between match groups.
    Separator,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unrecognized search output line: {0}")]
pub struct SearchLineError(pub String);

/// Parse one line of `rg --line-number --column --no-heading` output.
///
/// Explicit outcome per line rather than best-effort regex matching: callers
/// decide what to do with lines that fit no known shape.
pub fn parse_search_line(line: &str) -> Result<SearchLine, SearchLineError> {
    if line == "--" {
        return Ok(SearchLine::Separator);
    }

    if let Some(record) = parse_match(line) {
        return Ok(SearchLine::Match(record));
    }
    if let Some(ctx) = parse_context(line) {
        return Ok(ctx);
    }
    Err(SearchLineError(line.to_string()))
}

/// `path:line:column:text`, with numeric line and column.
fn parse_match(line: &str) -> Option<MatchRecord> {
    // The path may itself contain ':' on odd filesystems; scan for the first
    // split where the two following fields are numeric.
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find(':') {
        let path_end = search_from + rel;
        let rest = &line[path_end + 1..];
        if let Some((lineno, rest)) = take_number(rest, ':') {
            if let Some((column, text)) = take_number(rest, ':') {
                return Some(MatchRecord {
                    file: clean_path(&line[..path_end]),
                    line: lineno,
                    column,
                    preview: text.to_string(),
                });
            }
        }
        search_from = path_end + 1;
    }
    None
}

/// `path-line-text`, rg's context-line shape.
fn parse_context(line: &str) -> Option<SearchLine> {
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find('-') {
        let path_end = search_from + rel;
        if path_end > 0 {
            let rest = &line[path_end + 1..];
            if let Some((_lineno, text)) = take_number(rest, '-') {
                return Some(SearchLine::Context {
                    file: clean_path(&line[..path_end]),
                    text: text.to_string(),
                });
            }
        }
        search_from = path_end + 1;
    }
    None
}

/// Split `rest` at `sep` if everything before it is a decimal number.
fn take_number(rest: &str, sep: char) -> Option<(u64, &str)> {
    let idx = rest.find(sep)?;
    let digits = &rest[..idx];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, &rest[idx + 1..]))
}

/// Parse one line of `grep -rn` output: `path:line:text`.
///
/// grep reports no column, so every match gets column 1.
pub fn parse_grep_line(line: &str) -> Result<MatchRecord, SearchLineError> {
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find(':') {
        let path_end = search_from + rel;
        let rest = &line[path_end + 1..];
        if let Some((lineno, text)) = take_number(rest, ':') {
            return Ok(MatchRecord {
                file: clean_path(&line[..path_end]),
                line: lineno,
                column: 1,
                preview: text.to_string(),
            });
        }
        search_from = path_end + 1;
    }
    Err(SearchLineError(line.to_string()))
}

fn clean_path(path: &str) -> String {
    path.strip_prefix("./").unwrap_or(path).to_string()
}

#[derive(Debug, Serialize)]
struct CodeSearchResponse {
    tool: &'static str,
    matches: Vec<MatchRecord>,
    total: usize,
    truncated: bool,
}

/// Handle a `code.search` tool call.
///
/// Prefers ripgrep; if it cannot be spawned, falls back to `grep -rn`
/// (which reports column 1 for every match).
pub async fn handle_search(params: CodeSearchParams, config: &ServerConfig) -> ToolResult {
    let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1);
    let context_lines = params.context_lines.unwrap_or(0);

    let context_arg = context_lines.to_string();
    let mut rg_args: Vec<&str> = vec![
        "--line-number",
        "--column",
        "--no-heading",
        "--color",
        "never",
    ];
    if context_lines > 0 {
        rg_args.extend(["-C", context_arg.as_str()]);
    }
    for glob in &params.globs {
        rg_args.extend(["--glob", glob.as_str()]);
    }
    rg_args.extend(["-e", params.query.as_str(), "."]);

    let mut tool = "rg";
    let mut result = run_command(
        "rg",
        &rg_args,
        &config.workroot,
        config.tool_timeout,
        config.max_output_bytes,
    )
    .await;

    let include_args: Vec<String> = params
        .globs
        .iter()
        .map(|glob| format!("--include={glob}"))
        .collect();
    if result.is_spawn_failure() {
        tool = "grep";
        let mut grep_args: Vec<&str> = vec!["-rn"];
        for arg in &include_args {
            grep_args.push(arg.as_str());
        }
        grep_args.extend(["-e", params.query.as_str(), "."]);
        result = run_command(
            "grep",
            &grep_args,
            &config.workroot,
            config.tool_timeout,
            config.max_output_bytes,
        )
        .await;
    }

    // Both tools exit 1 for "no matches"; anything above that is a failure.
    if result.status != 0 && result.status != 1 {
        return ErrorReport::new(
            ErrorCode::IoError,
            format!("{tool} failed (status {}): {}", result.status, result.stderr.trim()),
        )
        .into();
    }

    let mut matches: Vec<MatchRecord> = Vec::new();
    let mut truncated = false;
    for line in result.stdout.lines() {
        if line.is_empty() {
            continue;
        }
        if tool == "grep" {
            match parse_grep_line(line) {
                Ok(record) => {
                    if matches.len() >= max_results {
                        truncated = true;
                        break;
                    }
                    matches.push(record);
                }
                Err(e) => tracing::debug!("skipping search output line: {e}"),
            }
            continue;
        }
        match parse_search_line(line) {
            Ok(SearchLine::Match(record)) => {
                if matches.len() >= max_results {
                    truncated = true;
                    break;
                }
                matches.push(record);
            }
            Ok(SearchLine::Context { text, .. }) => {
                if let Some(last) = matches.last_mut() {
                    last.preview.push('\n');
                    last.preview.push_str(&text);
                }
            }
            Ok(SearchLine::Separator) => {}
            Err(e) => tracing::debug!("skipping search output line: {e}"),
        }
    }

    let payload = CodeSearchResponse {
        tool,
        total: matches.len(),
        truncated,
        matches,
    };
    match serde_json::to_string(&payload) {
        Ok(json) => ToolResult::text(json),
        Err(e) => {
            ErrorReport::new(ErrorCode::InternalError, format!("serialization failed: {e}")).into()
        }
    }
}

#[derive(Debug, Serialize)]
struct CodeReadResponse {
    path: String,
    content: String,
    truncated: bool,
}

/// Handle a `code.read` tool call.
///
/// The Path Guard runs before any filesystem access; the target must be a
/// regular file. An oversize selection is truncated and flagged, never an
/// error.
pub fn handle_read(params: CodeReadParams, config: &ServerConfig) -> ToolResult {
    let path = match resolve_within(&config.workroot, &params.path) {
        Ok(p) => p,
        Err(e) => return ErrorReport::new(ErrorCode::InvalidPath, e.to_string()).into(),
    };

    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start < 1 || end < start {
            return ErrorReport::new(
                ErrorCode::MissingArgument,
                format!("invalid line range: start={start}, end={end}"),
            )
            .into();
        }
    }

    let meta = match std::fs::symlink_metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ErrorReport::new(
                ErrorCode::NotFound,
                format!("file not found: {}", params.path),
            )
            .into();
        }
        Err(e) => {
            return ErrorReport::new(ErrorCode::IoError, format!("cannot stat file: {e}")).into();
        }
    };
    if !meta.is_file() {
        return ErrorReport::new(
            ErrorCode::InvalidPath,
            format!("not a regular file: {}", params.path),
        )
        .into();
    }

    let max_bytes = params.max_bytes.unwrap_or(config.max_output_bytes);

    // Whole-file reads stop at the cap instead of materializing the file;
    // line-range reads need everything up to `end`, so they load in full.
    let selection: String = match (params.start, params.end) {
        (None, None) => {
            let bytes = match read_capped(&path, max_bytes) {
                Ok(b) => b,
                Err(e) => {
                    return ErrorReport::new(ErrorCode::IoError, format!("cannot read file: {e}"))
                        .into();
                }
            };
            String::from_utf8_lossy(&bytes).into_owned()
        }
        (start, end) => {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    return ErrorReport::new(ErrorCode::IoError, format!("cannot read file: {e}"))
                        .into();
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let start = start.unwrap_or(1).max(1) as usize;
            let end = end.map(|e| e.max(0) as usize).unwrap_or(usize::MAX);
            content
                .lines()
                .skip(start - 1)
                .take(end.saturating_sub(start - 1))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    let (selection, truncated) = truncate_utf8(selection, max_bytes);

    let payload = CodeReadResponse {
        path: params.path,
        content: selection,
        truncated,
    };
    match serde_json::to_string(&payload) {
        Ok(json) => ToolResult::text(json),
        Err(e) => {
            ErrorReport::new(ErrorCode::InternalError, format!("serialization failed: {e}")).into()
        }
    }
}

/// Read at most `max_bytes + 1` bytes; the extra byte lets the caller tell a
/// file that exactly fits from one that was cut short.
fn read_capped(path: &std::path::Path, max_bytes: usize) -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.take(max_bytes as u64 + 1).read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
fn truncate_utf8(mut s: String, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s, false);
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    (s, true)
}
