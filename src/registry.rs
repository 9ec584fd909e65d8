use serde_json::{json, Value};

use crate::config::ServerConfig;

/// One registered tool: descriptor plus the compiled argument validator.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: String,
    pub input_schema: Value,
    validator: jsonschema::Validator,
}

impl ToolSpec {
    fn new(name: &'static str, description: impl Into<String>, input_schema: Value) -> Self {
        let validator = jsonschema::validator_for(&input_schema)
            .expect("static tool input schema must compile");
        Self {
            name,
            description: description.into(),
            input_schema,
            validator,
        }
    }

    /// Check `tools/call` arguments against the declared input schema.
    pub fn validate_args(&self, args: &Value) -> Result<(), String> {
        if self.validator.is_valid(args) {
            Ok(())
        } else {
            Err(format!(
                "arguments do not match the {} input schema",
                self.name
            ))
        }
    }
}

/// Static per-server tool registry, built once at process start.
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Build the registry. Descriptions may reflect configuration (the
    /// search tool advertises which engines have credentials).
    pub fn new(config: &ServerConfig) -> Self {
        let tools = vec![
            ToolSpec::new(
                "search.query",
                search_description(config),
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "query": { "type": "string", "description": "Search query text" },
                        "q": { "type": "string", "description": "Alias for query" },
                        "num": {
                            "type": "integer",
                            "description": "Number of results (clamped to 1-10)"
                        },
                        "site": { "type": "string", "description": "Restrict results to a site" },
                        "engine": {
                            "type": "string",
                            "enum": ["serpapi", "google"],
                            "description": "Explicit engine selection"
                        },
                        "date_restrict": {
                            "type": "string",
                            "description": "Recency filter (d7, w2, m6, y1)"
                        }
                    }
                }),
            ),
            ToolSpec::new(
                "code.search",
                "Search file contents under the working root (ripgrep, falling back to grep)",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["query"],
                    "properties": {
                        "query": { "type": "string", "description": "Regex pattern to search for" },
                        "globs": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Include globs, e.g. *.rs"
                        },
                        "max_results": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Cap on returned matches (default 50)"
                        },
                        "context_lines": {
                            "type": "integer",
                            "minimum": 0,
                            "description": "Context lines folded into each match preview"
                        }
                    }
                }),
            ),
            ToolSpec::new(
                "code.read",
                "Read a file inside the working root, optionally a 1-based inclusive line range",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["path"],
                    "properties": {
                        "path": { "type": "string", "description": "File path relative to the working root" },
                        "start": { "type": "integer", "minimum": 1, "description": "First line (1-based)" },
                        "end": { "type": "integer", "minimum": 1, "description": "Last line, inclusive" },
                        "max_bytes": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "Byte cap; content beyond it is truncated, not an error"
                        }
                    }
                }),
            ),
            ToolSpec::new(
                "build.detect",
                "Detect project kinds in the working root by marker files",
                empty_schema(),
            ),
            ToolSpec::new(
                "build.run",
                "Run the fixed build command for the detected project kind",
                run_schema("Build target appended to the command"),
            ),
            ToolSpec::new(
                "test.run",
                "Run the fixed test command for the detected project kind",
                run_schema("Test filter appended to the command"),
            ),
            ToolSpec::new(
                "git.status",
                "Show a short git status summary for the working root",
                empty_schema(),
            ),
            ToolSpec::new(
                "git.diff",
                "Show the git diff, optionally staged changes only",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "staged": { "type": "boolean", "description": "Diff staged changes only" }
                    }
                }),
            ),
            ToolSpec::new(
                "todo.scan",
                "Find checklist files (TODO.md, *.todo.md) under the working root",
                empty_schema(),
            ),
            ToolSpec::new(
                "todo.read",
                "Parse a checklist file into structured tasks",
                todo_path_schema(),
            ),
            ToolSpec::new(
                "todo.update",
                "Update checklist tasks matched by title and rewrite the file",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["updates"],
                    "properties": {
                        "path": { "type": "string", "description": "Checklist file (default: configured TODO file)" },
                        "updates": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "additionalProperties": false,
                                "required": ["title"],
                                "properties": {
                                    "title": { "type": "string", "description": "Task title to match (normalized)" },
                                    "done": { "type": "boolean", "description": "New completion state" },
                                    "priority": {
                                        "type": "string",
                                        "enum": ["P1", "P2", "none"],
                                        "description": "New priority tier"
                                    }
                                }
                            }
                        }
                    }
                }),
            ),
            ToolSpec::new(
                "todo.next",
                "Propose unfinished tasks ordered by priority tier",
                json!({
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "path": { "type": "string", "description": "Checklist file (default: configured TODO file)" },
                        "limit": { "type": "integer", "minimum": 1, "description": "Max tasks to return (default 3)" }
                    }
                }),
            ),
            ToolSpec::new(
                "static.detect",
                "Detect ecosystems eligible for lint/format by marker files",
                empty_schema(),
            ),
            ToolSpec::new(
                "lint.code",
                "Run the fixed lint command for every detected ecosystem",
                empty_schema(),
            ),
            ToolSpec::new(
                "format.code",
                "Run the fixed format command for every detected ecosystem",
                empty_schema(),
            ),
        ];

        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Full registry contents in `tools/list` shape.
    pub fn descriptors(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn search_description(config: &ServerConfig) -> String {
    let mut engines = Vec::new();
    if config.search.serpapi_configured() {
        engines.push("serpapi");
    }
    if config.search.google_configured() {
        engines.push("google");
    }
    if engines.is_empty() {
        "Web search (no engine configured — calls will fail until credentials are set)".to_string()
    } else {
        format!("Web search via {}", engines.join(", "))
    }
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {}
    })
}

fn run_schema(target_desc: &str) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "target": { "type": "string", "description": target_desc }
        }
    })
}

fn todo_path_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "path": { "type": "string", "description": "Checklist file (default: configured TODO file)" }
        }
    })
}
