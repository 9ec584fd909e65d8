//! Local MCP tool server for development workflows.
//!
//! Exposes `search.query`, `code.search`/`code.read`, `build.*`/`test.run`,
//! `git.status`/`git.diff`, `todo.*`, and `static.detect`/`lint.code`/
//! `format.code` over JSON-RPC 2.0 stdio transport, compatible with any
//! MCP-aware AI agent.

pub mod config;
pub mod exec;
pub mod handlers;
pub mod pathguard;
pub mod protocol;
pub mod registry;
pub mod server;
