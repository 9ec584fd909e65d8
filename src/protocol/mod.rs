pub mod request;
pub mod response;

pub use request::{
    BuildRunParams, CodeReadParams, CodeSearchParams, GitDiffParams, InitializeParams,
    JsonRpcRequest, RpcId, SearchQueryParams, TaskUpdate, TodoNextParams, TodoPathParams,
    TodoUpdateParams, ToolCallParams,
};
pub use response::{
    ErrorCode, ErrorReport, JsonRpcError, JsonRpcNotification, JsonRpcResponse, ToolResult,
    ToolResultContent,
};
