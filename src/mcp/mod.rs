//! Model Context Protocol client subsystem.
//!
//! Remote tool servers are reached over a streamable HTTP transport with a
//! negotiated fallback to the older HTTP+SSE transport. Three operations sit
//! on top of the connector: a per-server tool catalog, a one-shot tool
//! invoker, and the per-session aggregator that merges several servers'
//! tools into a single namespace for a chat turn.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod connector;
pub mod error;
pub mod invoker;
pub mod protocol;
pub mod transport;

pub use aggregator::{
    load_tools_for_chat, AggregatedTool, AggregatedToolSet, LoadedChatTools, McpSessionCleanup,
    ToolSummary,
};
pub use catalog::{list_server_tools, McpToolDescriptor};
pub use config::McpServerConfig;
pub use connector::{connect, McpClientConnection};
pub use error::McpTransportError;
pub use invoker::{call_server_tool, ToolCallOutcome};
pub use transport::McpTransportKind;
