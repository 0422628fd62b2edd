//! Ponton is the routing core of a chat front-end: it resolves which LLM
//! backend a conversation should reach and bridges in tools exposed by
//! remote Model Context Protocol servers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns provider/credential resolution, the model handle handed
//!   to a streaming layer, and process-wide HTTP client construction.
//! - [`mcp`] provides Model Context Protocol integration: transport
//!   negotiation with fallback, tool catalogs, one-shot invocation, and
//!   per-session tool aggregation.
//! - [`utils`] holds URL and authentication-header helpers shared by both.
//!
//! Rendering, conversation history, and provider streaming schemas live in
//! the consuming application; they call in through [`core::model`] and the
//! operations in [`mcp`].

pub mod core;
pub mod mcp;
pub mod utils;
