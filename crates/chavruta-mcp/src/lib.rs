#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! MCP transport: JSON-RPC dispatch and SSE session channels
//!
//! Two independent MCP servers share the process; each owns a tool
//! registry and a session registry, and mounts three routes under its
//! prefix: a JSON-RPC request/response endpoint, a long-lived SSE
//! stream, and the sidecar POST endpoint that feeds client messages
//! into a named session.

pub mod protocol;
pub mod router;
pub mod server;
pub mod session;

pub use router::{McpEndpoint, mcp_router};
pub use server::McpServer;
pub use session::SessionRegistry;
