//! Bruno MCP Server
//!
//! Exposes Bruno workspaces and collections to AI assistants via the Model
//! Context Protocol (MCP). Implements MCP over stdio using JSON-RPC 2.0.

pub mod codec;
pub mod dispatch;
pub mod framing;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use server::Server;
