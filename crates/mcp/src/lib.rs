//! JSON-RPC 2.0 client for a browser-automation host.
//!
//! The host exposes named tools (navigate, read page content, issue
//! network requests) and is reachable either as a spawned child process
//! speaking newline-delimited JSON on its stdio, or as a streamable-HTTP
//! endpoint. This crate covers the protocol client: the message model,
//! both transports behind one [`transport::Transport`] trait, request
//! correlation, the initialize handshake, and typed tool wrappers.

pub mod client;
pub mod message;
pub mod tools;
pub mod transport;

pub use client::Client;
pub use message::{JsonRpcMessage, ListToolsResponse, RpcError, Tool, ToolMeta, ToolResult};
pub use tools::NetworkRequestOptions;
pub use transport::{HttpTransport, StdioTransport, Transport, SESSION_HEADER};
