//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing the journal's
//! tools, resources, and prompts to AI assistants. The server communicates
//! over stdio transport using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         MCP Server                           │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────┐    │
//! │   │  Transport  │───▶│   Engine    │───▶│  Registries  │    │
//! │   │   (stdio)   │    │  (lifecycle)│    │ (tools, res, │    │
//! │   └─────────────┘    └─────────────┘    │   prompts)   │    │
//! │          ▲                  │           └──────────────┘    │
//! │          │                  ▼                                │
//! │   ┌─────────────┐    ┌─────────────┐                        │
//! │   │  Sampling   │◀───│  Handlers   │                        │
//! │   │ (callbacks) │    │             │                        │
//! │   └─────────────┘    └─────────────┘                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unusually for a request/response server, messages flow both ways:
//! handlers can call back into the client's language model through the
//! sampling subsystem, and store mutations fan out as list-changed
//! notifications.
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2025-03-26.

pub mod protocol;
pub mod registry;
pub mod sampling;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::{
    AgentContext, ContentItem, HandlerError, PromptDescriptor, PromptMessage, PromptResult,
    ResourceContents, ResourceListing, ResourceTemplate, ServerRegistry, StaticResource,
    ToolDescriptor, ToolResult,
};
pub use sampling::{ClientHandle, SamplingError, SamplingRequest, SamplingResult};
pub use server::McpServer;
pub use transport::{StdioTransport, Transport};
