//! journal-mcp: MCP server exposing a personal journal to AI assistants
//!
//! This library implements a Model Context Protocol server over a local
//! SQLite journal. The assistant gets the mechanics — CRUD tools, URI
//! resources, prompts — and supplies the intelligence: what to write, how
//! to tag it, which entries matter.
//!
//! # Architecture
//!
//! Three layers:
//!
//! - **Protocol** ([`mcp`]): JSON-RPC framing, the capability registries,
//!   the request router, and the sampling subsystem for server-to-client
//!   model calls
//! - **Domain** ([`journal`]): the tools, resources, and prompts registered
//!   against the protocol layer
//! - **Storage** ([`store`]): the SQLite-backed journal with change
//!   propagation
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`journal`] — The journal capability surface
//! - [`mcp`] — MCP protocol implementation
//! - [`schema`] — Argument schemas: validation and JSON Schema serialisation
//! - [`store`] — The journal data store

pub mod config;
pub mod error;
pub mod journal;
pub mod mcp;
pub mod schema;
pub mod store;
