//! Shared test harness: an in-memory transport and a scripted MCP client.

// Each integration test binary uses a different subset of the harness.
#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use journal_mcp::journal;
use journal_mcp::mcp::server::McpServer;
use journal_mcp::mcp::transport::Transport;
use journal_mcp::mcp::ServerRegistry;
use journal_mcp::store::JournalStore;

/// A duplex in-memory transport backed by channels.
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

impl Transport for ChannelTransport {
    async fn recv(&mut self) -> io::Result<Option<String>> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &str) -> io::Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| io::Error::other("test client closed"))
    }
}

/// Drives a server instance from the client's side of the wire.
pub struct TestClient {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
    /// Shared handle to the server's store, for direct assertions.
    pub store: Arc<JournalStore>,
    /// Notifications received while waiting for responses.
    pub notifications: Vec<Value>,
    next_id: i64,
}

impl TestClient {
    /// Starts a server with the full journal registry.
    pub fn start() -> Self {
        Self::start_with(journal::build_registry().unwrap())
    }

    /// Starts a server with a caller-supplied registry.
    pub fn start_with(registry: ServerRegistry) -> Self {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let store = Arc::new(JournalStore::open_in_memory().unwrap());

        let transport = ChannelTransport {
            rx: server_rx,
            tx: server_tx,
        };
        let mut server = McpServer::new(transport, registry, Arc::clone(&store));
        tokio::spawn(async move { server.run().await });

        Self {
            to_server: client_tx,
            from_server: client_rx,
            store,
            notifications: Vec::new(),
            next_id: 0,
        }
    }

    /// Sends a raw message line to the server.
    pub fn send_raw(&self, line: impl Into<String>) {
        self.to_server.send(line.into()).unwrap();
    }

    /// Receives the next message of any kind.
    pub async fn recv(&mut self) -> Value {
        let line = self
            .from_server
            .recv()
            .await
            .expect("server closed the connection");
        serde_json::from_str(&line).expect("server sent invalid JSON")
    }

    /// Receives until a response with the given ID arrives, stashing
    /// notifications and server-initiated requests seen along the way.
    pub async fn recv_response(&mut self, id: i64) -> Value {
        loop {
            let msg = self.recv().await;
            if msg.get("id") == Some(&json!(id))
                && (msg.get("result").is_some() || msg.get("error").is_some())
            {
                return msg;
            }
            self.notifications.push(msg);
        }
    }

    /// Sends a request and awaits its correlated response.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        self.send_raw(
            json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string(),
        );
        self.recv_response(id).await
    }

    /// Sends a notification (no response expected).
    pub fn notify(&self, method: &str) {
        self.send_raw(json!({"jsonrpc": "2.0", "method": method}).to_string());
    }

    /// Performs the initialize handshake, declaring the given client
    /// capabilities, and returns the server's initialize result.
    pub async fn initialize(&mut self, capabilities: Value) -> Value {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": capabilities,
                    "clientInfo": {"name": "test-client", "version": "0.0.0"}
                }),
            )
            .await;
        assert!(response.get("error").is_none(), "initialize failed: {response}");
        self.notify("notifications/initialized");
        response["result"].clone()
    }

    /// Handshake without the sampling capability.
    pub async fn initialize_basic(&mut self) -> Value {
        self.initialize(json!({})).await
    }

    /// Handshake with the sampling capability declared.
    pub async fn initialize_with_sampling(&mut self) -> Value {
        self.initialize(json!({"sampling": {}})).await
    }

    /// Calls a tool and returns the tool result value.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        assert!(
            response.get("error").is_none(),
            "tools/call {name} failed at the protocol level: {response}"
        );
        response["result"].clone()
    }

    /// Extracts the first text content item from a tool result.
    pub fn first_text(result: &Value) -> &str {
        result["content"][0]["text"]
            .as_str()
            .expect("first content item should be text")
    }
}
