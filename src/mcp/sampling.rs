//! Server-initiated sampling calls into the client's language model.
//!
//! MCP lets a server turn the connection around: `sampling/createMessage`
//! is a request the *server* sends and the *client* answers. The
//! [`ClientHandle`] owns that reversed direction. It allocates correlation
//! IDs from the server's own ID space, parks a oneshot sender per in-flight
//! call, and the engine routes inbound responses back by ID.
//!
//! Sampling is strictly best-effort: when the client never declared the
//! `sampling` capability, [`ClientHandle::create_message`] resolves to
//! `Ok(None)` without touching the wire, so callers degrade gracefully
//! instead of erroring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::mcp::protocol::OutgoingRequest;

/// Failure modes of a sampling round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// The connection closed before the client answered.
    #[error("connection closed before the sampling response arrived")]
    ConnectionClosed,

    /// The client answered with a JSON-RPC error.
    #[error("sampling request rejected by client: {message} (code {code})")]
    Rejected {
        /// JSON-RPC error code from the client.
        code: i64,
        /// Error message from the client.
        message: String,
    },

    /// The client's reply did not match the expected shape.
    #[error("malformed sampling response: {0}")]
    Malformed(String),
}

/// The speaker of a sampling message.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingRole {
    /// Content authored on the user side.
    User,
    /// Content authored by a model.
    Assistant,
}

/// Text content within a sampling message.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingContent {
    /// Always "text".
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// MIME type hint for the text body.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'static str>,
    /// The text body.
    pub text: String,
}

/// One conversation message handed to the client's model.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingMessage {
    /// Who speaks this message.
    pub role: SamplingRole,
    /// The message content.
    pub content: SamplingContent,
}

impl SamplingMessage {
    /// A user-role text message.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: SamplingRole::User,
            content: SamplingContent {
                kind: "text",
                mime_type: None,
                text: text.into(),
            },
        }
    }

    /// A user-role message carrying JSON text.
    #[must_use]
    pub fn user_json(text: impl Into<String>) -> Self {
        Self {
            role: SamplingRole::User,
            content: SamplingContent {
                kind: "text",
                mime_type: Some("application/json"),
                text: text.into(),
            },
        }
    }
}

/// Parameters of a `sampling/createMessage` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    /// System prompt framing the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Conversation messages.
    pub messages: Vec<SamplingMessage>,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Content block in the client's sampling response.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplingResultContent {
    /// Content type reported by the client.
    #[serde(rename = "type")]
    pub kind: String,

    /// Text body, present for text content.
    #[serde(default)]
    pub text: Option<String>,
}

/// The client's answer to a sampling call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingResult {
    /// The model that generated the completion.
    pub model: String,

    /// Why generation stopped, if reported.
    #[serde(default)]
    pub stop_reason: Option<String>,

    /// The generated content.
    pub content: SamplingResultContent,
}

impl SamplingResult {
    /// Returns the generated text, if the content block is text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if self.kind_is_text() {
            self.content.text.as_deref()
        } else {
            None
        }
    }

    fn kind_is_text(&self) -> bool {
        self.content.kind == "text"
    }
}

type PendingMap = HashMap<i64, oneshot::Sender<Result<Value, SamplingError>>>;

/// Handle for calling back into the connected client.
///
/// Cheap to clone; all clones share the pending-call table and ID counter.
/// Handlers hold one via [`AgentContext`](crate::mcp::registry::AgentContext),
/// the engine holds another to route responses.
#[derive(Clone)]
pub struct ClientHandle {
    outbound: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: Arc<AtomicI64>,
    sampling_supported: Arc<AtomicBool>,
}

impl ClientHandle {
    /// Creates a handle writing to the given outbound message channel.
    ///
    /// Sampling starts disabled; the engine flips it on during `initialize`
    /// if the client declares the capability.
    #[must_use]
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            sampling_supported: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Records whether the client declared the `sampling` capability.
    pub fn set_sampling_supported(&self, supported: bool) {
        self.sampling_supported.store(supported, Ordering::Relaxed);
    }

    /// Returns whether the client declared the `sampling` capability.
    #[must_use]
    pub fn sampling_supported(&self) -> bool {
        self.sampling_supported.load(Ordering::Relaxed)
    }

    /// Sends a sampling request and awaits the client's answer.
    ///
    /// Resolves to `Ok(None)` without sending anything when the client does
    /// not support sampling.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ConnectionClosed`] if the connection went
    /// away, [`SamplingError::Rejected`] if the client declined, or
    /// [`SamplingError::Malformed`] if the reply did not parse.
    pub async fn create_message(
        &self,
        request: SamplingRequest,
    ) -> Result<Option<SamplingResult>, SamplingError> {
        if !self.sampling_supported() {
            tracing::debug!("client lacks sampling capability, skipping createMessage");
            return Ok(None);
        }

        let params = serde_json::to_value(&request)
            .map_err(|e| SamplingError::Malformed(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.insert(id, tx);
        }

        let outgoing = OutgoingRequest::new(id, "sampling/createMessage", params);
        let line = serde_json::to_string(&outgoing)
            .map_err(|e| SamplingError::Malformed(e.to_string()))?;

        if self.outbound.send(line).is_err() {
            self.take_pending(id);
            return Err(SamplingError::ConnectionClosed);
        }

        tracing::debug!(id, "sampling/createMessage sent");

        let reply = rx.await.map_err(|_| SamplingError::ConnectionClosed)??;

        let result: SamplingResult = serde_json::from_value(reply)
            .map_err(|e| SamplingError::Malformed(e.to_string()))?;
        Ok(Some(result))
    }

    /// Routes an inbound response to the call that is waiting for it.
    ///
    /// Returns false when no call with this ID is pending (late or bogus
    /// reply; the engine logs and drops it).
    pub fn resolve(&self, id: i64, outcome: Result<Value, SamplingError>) -> bool {
        match self.take_pending(id) {
            Some(tx) => {
                // The caller may have been dropped; nothing to do then.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Fails every in-flight call with `ConnectionClosed`.
    ///
    /// Called once during shutdown so no handler awaits forever.
    pub fn fail_pending(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            pending.drain().collect()
        };
        for (id, tx) in drained {
            tracing::debug!(id, "failing in-flight sampling call on shutdown");
            let _ = tx.send(Err(SamplingError::ConnectionClosed));
        }
    }

    fn take_pending(&self, id: i64) -> Option<oneshot::Sender<Result<Value, SamplingError>>> {
        let mut pending = self.pending.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.remove(&id)
    }
}
