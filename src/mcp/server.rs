//! MCP protocol engine for the journal server.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Routing requests to the registered tools, resources,
//!    and prompts
//! 3. **Shutdown**: Graceful connection termination, failing any in-flight
//!    sampling calls
//!
//! # Architecture
//!
//! The engine owns the transport and processes inbound messages in arrival
//! order, with one exception: tool calls run as spawned tasks so a handler
//! suspended on a sampling round-trip never blocks the loop. Spawned tasks
//! and the sampling subsystem queue their outbound messages through a
//! single channel drained by the loop, so every wire message stays atomic.
//!
//! Requests other than `tools/call` are served inline. Reads are quick
//! store lookups; serialising them costs nothing and keeps mutation-style
//! calls ordered. Concurrent tool calls racing on the same row are a
//! documented limitation, not something the engine arbitrates.

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcIncomingResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    OutgoingNotification, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::registry::{AgentContext, ServerRegistry, ToolResult};
use crate::mcp::sampling::{ClientHandle, SamplingError};
use crate::mcp::transport::Transport;
use crate::store::{ChangeSet, JournalStore, SubscriptionId};

/// Maximum completion candidates returned per `completion/complete` call.
const MAX_COMPLETION_VALUES: usize = 100;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// A capability group that can signal list changes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListChangedCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

/// An empty capability object (completions has no sub-flags).
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmptyCapability {}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server capabilities advertised during initialisation.
///
/// Only groups with at least one registered descriptor are declared;
/// advertising an empty group and then failing its calls would break the
/// protocol contract.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    /// Resource-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ListChangedCapability>,
    /// Prompt-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Argument completion support.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<EmptyCapability>,
}

impl ServerCapabilities {
    /// Derives the advertised capabilities from what is registered.
    #[must_use]
    pub fn from_registry(registry: &ServerRegistry) -> Self {
        Self {
            tools: (!registry.tools.is_empty()).then(ListChangedCapability::default),
            resources: (!registry.resources.is_empty()).then(|| ListChangedCapability {
                list_changed: registry.resources.has_listable(),
            }),
            prompts: (!registry.prompts.is_empty()).then(ListChangedCapability::default),
            completions: (registry.resources.has_completions()
                || registry.prompts.has_completions())
            .then(EmptyCapability::default),
        }
    }
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Parameters for resources/read request.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    /// The URI to read.
    pub uri: String,
}

/// Parameters for prompts/get request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    /// Name of the prompt.
    pub name: String,
    /// Arguments for the prompt.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// The reference half of a completion/complete request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum CompleteRef {
    /// Completing a resource template parameter. `uri` holds the template
    /// pattern, not a concrete URI.
    #[serde(rename = "ref/resource")]
    Resource {
        /// The template pattern.
        uri: String,
    },
    /// Completing a prompt argument.
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// The prompt name.
        name: String,
    },
}

/// The argument half of a completion/complete request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteArgument {
    /// The parameter or argument name being completed.
    pub name: String,
    /// The partial value typed so far.
    pub value: String,
}

/// Parameters for completion/complete request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteParams {
    /// What is being completed.
    #[serde(rename = "ref")]
    pub reference: CompleteRef,
    /// The partial argument.
    pub argument: CompleteArgument,
}

/// The MCP server for the journal.
pub struct McpServer<T: Transport> {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: T,
    /// The capability registries.
    registry: Arc<ServerRegistry>,
    /// Context handed to every handler.
    ctx: AgentContext,
    /// Sender side of the outbound queue, cloned into spawned tasks.
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Outbound messages queued by spawned tasks and the sampling subsystem.
    outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Store mutations forwarded from the change listener.
    changes_rx: mpsc::UnboundedReceiver<ChangeSet>,
    /// The store subscription backing `changes_rx`.
    subscription: SubscriptionId,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
}

impl<T: Transport> McpServer<T> {
    /// Creates a new MCP server over the given transport.
    #[must_use]
    pub fn new(transport: T, registry: ServerRegistry, store: Arc<JournalStore>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();

        // Listener runs synchronously inside store mutations; it only
        // forwards into the channel, the loop does the actual emission.
        let subscription = store.subscribe(move |changes: &ChangeSet| {
            let _ = changes_tx.send(changes.clone());
        });

        let client = ClientHandle::new(outbound_tx.clone());
        let ctx = AgentContext {
            store,
            client,
        };

        Self {
            state: ServerState::AwaitingInit,
            transport,
            registry: Arc::new(registry),
            ctx,
            outbound_tx,
            outbound_rx,
            changes_rx,
            subscription,
            protocol_version: None,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let result = self.run_with_shutdown().await;
        self.shutdown();
        result
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    return Ok(());
                }

                line_result = self.transport.recv() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }

                Some(line) = self.outbound_rx.recv() => {
                    self.transport.send(&line).await?;
                }

                Some(changes) = self.changes_rx.recv() => {
                    self.handle_store_changes(&changes).await;
                }
            }
        }
    }

    /// Runs the main loop and handles shutdown.
    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                    return Ok(());
                }

                line_result = self.transport.recv() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }

                Some(line) = self.outbound_rx.recv() => {
                    self.transport.send(&line).await?;
                }

                Some(changes) = self.changes_rx.recv() => {
                    self.handle_store_changes(&changes).await;
                }
            }
        }
    }

    /// Tears down the connection: fails in-flight sampling calls and drops
    /// the store subscription.
    fn shutdown(&mut self) {
        self.state = ServerState::ShuttingDown;
        self.ctx.client.fail_pending();
        self.ctx.store.unsubscribe(self.subscription);
    }

    /// Handles the result from transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: io::Result<Option<String>>,
    ) -> io::Result<bool> {
        let Some(line) = line_result? else {
            // EOF - client disconnected
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        match parse_message(line) {
            Ok(msg) => self.handle_message(msg).await,
            Err(error) => self.send_error(&error).await,
        }
    }

    /// Handles a parsed incoming message.
    async fn handle_message(&mut self, msg: IncomingMessage) -> io::Result<()> {
        match msg {
            IncomingMessage::Request(req) => self.handle_request(req).await,
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                Ok(())
            }
            IncomingMessage::Response(resp) => {
                self.handle_client_response(resp);
                Ok(())
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> io::Result<()> {
        if let Err(error) = self.check_capability(&req) {
            return self.send_error(&error).await;
        }

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            "tools/list" => self.handle_tools_list(&req),
            // Spawns; the response goes through the outbound queue.
            "tools/call" => return self.handle_tools_call(&req).await,
            "resources/list" => self.handle_resources_list(&req).await,
            "resources/templates/list" => self.handle_templates_list(&req),
            "resources/read" => self.handle_resources_read(&req).await,
            "completion/complete" => self.handle_complete(&req).await,
            "prompts/list" => self.handle_prompts_list(&req),
            "prompts/get" => self.handle_prompts_get(&req).await,
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => self.send_response(&resp).await,
            Err(error) => self.send_error(&error).await,
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            self.state = ServerState::Running;
            tracing::info!("Client initialised, server running");
        } else {
            tracing::debug!(method = %notif.method, "Ignoring notification");
        }
    }

    /// Routes a client's reply to the sampling call awaiting it.
    fn handle_client_response(&self, resp: JsonRpcIncomingResponse) {
        let RequestId::Number(id) = resp.id else {
            tracing::warn!(id = %resp.id, "Client response with non-numeric ID, dropping");
            return;
        };

        let outcome = if let Some(error) = resp.error {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error")
                .to_string();
            Err(SamplingError::Rejected { code, message })
        } else {
            Ok(resp.result.unwrap_or(Value::Null))
        };

        if !self.ctx.client.resolve(id, outcome) {
            tracing::warn!(id, "Client response matches no pending request, dropping");
        }
    }

    /// Rejects methods belonging to capability groups this server did not
    /// declare, before any dispatch happens.
    fn check_capability(&self, req: &JsonRpcRequest) -> Result<(), JsonRpcError> {
        let missing = match req.method.split('/').next().unwrap_or("") {
            "tools" => self.registry.tools.is_empty().then_some("tools"),
            "resources" => self.registry.resources.is_empty().then_some("resources"),
            "prompts" => self.registry.prompts.is_empty().then_some("prompts"),
            "completion" => (!self.registry.resources.has_completions()
                && !self.registry.prompts.has_completions())
            .then_some("completions"),
            _ => None,
        };

        match missing {
            Some(capability) => Err(JsonRpcError::capability_not_supported(
                req.id.clone(),
                capability,
            )),
            None => Ok(()),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = parse_params(req)?;

        if let Some(info) = &params.client_info {
            tracing::info!(
                client = %info.name,
                version = info.version.as_deref().unwrap_or("unknown"),
                "Initialize received"
            );
        }

        let sampling = params
            .capabilities
            .get("sampling")
            .is_some_and(|v| !v.is_null());
        self.ctx.client.set_sampling_supported(sampling);
        tracing::debug!(sampling, "Client capabilities recorded");

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::from_registry(&self.registry),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let tools: Vec<Value> = self
            .registry
            .tools
            .iter()
            .map(|tool| {
                let mut def = Map::new();
                def.insert("name".to_string(), json!(tool.name));
                if let Some(title) = &tool.title {
                    def.insert("title".to_string(), json!(title));
                }
                def.insert("description".to_string(), json!(tool.description));
                def.insert("inputSchema".to_string(), tool.input_schema.to_json_schema());
                Value::Object(def)
            })
            .collect();

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools }),
        ))
    }

    /// Handles the tools/call request.
    ///
    /// Argument validation happens inline so schema violations surface as
    /// protocol errors; the handler itself runs as a spawned task so a
    /// sampling suspension never blocks the loop. The task is the single
    /// place that converts handler failures into `isError` results.
    async fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> io::Result<()> {
        if let Err(error) = self.require_running(&req.id) {
            return self.send_error(&error).await;
        }

        let params: ToolCallParams = match parse_params(req) {
            Ok(params) => params,
            Err(error) => return self.send_error(&error).await,
        };

        let Some(tool) = self.registry.tools.get(&params.name) else {
            // Tool-level error, not a protocol error: the LLM can react to
            // it and retry with a different tool name.
            let result = ToolResult::error(format!("Unknown tool: {}", params.name));
            let response = tool_result_response(req.id.clone(), &result);
            return self.send_response(&response).await;
        };

        let args = match tool.input_schema.validate(params.arguments.as_ref()) {
            Ok(args) => args,
            Err(validation) => {
                let error = JsonRpcError::invalid_params(req.id.clone(), validation.to_string());
                return self.send_error(&error).await;
            }
        };

        let registry = Arc::clone(&self.registry);
        let ctx = self.ctx.clone();
        let outbound = self.outbound_tx.clone();
        let name = params.name;
        let id = req.id.clone();

        tokio::spawn(async move {
            // Registered tools are never removed, so the lookup cannot fail;
            // re-resolving by name keeps the task 'static.
            let Some(tool) = registry.tools.get(&name) else {
                return;
            };

            let result = match tool.invoke(ctx, args).await {
                Ok(result) => result,
                Err(error) => {
                    tracing::debug!(tool = %name, error = %error, "Tool handler failed");
                    ToolResult::error(error.to_string())
                }
            };

            let response = tool_result_response(id, &result);
            match serde_json::to_string(&response) {
                Ok(line) => {
                    // Send failure means the loop is gone; nothing to do.
                    let _ = outbound.send(line);
                }
                Err(error) => {
                    tracing::error!(tool = %name, error = %error, "Failed to serialise tool response");
                }
            }
        });

        Ok(())
    }

    /// Handles the resources/list request.
    async fn handle_resources_list(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let listings = self
            .registry
            .resources
            .listings(&self.ctx)
            .await
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": listings }),
        ))
    }

    /// Handles the resources/templates/list request.
    fn handle_templates_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let templates: Vec<Value> = self
            .registry
            .resources
            .templates()
            .map(|template| {
                let mut def = Map::new();
                def.insert(
                    "uriTemplate".to_string(),
                    json!(template.uri_template.as_str()),
                );
                def.insert("name".to_string(), json!(template.name));
                if let Some(title) = &template.title {
                    def.insert("title".to_string(), json!(title));
                }
                if let Some(description) = &template.description {
                    def.insert("description".to_string(), json!(description));
                }
                def.insert("mimeType".to_string(), json!(template.mime_type));
                Value::Object(def)
            })
            .collect();

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resourceTemplates": templates }),
        ))
    }

    /// Handles the resources/read request.
    async fn handle_resources_read(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ResourceReadParams = parse_params(req)?;

        let Some(resolved) = self.registry.resources.resolve(&params.uri) else {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::ServerError(-32002),
                    format!("Resource not found: {}", params.uri),
                ),
            ));
        };

        let contents = self
            .registry
            .resources
            .read(self.ctx.clone(), resolved, &params.uri)
            .await
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        let result = serde_json::to_value(&contents)
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the completion/complete request.
    ///
    /// A missing completion callback yields an empty candidate list;
    /// only a malformed ref (unknown template or prompt) is an error.
    async fn handle_complete(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: CompleteParams = parse_params(req)?;

        let callback = match &params.reference {
            CompleteRef::Resource { uri } => {
                let template = self.registry.resources.find_template(uri).ok_or_else(|| {
                    JsonRpcError::invalid_params(
                        req.id.clone(),
                        format!("Unknown resource template: {uri}"),
                    )
                })?;
                template.completion(&params.argument.name)
            }
            CompleteRef::Prompt { name } => {
                let prompt = self.registry.prompts.get(name).ok_or_else(|| {
                    JsonRpcError::invalid_params(
                        req.id.clone(),
                        format!("Unknown prompt: {name}"),
                    )
                })?;
                prompt.completion(&params.argument.name)
            }
        };

        let mut values = match callback {
            Some(complete) => complete(self.ctx.clone(), params.argument.value)
                .await
                .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?,
            None => Vec::new(),
        };
        let total = values.len();
        values.truncate(MAX_COMPLETION_VALUES);

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "completion": {
                    "values": values,
                    "total": total,
                    "hasMore": total > MAX_COMPLETION_VALUES,
                }
            }),
        ))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let prompts: Vec<Value> = self
            .registry
            .prompts
            .iter()
            .map(|prompt| {
                let arguments: Vec<Value> = prompt
                    .args_schema
                    .iter()
                    .map(|(name, field)| {
                        let mut arg = Map::new();
                        arg.insert("name".to_string(), json!(name));
                        if let Some(description) = field.description() {
                            arg.insert("description".to_string(), json!(description));
                        }
                        arg.insert("required".to_string(), json!(field.is_required()));
                        Value::Object(arg)
                    })
                    .collect();

                let mut def = Map::new();
                def.insert("name".to_string(), json!(prompt.name));
                if let Some(title) = &prompt.title {
                    def.insert("title".to_string(), json!(title));
                }
                def.insert("description".to_string(), json!(prompt.description));
                def.insert("arguments".to_string(), json!(arguments));
                Value::Object(def)
            })
            .collect();

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "prompts": prompts }),
        ))
    }

    /// Handles the prompts/get request.
    async fn handle_prompts_get(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: PromptGetParams = parse_params(req)?;

        let Some(prompt) = self.registry.prompts.get(&params.name) else {
            return Err(JsonRpcError::invalid_params(
                req.id.clone(),
                format!("Unknown prompt: {}", params.name),
            ));
        };

        let args = prompt
            .args_schema
            .validate(params.arguments.as_ref())
            .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), e.to_string()))?;

        let result = prompt
            .invoke(self.ctx.clone(), args)
            .await
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        let value = serde_json::to_value(&result)
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;

        Ok(JsonRpcResponse::success(req.id.clone(), value))
    }

    /// Emits a `resources/list_changed` notification for a store mutation.
    ///
    /// Fire-and-forget: delivery failure is logged, never retried.
    async fn handle_store_changes(&mut self, changes: &ChangeSet) {
        if self.state != ServerState::Running {
            return;
        }
        if !self.registry.resources.has_listable() {
            return;
        }
        if changes.entries.is_empty() && changes.tags.is_empty() {
            return;
        }

        let notification = OutgoingNotification::resources_list_changed();
        match serde_json::to_string(&notification) {
            Ok(line) => {
                if let Err(error) = self.transport.send(&line).await {
                    tracing::warn!(error = %error, "Failed to deliver list_changed notification");
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to serialise list_changed notification");
            }
        }
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }

    async fn send_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(io::Error::other)?;
        self.transport.send(&json).await
    }

    async fn send_error(&mut self, error: &JsonRpcError) -> io::Result<()> {
        let json = serde_json::to_string(error).map_err(io::Error::other)?;
        self.transport.send(&json).await
    }
}

/// Deserialises request params, mapping absence and malformation to
/// invalid-params errors.
fn parse_params<P: serde::de::DeserializeOwned>(req: &JsonRpcRequest) -> Result<P, JsonRpcError> {
    req.params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), format!("Invalid params: {e}")))?
        .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing params"))
}

/// Wraps a tool result into a success response envelope.
fn tool_result_response(id: RequestId, result: &ToolResult) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        // Serialising ToolResult cannot realistically fail; fall back to a
        // minimal error result rather than dropping the response.
        Err(error) => {
            tracing::error!(error = %error, "Failed to serialise tool result");
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [{"type": "text", "text": "Internal error: failed to serialise result"}],
                    "isError": true,
                }),
            )
        }
    }
}
