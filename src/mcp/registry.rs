//! Capability registries: tools, resources, and prompts.
//!
//! The server holds three independent registries. Each binds names to
//! handlers plus the metadata advertised through the corresponding `list`
//! method. Handlers receive an [`AgentContext`] (store + client handle)
//! rather than reaching for shared globals, so several isolated server
//! instances can coexist in one process.
//!
//! Resource URIs resolve in two steps: exact static match first, then each
//! template in registration order. Template patterns use `{param}` path
//! segments matched positionally against `/`-delimited segments. No
//! conflict detection is attempted for overlapping templates; registration
//! order is the documented tie-break.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::StoreError;
use crate::mcp::sampling::{ClientHandle, SamplingError};
use crate::schema::ObjectSchema;
use crate::store::JournalStore;

/// Shared context handed to every handler at invocation time.
#[derive(Clone)]
pub struct AgentContext {
    /// The journal store.
    pub store: Arc<JournalStore>,
    /// Handle for server-to-client calls (sampling).
    pub client: ClientHandle,
}

/// A business-level handler failure.
///
/// Handlers return these instead of panicking; the router converts them
/// into `isError: true` tool results (or protocol errors for resource and
/// prompt handlers) in exactly one place.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A domain invariant was violated (entity not found, bad state).
    #[error("{0}")]
    Message(String),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A sampling round-trip failed.
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// JSON (de)serialisation failed.
    #[error("serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HandlerError {
    /// Creates a message-only handler error.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Boxed future returned by handlers.
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T, HandlerError>> + Send>>;

type ToolHandlerFn = dyn Fn(AgentContext, Map<String, Value>) -> HandlerFuture<ToolResult> + Send + Sync;
type ResourceHandlerFn = dyn Fn(AgentContext, ResourceRequest) -> HandlerFuture<ResourceContents> + Send + Sync;
type ListHandlerFn = dyn Fn(AgentContext) -> HandlerFuture<Vec<ResourceListing>> + Send + Sync;
type CompleteHandlerFn = dyn Fn(AgentContext, String) -> HandlerFuture<Vec<String>> + Send + Sync;
type PromptHandlerFn = dyn Fn(AgentContext, Map<String, Value>) -> HandlerFuture<PromptResult> + Send + Sync;

/// Errors raised during descriptor registration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A descriptor with the same name or URI already exists.
    #[error("duplicate {kind} registration: {name}")]
    DuplicateName {
        /// Descriptor kind ("tool", "resource", "prompt").
        kind: &'static str,
        /// The conflicting name or URI.
        name: String,
    },

    /// A URI template could not be parsed.
    #[error("invalid URI template: {template}: {reason}")]
    InvalidTemplate {
        /// The offending pattern.
        template: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

// =============================================================================
// Content and result types
// =============================================================================

/// One item of content in a tool result or prompt message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A resource embedded inline, saving the client a follow-up read.
    Resource {
        /// The embedded data.
        resource: EmbeddedResource,
    },
    /// A lightweight pointer to a resource; the client reads it on demand.
    #[serde(rename_all = "camelCase")]
    ResourceLink {
        /// URI of the resource.
        uri: String,
        /// Display name.
        name: String,
        /// Optional description.
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// MIME type of the resource contents.
        mime_type: String,
    },
}

impl ContentItem {
    /// Plain text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text content holding a pretty-printed JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(Self::Text {
            text: serde_json::to_string_pretty(value)?,
        })
    }
}

/// Full resource data inlined into a content item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    /// URI of the resource.
    pub uri: String,
    /// MIME type of `text`.
    pub mime_type: String,
    /// The resource body.
    pub text: String,
}

/// Result of a tool call.
///
/// `is_error: true` signals an application-level failure surfaced to the
/// model as data, never a transport fault.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Content returned by the tool.
    pub content: Vec<ContentItem>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolResult {
    /// Creates a successful result from content items.
    #[must_use]
    pub fn new(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Creates a successful single-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentItem::text(text)])
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(message)],
            is_error: true,
        }
    }
}

/// Contents returned from reading a resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceContents {
    /// One or more content blocks.
    pub contents: Vec<ResourceContent>,
}

impl ResourceContents {
    /// A single-block resource body.
    #[must_use]
    pub fn single(uri: impl Into<String>, mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            contents: vec![ResourceContent {
                uri: uri.into(),
                mime_type: mime_type.into(),
                text: text.into(),
            }],
        }
    }
}

/// One block of resource data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// URI the block belongs to.
    pub uri: String,
    /// MIME type of `text`.
    pub mime_type: String,
    /// The block body.
    pub text: String,
}

/// Metadata describing one listable resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    /// Concrete URI of the resource.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource contents.
    pub mime_type: String,
}

/// The speaker of a prompt message.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user side of the conversation.
    User,
    /// The assistant side of the conversation.
    Assistant,
}

/// One message within a prompt result.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    /// Who speaks this message.
    pub role: Role,
    /// The message content.
    pub content: ContentItem,
}

impl PromptMessage {
    /// A user-role message.
    #[must_use]
    pub fn user(content: ContentItem) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// Result of materialising a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptResult {
    /// Optional description of the prompt instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The messages to hand to the model.
    pub messages: Vec<PromptMessage>,
}

// =============================================================================
// Tools
// =============================================================================

/// A registered tool: metadata plus handler.
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Optional human-readable title.
    pub title: Option<String>,
    /// Description surfaced to the model.
    pub description: String,
    /// Argument schema, validated before the handler runs.
    pub input_schema: ObjectSchema,
    handler: Arc<ToolHandlerFn>,
}

impl ToolDescriptor {
    /// Creates a tool descriptor from an async handler.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ObjectSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(AgentContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            input_schema,
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Invokes the handler with already-validated arguments.
    pub fn invoke(&self, ctx: AgentContext, args: Map<String, Value>) -> HandlerFuture<ToolResult> {
        (self.handler)(ctx, args)
    }
}

/// Name-to-handler bindings for tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName {
                kind: "tool",
                name: descriptor.name,
            });
        }
        self.index
            .insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Iterates tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// =============================================================================
// Resources
// =============================================================================

/// A URI parsed into a request for a resource handler.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// The concrete URI being read.
    pub uri: String,
    /// Parameters extracted from the template match (empty for statics).
    pub params: HashMap<String, String>,
}

impl ResourceRequest {
    /// Returns a template parameter, or an error naming it.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] if the parameter is absent.
    pub fn param(&self, name: &str) -> Result<&str, HandlerError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| HandlerError::msg(format!("missing URI parameter \"{name}\"")))
    }
}

/// One segment of a URI template path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplateSegment {
    Literal(String),
    Param(String),
}

/// A parsed `scheme://seg/{param}/...` pattern.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<TemplateSegment>,
}

impl UriTemplate {
    /// Parses a template pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern has no scheme or malformed
    /// placeholders.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let invalid = |reason| RegistryError::InvalidTemplate {
            template: raw.to_string(),
            reason,
        };

        let (scheme, rest) = raw.split_once("://").ok_or(invalid("missing scheme"))?;
        if scheme.is_empty() {
            return Err(invalid("missing scheme"));
        }

        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if let Some(name) = segment.strip_prefix('{') {
                let name = name
                    .strip_suffix('}')
                    .ok_or(invalid("unterminated placeholder"))?;
                if name.is_empty() {
                    return Err(invalid("empty placeholder name"));
                }
                segments.push(TemplateSegment::Param(name.to_string()));
            } else if segment.contains('{') || segment.contains('}') {
                return Err(invalid("placeholder must span a whole segment"));
            } else {
                segments.push(TemplateSegment::Literal(segment.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    /// The original pattern string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the `{param}` placeholders, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            TemplateSegment::Param(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }

    /// Matches a concrete URI, extracting parameter values.
    ///
    /// Segments are compared positionally; every placeholder must match a
    /// non-empty segment.
    #[must_use]
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let rest = uri.strip_prefix(&self.scheme)?.strip_prefix("://")?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(segments) {
            match pattern {
                TemplateSegment::Literal(literal) => {
                    if literal != actual {
                        return None;
                    }
                }
                TemplateSegment::Param(name) => {
                    if actual.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), actual.to_string());
                }
            }
        }
        Some(params)
    }
}

/// A resource with one fixed URI.
pub struct StaticResource {
    /// Registry name.
    pub name: String,
    /// The exact URI.
    pub uri: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// MIME type of the contents.
    pub mime_type: String,
    handler: Arc<ResourceHandlerFn>,
}

impl StaticResource {
    /// Creates a static resource descriptor.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        uri: impl Into<String>,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(AgentContext, ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ResourceContents, HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            uri: uri.into(),
            title: None,
            description: None,
            mime_type: mime_type.into(),
            handler: Arc::new(move |ctx, request| Box::pin(handler(ctx, request))),
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A parameterised resource: URI pattern, optional enumeration, optional
/// per-parameter completion.
pub struct ResourceTemplate {
    /// Registry name.
    pub name: String,
    /// The URI pattern.
    pub uri_template: UriTemplate,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// MIME type of the contents.
    pub mime_type: String,
    list: Option<Arc<ListHandlerFn>>,
    complete: HashMap<String, Arc<CompleteHandlerFn>>,
    handler: Arc<ResourceHandlerFn>,
}

impl ResourceTemplate {
    /// Creates a template descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern does not parse.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        pattern: &str,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(AgentContext, ResourceRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ResourceContents, HandlerError>> + Send + 'static,
    {
        Ok(Self {
            name: name.into(),
            uri_template: UriTemplate::parse(pattern)?,
            title: None,
            description: None,
            mime_type: mime_type.into(),
            list: None,
            complete: HashMap::new(),
            handler: Arc::new(move |ctx, request| Box::pin(handler(ctx, request))),
        })
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches a list callback; the template's members then appear in
    /// `resources/list`. Templates without one stay readable but unlisted
    /// (the member set may be unbounded).
    #[must_use]
    pub fn with_list<F, Fut>(mut self, list: F) -> Self
    where
        F: Fn(AgentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<ResourceListing>, HandlerError>> + Send + 'static,
    {
        self.list = Some(Arc::new(move |ctx| Box::pin(list(ctx))));
        self
    }

    /// Attaches a completion callback for one template parameter.
    #[must_use]
    pub fn with_completion<F, Fut>(mut self, param: impl Into<String>, complete: F) -> Self
    where
        F: Fn(AgentContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<String>, HandlerError>> + Send + 'static,
    {
        self.complete.insert(
            param.into(),
            Arc::new(move |ctx, partial| Box::pin(complete(ctx, partial))),
        );
        self
    }

    /// Returns whether this template declares a list callback.
    #[must_use]
    pub fn is_listable(&self) -> bool {
        self.list.is_some()
    }

    /// Returns the completion callback for a parameter, if declared.
    #[must_use]
    pub fn completion(&self, param: &str) -> Option<&Arc<CompleteHandlerFn>> {
        self.complete.get(param)
    }

    /// Returns whether any completion callbacks are declared.
    #[must_use]
    pub fn has_completions(&self) -> bool {
        !self.complete.is_empty()
    }
}

/// A resolved resource lookup.
pub enum ResolvedResource<'a> {
    /// An exact static match.
    Static(&'a StaticResource),
    /// A template match with extracted parameters.
    Template(&'a ResourceTemplate, HashMap<String, String>),
}

/// Static resources and templates, resolved in registration order.
#[derive(Default)]
pub struct ResourceRegistry {
    statics: Vec<StaticResource>,
    templates: Vec<ResourceTemplate>,
}

impl ResourceRegistry {
    /// Registers a static resource.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the URI is taken.
    pub fn register_static(&mut self, resource: StaticResource) -> Result<(), RegistryError> {
        if self.statics.iter().any(|s| s.uri == resource.uri) {
            return Err(RegistryError::DuplicateName {
                kind: "resource",
                name: resource.uri,
            });
        }
        self.statics.push(resource);
        Ok(())
    }

    /// Registers a resource template.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the pattern is taken.
    pub fn register_template(&mut self, template: ResourceTemplate) -> Result<(), RegistryError> {
        if self
            .templates
            .iter()
            .any(|t| t.uri_template.as_str() == template.uri_template.as_str())
        {
            return Err(RegistryError::DuplicateName {
                kind: "resource template",
                name: template.uri_template.as_str().to_string(),
            });
        }
        self.templates.push(template);
        Ok(())
    }

    /// Resolves a concrete URI: exact static match first, then templates in
    /// registration order.
    #[must_use]
    pub fn resolve(&self, uri: &str) -> Option<ResolvedResource<'_>> {
        if let Some(resource) = self.statics.iter().find(|s| s.uri == uri) {
            return Some(ResolvedResource::Static(resource));
        }
        for template in &self.templates {
            if let Some(params) = template.uri_template.matches(uri) {
                return Some(ResolvedResource::Template(template, params));
            }
        }
        None
    }

    /// Reads a resolved resource.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn read(
        &self,
        ctx: AgentContext,
        resolved: ResolvedResource<'_>,
        uri: &str,
    ) -> Result<ResourceContents, HandlerError> {
        match resolved {
            ResolvedResource::Static(resource) => {
                (resource.handler)(
                    ctx,
                    ResourceRequest {
                        uri: uri.to_string(),
                        params: HashMap::new(),
                    },
                )
                .await
            }
            ResolvedResource::Template(template, params) => {
                (template.handler)(
                    ctx,
                    ResourceRequest {
                        uri: uri.to_string(),
                        params,
                    },
                )
                .await
            }
        }
    }

    /// Collects the full resource listing: every static resource plus the
    /// dynamic members of every listable template.
    ///
    /// # Errors
    ///
    /// Returns the first failing list callback's error.
    pub async fn listings(&self, ctx: &AgentContext) -> Result<Vec<ResourceListing>, HandlerError> {
        let mut listings: Vec<ResourceListing> = self
            .statics
            .iter()
            .map(|resource| ResourceListing {
                uri: resource.uri.clone(),
                name: resource.name.clone(),
                description: resource.description.clone(),
                mime_type: resource.mime_type.clone(),
            })
            .collect();

        for template in &self.templates {
            if let Some(list) = &template.list {
                listings.extend(list(ctx.clone()).await?);
            }
        }

        Ok(listings)
    }

    /// Finds a template by its pattern string (used by `completion/complete`
    /// refs).
    #[must_use]
    pub fn find_template(&self, pattern: &str) -> Option<&ResourceTemplate> {
        self.templates
            .iter()
            .find(|t| t.uri_template.as_str() == pattern)
    }

    /// Iterates templates in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &ResourceTemplate> {
        self.templates.iter()
    }

    /// Returns true when no resources of either kind are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statics.is_empty() && self.templates.is_empty()
    }

    /// Returns whether any registered resource can appear in a listing.
    #[must_use]
    pub fn has_listable(&self) -> bool {
        !self.statics.is_empty() || self.templates.iter().any(ResourceTemplate::is_listable)
    }

    /// Returns whether any template declares completion callbacks.
    #[must_use]
    pub fn has_completions(&self) -> bool {
        self.templates.iter().any(ResourceTemplate::has_completions)
    }
}

// =============================================================================
// Prompts
// =============================================================================

/// A registered prompt: metadata, string-typed arguments, handler.
pub struct PromptDescriptor {
    /// Unique prompt name.
    pub name: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Description surfaced to the client.
    pub description: String,
    /// Argument schema (prompt arguments are strings on the wire).
    pub args_schema: ObjectSchema,
    complete: HashMap<String, Arc<CompleteHandlerFn>>,
    handler: Arc<PromptHandlerFn>,
}

impl PromptDescriptor {
    /// Creates a prompt descriptor from an async handler.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        args_schema: ObjectSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(AgentContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PromptResult, HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            args_schema,
            complete: HashMap::new(),
            handler: Arc::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }

    /// Sets the display title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attaches a completion callback for one argument.
    #[must_use]
    pub fn with_completion<F, Fut>(mut self, arg: impl Into<String>, complete: F) -> Self
    where
        F: Fn(AgentContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<String>, HandlerError>> + Send + 'static,
    {
        self.complete.insert(
            arg.into(),
            Arc::new(move |ctx, partial| Box::pin(complete(ctx, partial))),
        );
        self
    }

    /// Returns the completion callback for an argument, if declared.
    #[must_use]
    pub fn completion(&self, arg: &str) -> Option<&Arc<CompleteHandlerFn>> {
        self.complete.get(arg)
    }

    /// Returns whether any completion callbacks are declared.
    #[must_use]
    pub fn has_completions(&self) -> bool {
        !self.complete.is_empty()
    }

    /// Invokes the handler with already-validated arguments.
    pub fn invoke(&self, ctx: AgentContext, args: Map<String, Value>) -> HandlerFuture<PromptResult> {
        (self.handler)(ctx, args)
    }
}

/// Name-to-handler bindings for prompts, in registration order.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: Vec<PromptDescriptor>,
    index: HashMap<String, usize>,
}

impl PromptRegistry {
    /// Registers a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is taken.
    pub fn register(&mut self, descriptor: PromptDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName {
                kind: "prompt",
                name: descriptor.name,
            });
        }
        self.index
            .insert(descriptor.name.clone(), self.prompts.len());
        self.prompts.push(descriptor);
        Ok(())
    }

    /// Looks up a prompt by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PromptDescriptor> {
        self.index.get(name).map(|&i| &self.prompts[i])
    }

    /// Iterates prompts in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PromptDescriptor> {
        self.prompts.iter()
    }

    /// Returns true when no prompts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Returns whether any prompt declares completion callbacks.
    #[must_use]
    pub fn has_completions(&self) -> bool {
        self.prompts.iter().any(PromptDescriptor::has_completions)
    }
}

/// The three capability registries, bundled for the server.
#[derive(Default)]
pub struct ServerRegistry {
    /// Invokable actions.
    pub tools: ToolRegistry,
    /// URI-addressed data.
    pub resources: ResourceRegistry,
    /// Parameterised message templates.
    pub prompts: PromptRegistry,
}

impl ServerRegistry {
    /// Creates an empty registry bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
