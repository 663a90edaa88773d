//! The journal capability surface.
//!
//! Everything the server exposes to clients is registered here: CRUD tools
//! for entries and tags, `journal://` resources with completion support, and
//! the tag-suggestion prompt. The MCP layer stays domain-agnostic; this
//! module is where the journal's semantics live.
//!
//! # URI Scheme
//!
//! - `journal://tags` — all tags as one JSON document
//! - `journal://tags/{id}` — a single tag
//! - `journal://entries/{id}` — a single entry with its attached tags

pub mod prompts;
pub mod resources;
pub mod sampling;
pub mod tools;

use serde_json::json;

use crate::mcp::registry::{ContentItem, EmbeddedResource, RegistryError, ServerRegistry};
use crate::store::{Entry, Tag};

/// JSON MIME type used by every journal resource.
pub const JSON_MIME: &str = "application/json";

/// Builds the full journal registry: tools, resources, and prompts.
///
/// # Errors
///
/// Returns an error if any registration conflicts, which would indicate a
/// naming bug in this module.
pub fn build_registry() -> Result<ServerRegistry, RegistryError> {
    let mut registry = ServerRegistry::new();
    tools::register(&mut registry.tools)?;
    resources::register(&mut registry.resources)?;
    prompts::register(&mut registry.prompts)?;
    Ok(registry)
}

/// URI of a single entry resource.
#[must_use]
pub fn entry_uri(id: i64) -> String {
    format!("journal://entries/{id}")
}

/// URI of a single tag resource.
#[must_use]
pub fn tag_uri(id: i64) -> String {
    format!("journal://tags/{id}")
}

/// A `resource_link` content item pointing at an entry.
#[must_use]
pub fn entry_resource_link(entry: &Entry) -> ContentItem {
    ContentItem::ResourceLink {
        uri: entry_uri(entry.id),
        name: entry.title.clone(),
        description: Some(format!("Journal Entry: \"{}\"", entry.title)),
        mime_type: JSON_MIME.to_string(),
    }
}

/// A `resource_link` content item pointing at a tag.
#[must_use]
pub fn tag_resource_link(tag: &Tag) -> ContentItem {
    ContentItem::ResourceLink {
        uri: tag_uri(tag.id),
        name: tag.name.clone(),
        description: Some(format!("Tag: \"{}\"", tag.name)),
        mime_type: JSON_MIME.to_string(),
    }
}

/// An embedded-resource content item holding a serialised value.
fn embedded(uri: String, value: &impl serde::Serialize) -> ContentItem {
    ContentItem::Resource {
        resource: EmbeddedResource {
            uri,
            mime_type: JSON_MIME.to_string(),
            text: serde_json::to_string(value).unwrap_or_else(|_| json!(null).to_string()),
        },
    }
}

/// An embedded-resource content item for an entry-shaped value.
#[must_use]
pub fn entry_embedded_resource(id: i64, value: &impl serde::Serialize) -> ContentItem {
    embedded(entry_uri(id), value)
}

/// An embedded-resource content item for a tag.
#[must_use]
pub fn tag_embedded_resource(tag: &Tag) -> ContentItem {
    embedded(tag_uri(tag.id), tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tag() -> Tag {
        Tag {
            id: 7,
            name: "work".to_string(),
            description: Some("Work stuff".to_string()),
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn registry_builds_without_conflicts() {
        let registry = build_registry().unwrap();
        assert!(!registry.tools.is_empty());
        assert!(!registry.resources.is_empty());
        assert!(!registry.prompts.is_empty());
        assert!(registry.resources.has_listable());
        assert!(registry.resources.has_completions());
    }

    #[test]
    fn tag_link_shape() {
        let link = serde_json::to_value(tag_resource_link(&sample_tag())).unwrap();
        assert_eq!(link["type"], "resource_link");
        assert_eq!(link["uri"], "journal://tags/7");
        assert_eq!(link["name"], "work");
        assert_eq!(link["description"], "Tag: \"work\"");
    }

    #[test]
    fn tag_embedded_shape() {
        let item = serde_json::to_value(tag_embedded_resource(&sample_tag())).unwrap();
        assert_eq!(item["type"], "resource");
        assert_eq!(item["resource"]["uri"], "journal://tags/7");
        assert_eq!(item["resource"]["mimeType"], "application/json");
        let body: serde_json::Value =
            serde_json::from_str(item["resource"]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["name"], "work");
    }
}
