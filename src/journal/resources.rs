//! Journal resources: tags and entries addressable by `journal://` URIs.
//!
//! One static resource exposes the whole tag collection; two templates
//! expose individual tags and entries. Both templates declare list
//! callbacks (their member sets are small and enumerable) and an `id`
//! completion callback that matches IDs containing the partial input.

use crate::journal::{entry_uri, tag_uri, JSON_MIME};
use crate::mcp::registry::{
    AgentContext, HandlerError, RegistryError, ResourceContents, ResourceListing,
    ResourceRegistry, ResourceRequest, ResourceTemplate, StaticResource,
};

/// Registers every journal resource.
///
/// # Errors
///
/// Returns an error on a URI or pattern conflict.
pub fn register(registry: &mut ResourceRegistry) -> Result<(), RegistryError> {
    registry.register_static(tags_resource())?;
    registry.register_template(tag_template()?)?;
    registry.register_template(entry_template()?)?;
    Ok(())
}

fn parse_id(raw: &str, kind: &str) -> Result<i64, HandlerError> {
    raw.parse()
        .map_err(|_| HandlerError::msg(format!("Invalid {kind} ID \"{raw}\"")))
}

fn json_contents(
    uri: String,
    value: &impl serde::Serialize,
) -> Result<ResourceContents, HandlerError> {
    Ok(ResourceContents::single(
        uri,
        JSON_MIME,
        serde_json::to_string(value)?,
    ))
}

/// Completion candidates: IDs whose decimal form contains the partial
/// input. An empty partial matches everything.
fn matching_ids(ids: impl Iterator<Item = i64>, partial: &str) -> Vec<String> {
    ids.map(|id| id.to_string())
        .filter(|id| id.contains(partial))
        .collect()
}

fn tags_resource() -> StaticResource {
    StaticResource::new(
        "tags",
        "journal://tags",
        JSON_MIME,
        |ctx: AgentContext, request: ResourceRequest| async move {
            let tags = ctx.store.list_tags()?;
            json_contents(request.uri, &tags)
        },
    )
    .with_title("Tags")
    .with_description("All tags currently in the database")
}

fn tag_template() -> Result<ResourceTemplate, RegistryError> {
    Ok(ResourceTemplate::new(
        "tag",
        "journal://tags/{id}",
        JSON_MIME,
        |ctx: AgentContext, request: ResourceRequest| async move {
            let id = parse_id(request.param("id")?, "tag")?;
            let tag = ctx
                .store
                .get_tag(id)?
                .ok_or_else(|| HandlerError::msg(format!("Tag with ID \"{id}\" not found")))?;
            json_contents(request.uri, &tag)
        },
    )?
    .with_title("Tag")
    .with_description("A single tag")
    .with_list(|ctx: AgentContext| async move {
        let tags = ctx.store.list_tags()?;
        Ok(tags
            .into_iter()
            .map(|tag| ResourceListing {
                uri: tag_uri(tag.id),
                name: tag.name,
                description: tag.description,
                mime_type: JSON_MIME.to_string(),
            })
            .collect())
    })
    .with_completion("id", |ctx: AgentContext, partial: String| async move {
        let tags = ctx.store.list_tags()?;
        Ok(matching_ids(tags.into_iter().map(|t| t.id), &partial))
    }))
}

fn entry_template() -> Result<ResourceTemplate, RegistryError> {
    Ok(ResourceTemplate::new(
        "entry",
        "journal://entries/{id}",
        JSON_MIME,
        |ctx: AgentContext, request: ResourceRequest| async move {
            let id = parse_id(request.param("id")?, "entry")?;
            let entry = ctx
                .store
                .get_entry_with_tags(id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{id}\" not found")))?;
            json_contents(request.uri, &entry)
        },
    )?
    .with_title("Entry")
    .with_description("A single entry")
    .with_list(|ctx: AgentContext| async move {
        let entries = ctx.store.list_entries(None)?;
        Ok(entries
            .into_iter()
            .map(|entry| ResourceListing {
                uri: entry_uri(entry.id),
                name: entry.title,
                description: None,
                mime_type: JSON_MIME.to_string(),
            })
            .collect())
    })
    .with_completion("id", |ctx: AgentContext, partial: String| async move {
        let entries = ctx.store.list_entries(None)?;
        Ok(matching_ids(entries.into_iter().map(|e| e.id), &partial))
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mcp::registry::ResolvedResource;
    use crate::mcp::sampling::ClientHandle;
    use crate::store::{JournalStore, NewEntry, NewTag};

    fn test_ctx() -> AgentContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        AgentContext {
            store: Arc::new(JournalStore::open_in_memory().unwrap()),
            client: ClientHandle::new(tx),
        }
    }

    fn seeded_registry(ctx: &AgentContext) -> ResourceRegistry {
        ctx.store
            .create_tag(&NewTag {
                name: "work".to_string(),
                description: None,
            })
            .unwrap();
        ctx.store
            .create_entry(&NewEntry {
                title: "First".to_string(),
                content: "Body".to_string(),
                ..NewEntry::default()
            })
            .unwrap();

        let mut registry = ResourceRegistry::default();
        register(&mut registry).unwrap();
        registry
    }

    async fn read(ctx: &AgentContext, registry: &ResourceRegistry, uri: &str) -> Value {
        let resolved = registry.resolve(uri).expect("uri should resolve");
        let contents = registry.read(ctx.clone(), resolved, uri).await.unwrap();
        assert_eq!(contents.contents[0].uri, uri);
        serde_json::from_str(&contents.contents[0].text).unwrap()
    }

    #[tokio::test]
    async fn static_tags_resource_lists_all_tags() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let body = read(&ctx, &registry, "journal://tags").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "work");
    }

    #[tokio::test]
    async fn tag_template_reads_a_single_tag() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let body = read(&ctx, &registry, "journal://tags/1").await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["name"], "work");
    }

    #[tokio::test]
    async fn entry_template_includes_attached_tags() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);
        ctx.store.add_tag_to_entry(1, 1).unwrap();

        let body = read(&ctx, &registry, "journal://entries/1").await;
        assert_eq!(body["title"], "First");
        assert_eq!(body["tags"][0]["name"], "work");
    }

    #[tokio::test]
    async fn missing_tag_yields_not_found_error() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let resolved = registry.resolve("journal://tags/99").unwrap();
        let err = registry
            .read(ctx.clone(), resolved, "journal://tags/99")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tag with ID \"99\" not found");
    }

    #[tokio::test]
    async fn non_numeric_id_is_rejected() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let resolved = registry.resolve("journal://tags/abc").unwrap();
        let err = registry
            .read(ctx.clone(), resolved, "journal://tags/abc")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid tag ID \"abc\"");
    }

    #[tokio::test]
    async fn listings_concatenate_statics_and_template_members() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let listings = registry.listings(&ctx).await.unwrap();
        let uris: Vec<&str> = listings.iter().map(|l| l.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec!["journal://tags", "journal://tags/1", "journal://entries/1"]
        );
    }

    #[tokio::test]
    async fn id_completion_matches_partial_input() {
        let ctx = test_ctx();
        let registry = seeded_registry(&ctx);

        let template = registry.find_template("journal://tags/{id}").unwrap();
        let complete = template.completion("id").unwrap();

        let values = complete(ctx.clone(), "1".to_string()).await.unwrap();
        assert_eq!(values, vec!["1"]);

        let none = complete(ctx.clone(), "9".to_string()).await.unwrap();
        assert!(none.is_empty());

        let all = complete(ctx.clone(), String::new()).await.unwrap();
        assert_eq!(all, vec!["1"]);
    }

    #[test]
    fn template_resolution_is_deterministic() {
        let mut registry = ResourceRegistry::default();
        register(&mut registry).unwrap();

        match registry.resolve("journal://entries/3") {
            Some(ResolvedResource::Template(template, params)) => {
                assert_eq!(template.name, "entry");
                assert_eq!(params["id"], "3");
            }
            _ => panic!("expected entry template match"),
        }
    }
}
