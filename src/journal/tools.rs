//! Entry and tag CRUD tools.
//!
//! Mutation replies pair a human-readable confirmation with an embedded
//! resource or resource link, so the client can follow up without a second
//! round-trip. `create_entry` additionally kicks off a fire-and-forget
//! tag-suggestion sampling call; its failure never affects the tool result.

use serde_json::{Map, Value};

use crate::journal::{
    entry_embedded_resource, entry_resource_link, sampling, tag_embedded_resource,
    tag_resource_link,
};
use crate::mcp::registry::{
    AgentContext, ContentItem, HandlerError, RegistryError, ToolDescriptor, ToolRegistry,
    ToolResult,
};
use crate::schema::{Field, ObjectSchema, SchemaNode};
use crate::store::{EntryUpdate, NewEntry, NewTag, TagUpdate};

/// Registers every journal tool.
///
/// # Errors
///
/// Returns an error on a name conflict.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(create_entry_tool())?;
    registry.register(get_entry_tool())?;
    registry.register(list_entries_tool())?;
    registry.register(update_entry_tool())?;
    registry.register(delete_entry_tool())?;
    registry.register(create_tag_tool())?;
    registry.register(get_tag_tool())?;
    registry.register(list_tags_tool())?;
    registry.register(update_tag_tool())?;
    registry.register(delete_tag_tool())?;
    registry.register(add_tag_to_entry_tool())?;
    Ok(())
}

fn arg_i64(args: &Map<String, Value>, name: &str) -> Result<i64, HandlerError> {
    args.get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| HandlerError::msg(format!("Missing or invalid argument \"{name}\"")))
}

// =============================================================================
// Entry tools
// =============================================================================

fn mood_field() -> Field {
    Field::string()
        .describe("The mood of the entry (for example: \"happy\", \"sad\", \"anxious\", \"excited\")")
}

fn location_field() -> Field {
    Field::string()
        .describe("The location of the entry (for example: \"home\", \"work\", \"school\", \"park\")")
}

fn weather_field() -> Field {
    Field::string()
        .describe("The weather of the entry (for example: \"sunny\", \"cloudy\", \"rainy\", \"snowy\")")
}

pub(crate) fn create_entry_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new()
        .field("title", Field::string().describe("The title of the entry"))
        .field("content", Field::string().describe("The content of the entry"))
        .field("mood", mood_field().optional())
        .field("location", location_field().optional())
        .field("weather", weather_field().optional())
        .field(
            "isPrivate",
            Field::flag()
                .describe("Whether the entry is private (1 for private, 0 for public)")
                .default_value(Value::from(1)),
        )
        .field(
            "isFavorite",
            Field::flag()
                .describe("Whether the entry is a favorite (1 for favorite, 0 for not favorite)")
                .default_value(Value::from(0)),
        )
        .field(
            "tags",
            Field::array_of(SchemaNode::Integer)
                .describe("The IDs of the tags to add to the entry")
                .optional(),
        );

    ToolDescriptor::new(
        "create_entry",
        "Create a new journal entry",
        schema,
        |ctx, mut args| async move {
            let tag_ids: Vec<i64> = match args.remove("tags") {
                Some(value) => serde_json::from_value(value)?,
                None => Vec::new(),
            };
            let new_entry: NewEntry = serde_json::from_value(Value::Object(args))?;

            let entry = ctx.store.create_entry(&new_entry)?;
            for tag_id in tag_ids {
                ctx.store.add_tag_to_entry(entry.id, tag_id)?;
            }

            // Best-effort enrichment; runs detached so a slow or failing
            // sampling round-trip never delays the reply.
            let sampling_ctx = ctx.clone();
            let entry_id = entry.id;
            tokio::spawn(async move {
                if let Err(error) = sampling::suggest_tags(&sampling_ctx, entry_id).await {
                    tracing::debug!(entry_id, error = %error, "Tag suggestion did not complete");
                }
            });

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Entry \"{}\" created successfully with ID \"{}\"",
                    entry.title, entry.id
                )),
                entry_embedded_resource(entry.id, &entry),
            ]))
        },
    )
    .with_title("Create Entry")
}

pub(crate) fn get_entry_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new().field("id", Field::integer().describe("The ID of the entry"));

    ToolDescriptor::new(
        "get_entry",
        "Get a journal entry by ID",
        schema,
        |ctx, args| async move {
            let id = arg_i64(&args, "id")?;
            let entry = ctx
                .store
                .get_entry_with_tags(id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{id}\" not found")))?;
            Ok(ToolResult::new(vec![entry_embedded_resource(id, &entry)]))
        },
    )
    .with_title("Get Entry")
}

pub(crate) fn list_entries_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new().field(
        "tagIds",
        Field::array_of(SchemaNode::Integer)
            .describe("Optional array of tag IDs to filter entries by")
            .optional(),
    );

    ToolDescriptor::new(
        "list_entries",
        "List all journal entries",
        schema,
        |ctx, args| async move {
            let tag_ids: Option<Vec<i64>> = match args.get("tagIds") {
                Some(value) => Some(serde_json::from_value(value.clone())?),
                None => None,
            };
            let entries = ctx.store.list_entries(tag_ids.as_deref())?;

            let mut content = vec![ContentItem::text(format!(
                "Found {} entries.",
                entries.len()
            ))];
            content.extend(entries.iter().map(entry_resource_link));
            Ok(ToolResult::new(content))
        },
    )
    .with_title("List Entries")
}

pub(crate) fn update_entry_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new()
        .field("id", Field::integer().describe("The ID of the entry"))
        .field(
            "title",
            Field::string().describe("The title of the entry").optional(),
        )
        .field(
            "content",
            Field::string().describe("The content of the entry").optional(),
        )
        .field("mood", mood_field().optional().nullable())
        .field("location", location_field().optional().nullable())
        .field("weather", weather_field().optional().nullable())
        .field(
            "isPrivate",
            Field::flag()
                .describe("Whether the entry is private (1 for private, 0 for public)")
                .optional(),
        )
        .field(
            "isFavorite",
            Field::flag()
                .describe("Whether the entry is a favorite (1 for favorite, 0 for not favorite)")
                .optional(),
        );

    ToolDescriptor::new(
        "update_entry",
        "Update a journal entry. Fields that are not provided (or set to undefined) will not be \
         updated. Fields that are set to null or any other value will be updated.",
        schema,
        |ctx, mut args| async move {
            let id = arg_i64(&args, "id")?;
            args.remove("id");
            let update: EntryUpdate = serde_json::from_value(Value::Object(args))?;

            ctx.store
                .get_entry(id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{id}\" not found")))?;
            let updated = ctx.store.update_entry(id, &update)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Entry \"{}\" (ID: {id}) updated successfully",
                    updated.title
                )),
                entry_embedded_resource(id, &updated),
            ]))
        },
    )
    .with_title("Update Entry")
}

pub(crate) fn delete_entry_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new().field("id", Field::integer().describe("The ID of the entry"));

    ToolDescriptor::new(
        "delete_entry",
        "Delete a journal entry",
        schema,
        |ctx, args| async move {
            let id = arg_i64(&args, "id")?;
            let existing = ctx
                .store
                .get_entry(id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{id}\" not found")))?;
            ctx.store.delete_entry(id)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Entry \"{}\" (ID: {id}) deleted successfully",
                    existing.title
                )),
                entry_embedded_resource(id, &existing),
            ]))
        },
    )
    .with_title("Delete Entry")
}

// =============================================================================
// Tag tools
// =============================================================================

pub(crate) fn create_tag_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new()
        .field("name", Field::string().describe("The name of the tag"))
        .field(
            "description",
            Field::string().describe("The description of the tag").optional(),
        );

    ToolDescriptor::new(
        "create_tag",
        "Create a new tag",
        schema,
        |ctx, args| async move {
            let new_tag: NewTag = serde_json::from_value(Value::Object(args))?;
            let tag = ctx.store.create_tag(&new_tag)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Tag \"{}\" created successfully with ID \"{}\"",
                    tag.name, tag.id
                )),
                tag_embedded_resource(&tag),
            ]))
        },
    )
    .with_title("Create Tag")
}

pub(crate) fn get_tag_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new().field("id", Field::integer().describe("The ID of the tag"));

    ToolDescriptor::new("get_tag", "Get a tag by ID", schema, |ctx, args| async move {
        let id = arg_i64(&args, "id")?;
        let tag = ctx
            .store
            .get_tag(id)?
            .ok_or_else(|| HandlerError::msg(format!("Tag ID \"{id}\" not found")))?;
        Ok(ToolResult::new(vec![tag_embedded_resource(&tag)]))
    })
    .with_title("Get Tag")
}

pub(crate) fn list_tags_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        "list_tags",
        "List all tags",
        ObjectSchema::new(),
        |ctx, _args| async move {
            let tags = ctx.store.list_tags()?;

            let mut content = vec![ContentItem::text(format!("Found {} tags.", tags.len()))];
            content.extend(tags.iter().map(tag_resource_link));
            Ok(ToolResult::new(content))
        },
    )
    .with_title("List Tags")
}

pub(crate) fn update_tag_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new()
        .field("id", Field::integer().describe("The ID of the tag"))
        // Not nullable: the name column cannot be cleared, only replaced.
        .field(
            "name",
            Field::string().describe("The name of the tag").optional(),
        )
        .field(
            "description",
            Field::string()
                .describe("The description of the tag")
                .optional()
                .nullable(),
        );

    ToolDescriptor::new(
        "update_tag",
        "Update a tag",
        schema,
        |ctx, mut args| async move {
            let id = arg_i64(&args, "id")?;
            args.remove("id");
            let update: TagUpdate = serde_json::from_value(Value::Object(args))?;
            let updated = ctx.store.update_tag(id, &update)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Tag \"{}\" (ID: {id}) updated successfully",
                    updated.name
                )),
                tag_embedded_resource(&updated),
            ]))
        },
    )
    .with_title("Update Tag")
}

pub(crate) fn delete_tag_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new().field("id", Field::integer().describe("The ID of the tag"));

    ToolDescriptor::new(
        "delete_tag",
        "Delete a tag",
        schema,
        |ctx, args| async move {
            let id = arg_i64(&args, "id")?;
            let existing = ctx
                .store
                .get_tag(id)?
                .ok_or_else(|| HandlerError::msg(format!("Tag ID \"{id}\" not found")))?;
            ctx.store.delete_tag(id)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Tag \"{}\" (ID: {id}) deleted successfully",
                    existing.name
                )),
                tag_embedded_resource(&existing),
            ]))
        },
    )
    .with_title("Delete Tag")
}

// =============================================================================
// Entry-tag tools
// =============================================================================

pub(crate) fn add_tag_to_entry_tool() -> ToolDescriptor {
    let schema = ObjectSchema::new()
        .field("entryId", Field::integer().describe("The ID of the entry"))
        .field("tagId", Field::integer().describe("The ID of the tag"));

    ToolDescriptor::new(
        "add_tag_to_entry",
        "Add a tag to an entry",
        schema,
        |ctx, args| async move {
            let entry_id = arg_i64(&args, "entryId")?;
            let tag_id = arg_i64(&args, "tagId")?;

            let tag = ctx
                .store
                .get_tag(tag_id)?
                .ok_or_else(|| HandlerError::msg(format!("Tag {tag_id} not found")))?;
            let entry = ctx
                .store
                .get_entry(entry_id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{entry_id}\" not found")))?;

            let entry_tag = ctx.store.add_tag_to_entry(entry_id, tag_id)?;

            Ok(ToolResult::new(vec![
                ContentItem::text(format!(
                    "Tag \"{}\" (ID: {}) added to entry \"{}\" (ID: {}) successfully",
                    tag.name, entry_tag.tag_id, entry.title, entry_tag.entry_id
                )),
                tag_resource_link(&tag),
                entry_resource_link(&entry),
            ]))
        },
    )
    .with_title("Add Tag to Entry")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mcp::sampling::ClientHandle;
    use crate::store::JournalStore;

    fn test_ctx() -> AgentContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        AgentContext {
            store: Arc::new(JournalStore::open_in_memory().unwrap()),
            client: ClientHandle::new(tx),
        }
    }

    async fn invoke(
        ctx: &AgentContext,
        tool: &ToolDescriptor,
        raw: Value,
    ) -> Result<ToolResult, HandlerError> {
        let args = tool.input_schema.validate(Some(&raw)).unwrap();
        tool.invoke(ctx.clone(), args).await
    }

    fn first_text(result: &ToolResult) -> &str {
        match &result.content[0] {
            ContentItem::Text { text } => text,
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_entry_reports_title_and_id() {
        let ctx = test_ctx();
        let result = invoke(
            &ctx,
            &create_entry_tool(),
            json!({"title": "Test Entry", "content": "This is a test entry"}),
        )
        .await
        .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            first_text(&result),
            "Entry \"Test Entry\" created successfully with ID \"1\""
        );
        // Second item embeds the created entry.
        let embedded = serde_json::to_value(&result.content[1]).unwrap();
        assert_eq!(embedded["type"], "resource");
        assert_eq!(embedded["resource"]["uri"], "journal://entries/1");
    }

    #[tokio::test]
    async fn create_entry_attaches_requested_tags() {
        let ctx = test_ctx();
        invoke(&ctx, &create_tag_tool(), json!({"name": "work"}))
            .await
            .unwrap();

        invoke(
            &ctx,
            &create_entry_tool(),
            json!({"title": "A", "content": "B", "tags": [1]}),
        )
        .await
        .unwrap();

        let tags = ctx.store.get_entry_tags(1).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "work");
    }

    #[tokio::test]
    async fn get_entry_missing_id_is_a_handler_error() {
        let ctx = test_ctx();
        let err = invoke(&ctx, &get_entry_tool(), json!({"id": 42}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Entry with ID \"42\" not found");
    }

    #[tokio::test]
    async fn list_tags_returns_resource_links() {
        let ctx = test_ctx();
        invoke(&ctx, &create_tag_tool(), json!({"name": "Linked Tag Test"}))
            .await
            .unwrap();

        let result = invoke(&ctx, &list_tags_tool(), json!({})).await.unwrap();
        assert_eq!(first_text(&result), "Found 1 tags.");

        let link = serde_json::to_value(&result.content[1]).unwrap();
        assert_eq!(link["type"], "resource_link");
        assert_eq!(link["uri"], "journal://tags/1");
        assert_eq!(link["name"], "Linked Tag Test");
    }

    #[tokio::test]
    async fn update_entry_clears_nullable_field_with_null() {
        let ctx = test_ctx();
        invoke(
            &ctx,
            &create_entry_tool(),
            json!({"title": "A", "content": "B", "mood": "happy"}),
        )
        .await
        .unwrap();

        invoke(
            &ctx,
            &update_entry_tool(),
            json!({"id": 1, "mood": null, "title": "A2"}),
        )
        .await
        .unwrap();

        let entry = ctx.store.get_entry(1).unwrap().unwrap();
        assert_eq!(entry.title, "A2");
        assert_eq!(entry.mood, None);
    }

    #[tokio::test]
    async fn add_tag_to_entry_links_both_sides() {
        let ctx = test_ctx();
        invoke(&ctx, &create_entry_tool(), json!({"title": "A", "content": "B"}))
            .await
            .unwrap();
        invoke(&ctx, &create_tag_tool(), json!({"name": "work"}))
            .await
            .unwrap();

        let result = invoke(
            &ctx,
            &add_tag_to_entry_tool(),
            json!({"entryId": 1, "tagId": 1}),
        )
        .await
        .unwrap();

        assert_eq!(
            first_text(&result),
            "Tag \"work\" (ID: 1) added to entry \"A\" (ID: 1) successfully"
        );
        assert_eq!(result.content.len(), 3);
    }

    #[tokio::test]
    async fn delete_entry_returns_the_deleted_entry() {
        let ctx = test_ctx();
        invoke(&ctx, &create_entry_tool(), json!({"title": "A", "content": "B"}))
            .await
            .unwrap();

        let result = invoke(&ctx, &delete_entry_tool(), json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(first_text(&result), "Entry \"A\" (ID: 1) deleted successfully");
        assert!(ctx.store.get_entry(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_tag_name_surfaces_as_handler_error() {
        let ctx = test_ctx();
        invoke(&ctx, &create_tag_tool(), json!({"name": "work"}))
            .await
            .unwrap();
        let err = invoke(&ctx, &create_tag_tool(), json!({"name": "work"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn update_tag_rejects_a_null_name() {
        // The name column cannot be cleared, so null is a schema error.
        let tool = update_tag_tool();
        let err = tool
            .input_schema
            .validate(Some(&json!({"id": 1, "name": null})))
            .unwrap_err();
        assert_eq!(err.issues[0].field, "name");
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn required_fields_enforced_by_schema() {
        let tool = create_entry_tool();
        let err = tool
            .input_schema
            .validate(Some(&json!({"title": "no content"})))
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }
}
