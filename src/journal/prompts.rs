//! The tag-suggestion prompt.
//!
//! Unlike the sampling path (server asks the model directly), this prompt
//! hands the user's client a ready-made conversation starter: the formatted
//! entry plus the tags not yet applied to it. Prompt arguments are strings
//! on the wire, so `entryId` arrives as text and is parsed here.

use crate::journal::entry_uri;
use crate::mcp::registry::{
    AgentContext, ContentItem, EmbeddedResource, HandlerError, PromptDescriptor, PromptMessage,
    PromptRegistry, PromptResult, RegistryError,
};
use crate::schema::{Field, ObjectSchema};
use crate::store::{EntryWithTags, Tag};

/// Registers every journal prompt.
///
/// # Errors
///
/// Returns an error on a name conflict.
pub fn register(registry: &mut PromptRegistry) -> Result<(), RegistryError> {
    registry.register(suggest_tags_prompt())
}

fn suggest_tags_prompt() -> PromptDescriptor {
    let schema = ObjectSchema::new().field(
        "entryId",
        Field::string().describe("The ID of the journal entry to suggest tags for"),
    );

    PromptDescriptor::new(
        "suggest_tags",
        "Suggest tags for a journal entry",
        schema,
        |ctx, args| async move {
            let raw_id = args
                .get("entryId")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| HandlerError::msg("Missing or invalid argument \"entryId\""))?;
            let id: i64 = raw_id
                .parse()
                .map_err(|_| HandlerError::msg(format!("Invalid entry ID \"{raw_id}\"")))?;

            let entry = ctx
                .store
                .get_entry_with_tags(id)?
                .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{id}\" not found")))?;
            let unused_tags = unused_tags(&ctx, &entry)?;

            Ok(PromptResult {
                description: None,
                messages: vec![
                    PromptMessage::user(ContentItem::text(request_text(id, &unused_tags))),
                    PromptMessage::user(ContentItem::Resource {
                        resource: EmbeddedResource {
                            uri: entry_uri(id),
                            mime_type: "application/json".to_string(),
                            text: format_entry(&entry),
                        },
                    }),
                ],
            })
        },
    )
    .with_title("Suggest Tags")
    .with_completion("entryId", |ctx, partial| async move {
        let entries = ctx.store.list_entries(None)?;
        Ok(entries
            .into_iter()
            .map(|e| e.id.to_string())
            .filter(|id| id.contains(&partial))
            .collect())
    })
}

/// Tags in the database that are not yet attached to the entry.
fn unused_tags(ctx: &AgentContext, entry: &EntryWithTags) -> Result<Vec<Tag>, HandlerError> {
    let tags = ctx.store.list_tags()?;
    Ok(tags
        .into_iter()
        .filter(|tag| !entry.tags.iter().any(|attached| attached.id == tag.id))
        .collect())
}

fn request_text(id: i64, unused_tags: &[Tag]) -> String {
    let tag_lines: Vec<String> = unused_tags
        .iter()
        .map(|tag| {
            format!(
                "{}: {} ({})",
                tag.name,
                tag.description.as_deref().unwrap_or("No description"),
                tag.id
            )
        })
        .collect();

    let availability = if unused_tags.is_empty() {
        "I do not have any other tags available.".to_string()
    } else {
        "Here are other tags I have available:".to_string()
    };

    [
        format!("Here is my journal entry (ID: {id}):"),
        String::new(),
        availability,
        tag_lines.join("\n"),
        String::new(),
        "Can you please suggest some tags to add to my entry? For those that I approve, \
         if it does not yet exist, create it with the \"create_tag\" tool. Then add it \
         with the \"add_tag_to_entry\" tool."
            .to_string(),
    ]
    .join("\n")
}

fn format_entry(entry: &EntryWithTags) -> String {
    let flag = |value: i64| if value == 1 { "Yes" } else { "No" };
    let opt = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
    let tag_list = if entry.tags.is_empty() {
        "None".to_string()
    } else {
        entry
            .tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    [
        format!("# {}", entry.entry.title),
        String::new(),
        entry.entry.content.clone(),
        String::new(),
        format!("Mood: {}", opt(&entry.entry.mood)),
        format!("Weather: {}", opt(&entry.entry.weather)),
        format!("Location: {}", opt(&entry.entry.location)),
        format!("Is Private: {}", flag(entry.entry.is_private)),
        format!("Is Favorite: {}", flag(entry.entry.is_favorite)),
        format!("Created At: {}", entry.entry.created_at),
        format!("Updated At: {}", entry.entry.updated_at),
        format!("Tags: {tag_list}"),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::mcp::sampling::ClientHandle;
    use crate::store::{JournalStore, NewEntry, NewTag};

    fn test_ctx() -> AgentContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = Arc::new(JournalStore::open_in_memory().unwrap());
        store
            .create_entry(&NewEntry {
                title: "Hiking Day".to_string(),
                content: "Went up the hill".to_string(),
                mood: Some("happy".to_string()),
                ..NewEntry::default()
            })
            .unwrap();
        store
            .create_tag(&NewTag {
                name: "outdoors".to_string(),
                description: Some("Outside activities".to_string()),
            })
            .unwrap();
        AgentContext {
            store,
            client: ClientHandle::new(tx),
        }
    }

    async fn get_prompt(ctx: &AgentContext, entry_id: &str) -> Result<PromptResult, HandlerError> {
        let prompt = suggest_tags_prompt();
        let args = prompt
            .args_schema
            .validate(Some(&json!({"entryId": entry_id})))
            .unwrap();
        prompt.invoke(ctx.clone(), args).await
    }

    #[tokio::test]
    async fn prompt_lists_unused_tags_and_embeds_the_entry() {
        let ctx = test_ctx();
        let result = get_prompt(&ctx, "1").await.unwrap();

        assert_eq!(result.messages.len(), 2);
        let ContentItem::Text { text } = &result.messages[0].content else {
            panic!("expected text content");
        };
        assert!(text.contains("journal entry (ID: 1)"));
        assert!(text.contains("outdoors: Outside activities (1)"));

        let ContentItem::Resource { resource } = &result.messages[1].content else {
            panic!("expected embedded resource");
        };
        assert_eq!(resource.uri, "journal://entries/1");
        assert!(resource.text.contains("# Hiking Day"));
        assert!(resource.text.contains("Mood: happy"));
        assert!(resource.text.contains("Tags: None"));
    }

    #[tokio::test]
    async fn attached_tags_are_excluded_from_suggestions() {
        let ctx = test_ctx();
        ctx.store.add_tag_to_entry(1, 1).unwrap();

        let result = get_prompt(&ctx, "1").await.unwrap();
        let ContentItem::Text { text } = &result.messages[0].content else {
            panic!("expected text content");
        };
        assert!(text.contains("I do not have any other tags available."));

        let ContentItem::Resource { resource } = &result.messages[1].content else {
            panic!("expected embedded resource");
        };
        assert!(resource.text.contains("Tags: outdoors"));
    }

    #[tokio::test]
    async fn unknown_entry_is_an_error() {
        let ctx = test_ctx();
        let err = get_prompt(&ctx, "42").await.unwrap_err();
        assert_eq!(err.to_string(), "Entry with ID \"42\" not found");
    }

    #[tokio::test]
    async fn non_numeric_entry_id_is_rejected() {
        let ctx = test_ctx();
        let err = get_prompt(&ctx, "abc").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid entry ID \"abc\"");
    }

    #[tokio::test]
    async fn entry_id_completion_filters_by_partial() {
        let ctx = test_ctx();
        let prompt = suggest_tags_prompt();
        let complete = prompt.completion("entryId").unwrap();

        let values = complete(ctx.clone(), "1".to_string()).await.unwrap();
        assert_eq!(values, vec!["1"]);
        let none = complete(ctx.clone(), "7".to_string()).await.unwrap();
        assert!(none.is_empty());
    }
}
