//! Tag suggestion via client-side sampling.
//!
//! After an entry is created, the server asks the client's model to suggest
//! tags for it. The model's reply is free-form text relayed by the client,
//! so it crosses a trust boundary: it must parse as the expected JSON shape
//! or be rejected outright. Suggestions are deduplicated against the
//! current database state before anything is attached.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::json;

use crate::error::StoreError;
use crate::mcp::registry::{AgentContext, HandlerError};
use crate::mcp::sampling::{SamplingMessage, SamplingRequest};
use crate::store::NewTag;

const SUGGEST_TAGS_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that suggests relevant tags for journal entries to make them easier to categorize and find later.
You will be provided with a journal entry, it's current tags, and all existing tags.
Only suggest tags that are not already applied to this entry.
Journal entries should not have more than 4-5 tags and it's perfectly fine to not have any tags at all.
Feel free to suggest new tags that are not currently in the database and they will be created.

You will respond with JSON only.
Example responses:
If you have no suggestions, respond with an empty array:
[]

If you have some suggestions, respond with an array of tag objects. Existing tags have an \"id\" property, new tags have a \"name\" and \"description\" property:
[{\"id\": 1}, {\"name\": \"New Tag\", \"description\": \"The description of the new tag\"}, {\"id\": 24}]";

const SUGGEST_TAGS_MAX_TOKENS: u32 = 100;

/// One tag suggestion from the model: either a reference to an existing tag
/// or a new tag to create.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagSuggestion {
    Existing {
        id: i64,
    },
    New {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
}

/// Asks the client's model for tag suggestions and attaches the accepted
/// ones to the entry.
///
/// No-ops when the client lacks the `sampling` capability. Acceptance
/// rules: an existing-tag suggestion must reference a real tag not already
/// attached; a new-tag suggestion must not collide with an existing tag
/// name (case-sensitive exact match).
///
/// # Errors
///
/// Returns an error if the entry does not exist, the store fails, or the
/// model's reply does not match the expected shape.
pub async fn suggest_tags(ctx: &AgentContext, entry_id: i64) -> Result<(), HandlerError> {
    let entry = ctx
        .store
        .get_entry_with_tags(entry_id)?
        .ok_or_else(|| HandlerError::msg(format!("Entry with ID \"{entry_id}\" not found")))?;
    let existing_tags = ctx.store.list_tags()?;
    let current_tags = entry.tags.clone();

    let payload = json!({
        "entry": entry,
        "currentTags": current_tags,
        "existingTags": existing_tags,
    });

    let request = SamplingRequest {
        system_prompt: Some(SUGGEST_TAGS_SYSTEM_PROMPT.to_string()),
        messages: vec![SamplingMessage::user_json(payload.to_string())],
        max_tokens: SUGGEST_TAGS_MAX_TOKENS,
    };

    let Some(result) = ctx.client.create_message(request).await? else {
        tracing::debug!(entry_id, "Client does not support sampling, skipping tag suggestions");
        return Ok(());
    };

    let text = result
        .text()
        .ok_or_else(|| HandlerError::msg("Sampling response contained no text content"))?;
    let suggestions: Vec<TagSuggestion> = serde_json::from_str(text).map_err(|e| {
        HandlerError::msg(format!(
            "Suggested tags did not match the expected shape: {e}"
        ))
    })?;

    let mut ids_to_add = BTreeSet::new();
    for suggestion in suggestions {
        match suggestion {
            TagSuggestion::Existing { id } => {
                let known = existing_tags.iter().any(|t| t.id == id);
                let attached = current_tags.iter().any(|t| t.id == id);
                if known && !attached {
                    ids_to_add.insert(id);
                }
            }
            TagSuggestion::New { name, description } => {
                if existing_tags.iter().any(|t| t.name == name) {
                    continue;
                }
                match ctx.store.create_tag(&NewTag { name, description }) {
                    Ok(tag) => {
                        ids_to_add.insert(tag.id);
                    }
                    // Model suggested the same new name twice, or a tag was
                    // created concurrently; skip rather than abort.
                    Err(StoreError::DuplicateTagName { name }) => {
                        tracing::debug!(name, "Skipping duplicate suggested tag");
                    }
                    Err(error) => return Err(error.into()),
                }
            }
        }
    }

    for tag_id in &ids_to_add {
        ctx.store.add_tag_to_entry(entry_id, *tag_id)?;
    }

    if !ids_to_add.is_empty() {
        tracing::info!(entry_id, tags = ?ids_to_add, "Attached suggested tags");
    }

    Ok(())
}
