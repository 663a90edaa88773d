//! The journal data store.
//!
//! A thin CRUD layer over a single-file SQLite database holding entries,
//! tags, and the entry-tag join table. The store also provides change
//! propagation: listeners registered via [`JournalStore::subscribe`] are
//! invoked synchronously after every successful mutation with a
//! [`ChangeSet`] describing the affected rows.
//!
//! # Concurrency
//!
//! The connection is guarded by a mutex, so mutations are serialised at the
//! store boundary. Multi-step operations (create entry, then attach tags)
//! are NOT wrapped in a single transaction; a crash mid-sequence can leave
//! an entry without its tags. This mirrors the behaviour of the system this
//! server is modelled on and is a known limitation.

mod migrations;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Row ID.
    pub id: i64,
    /// Entry title.
    pub title: String,
    /// Entry body text.
    pub content: String,
    /// Optional mood (for example "happy", "anxious").
    pub mood: Option<String>,
    /// Optional location (for example "home", "work").
    pub location: Option<String>,
    /// Optional weather (for example "sunny", "rainy").
    pub weather: Option<String>,
    /// 1 for private, 0 for public.
    pub is_private: i64,
    /// 1 for favourite, 0 otherwise.
    pub is_favorite: i64,
    /// Creation timestamp (SQLite datetime text).
    pub created_at: String,
    /// Last-update timestamp (SQLite datetime text).
    pub updated_at: String,
}

/// A journal entry together with its attached tags.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithTags {
    /// The entry row.
    #[serde(flatten)]
    pub entry: Entry,
    /// Tags attached to the entry, in attachment order.
    pub tags: Vec<Tag>,
}

/// Fields for creating a new entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    /// Entry title.
    pub title: String,
    /// Entry body text.
    pub content: String,
    /// Optional mood.
    #[serde(default)]
    pub mood: Option<String>,
    /// Optional location.
    #[serde(default)]
    pub location: Option<String>,
    /// Optional weather.
    #[serde(default)]
    pub weather: Option<String>,
    /// 1 for private (default), 0 for public.
    #[serde(default = "default_private")]
    pub is_private: i64,
    /// 1 for favourite, 0 otherwise (default).
    #[serde(default)]
    pub is_favorite: i64,
}

const fn default_private() -> i64 {
    1
}

/// A three-state update value for nullable columns.
///
/// Distinguishes "leave the column alone" (field absent) from "clear the
/// column" (field explicitly null) from "set a new value".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field was not provided; keep the current value.
    #[default]
    Keep,
    /// Field was explicitly null; clear the column.
    Clear,
    /// Set the column to this value.
    Set(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Set(value),
            None => Self::Clear,
        })
    }
}

/// A partial update for an entry. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New content.
    #[serde(default)]
    pub content: Option<String>,
    /// New mood (null clears it).
    #[serde(default)]
    pub mood: Patch<String>,
    /// New location (null clears it).
    #[serde(default)]
    pub location: Patch<String>,
    /// New weather (null clears it).
    #[serde(default)]
    pub weather: Patch<String>,
    /// New privacy flag (0 or 1).
    #[serde(default)]
    pub is_private: Option<i64>,
    /// New favourite flag (0 or 1).
    #[serde(default)]
    pub is_favorite: Option<i64>,
}

/// A tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Row ID.
    pub id: i64,
    /// Tag name, unique across all tags (case-sensitive).
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Creation timestamp (SQLite datetime text).
    pub created_at: String,
    /// Last-update timestamp (SQLite datetime text).
    pub updated_at: String,
}

/// Fields for creating a new tag.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    /// Tag name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A partial update for a tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description (null clears it).
    #[serde(default)]
    pub description: Patch<String>,
}

/// An entry-tag join row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTag {
    /// Row ID.
    pub id: i64,
    /// The entry side of the pair.
    pub entry_id: i64,
    /// The tag side of the pair.
    pub tag_id: i64,
}

/// Rows affected by a successful mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// IDs of entries that were created, updated, or deleted.
    pub entries: Vec<i64>,
    /// IDs of tags that were created, updated, or deleted.
    pub tags: Vec<i64>,
}

impl ChangeSet {
    fn entry(id: i64) -> Self {
        Self {
            entries: vec![id],
            ..Self::default()
        }
    }

    fn tag(id: i64) -> Self {
        Self {
            tags: vec![id],
            ..Self::default()
        }
    }
}

/// Handle returned by [`JournalStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&ChangeSet) + Send + Sync>;

/// The journal store.
pub struct JournalStore {
    conn: Mutex<Connection>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_subscription: Mutex<u64>,
}

impl JournalStore {
    /// Opens (creating if necessary) the database at `path` and applies
    /// outstanding migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database. Intended for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            listeners: Mutex::new(Vec::new()),
            next_subscription: Mutex::new(0),
        })
    }

    /// Registers a change listener, invoked synchronously after every
    /// successful mutation.
    pub fn subscribe(&self, listener: impl Fn(&ChangeSet) + Send + Sync + 'static) -> SubscriptionId {
        let mut next = self.next_subscription.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next;
        *next += 1;
        drop(next);

        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    /// Removes a previously registered change listener.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    fn notify(&self, changes: &ChangeSet) {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for (_, listener) in listeners.iter() {
            listener(changes);
        }
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // === Entries ===

    /// Creates a new entry and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_entry(&self, entry: &NewEntry) -> Result<Entry, StoreError> {
        let id = {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO entries (title, content, mood, location, weather, is_private, is_favorite)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    entry.title,
                    entry.content,
                    entry.mood,
                    entry.location,
                    entry.weather,
                    entry.is_private,
                    entry.is_favorite,
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.notify(&ChangeSet::entry(id));
        self.get_entry(id)?.ok_or(StoreError::NotFound { kind: "entry", id })
    }

    /// Fetches an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_entry(&self, id: i64) -> Result<Option<Entry>, StoreError> {
        let conn = self.lock_conn();
        let entry = conn
            .query_row(
                "SELECT id, title, content, mood, location, weather, is_private, is_favorite,
                        created_at, updated_at
                 FROM entries WHERE id = ?1",
                [id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Fetches an entry by ID together with its attached tags.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn get_entry_with_tags(&self, id: i64) -> Result<Option<EntryWithTags>, StoreError> {
        let Some(entry) = self.get_entry(id)? else {
            return Ok(None);
        };
        let tags = self.get_entry_tags(id)?;
        Ok(Some(EntryWithTags { entry, tags }))
    }

    /// Lists all entries, newest first. When `tag_ids` is non-empty, only
    /// entries carrying at least one of those tags are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_entries(&self, tag_ids: Option<&[i64]>) -> Result<Vec<Entry>, StoreError> {
        let conn = self.lock_conn();
        let base = "SELECT id, title, content, mood, location, weather, is_private, is_favorite,
                           created_at, updated_at
                    FROM entries";

        let mut entries = Vec::new();
        match tag_ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "{base} WHERE id IN (
                         SELECT entry_id FROM entry_tags WHERE tag_id IN ({placeholders})
                     ) ORDER BY created_at DESC, id DESC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), row_to_entry)?;
                for row in rows {
                    entries.push(row?);
                }
            }
            _ => {
                let sql = format!("{base} ORDER BY created_at DESC, id DESC");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_entry)?;
                for row in rows {
                    entries.push(row?);
                }
            }
        }
        Ok(entries)
    }

    /// Applies a partial update to an entry and returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the entry does not exist.
    pub fn update_entry(&self, id: i64, update: &EntryUpdate) -> Result<Entry, StoreError> {
        let existing = self
            .get_entry(id)?
            .ok_or(StoreError::NotFound { kind: "entry", id })?;

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        let push = |column: &str, value: SqlValue, sets: &mut Vec<String>, values: &mut Vec<SqlValue>| {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len() + 1));
        };

        if let Some(title) = &update.title {
            push("title", SqlValue::from(title.clone()), &mut sets, &mut values);
        }
        if let Some(content) = &update.content {
            push("content", SqlValue::from(content.clone()), &mut sets, &mut values);
        }
        for (column, patch) in [
            ("mood", &update.mood),
            ("location", &update.location),
            ("weather", &update.weather),
        ] {
            match patch {
                Patch::Keep => {}
                Patch::Clear => push(column, SqlValue::Null, &mut sets, &mut values),
                Patch::Set(value) => {
                    push(column, SqlValue::from(value.clone()), &mut sets, &mut values);
                }
            }
        }
        if let Some(is_private) = update.is_private {
            push("is_private", SqlValue::from(is_private), &mut sets, &mut values);
        }
        if let Some(is_favorite) = update.is_favorite {
            push("is_favorite", SqlValue::from(is_favorite), &mut sets, &mut values);
        }

        if sets.is_empty() {
            return Ok(existing);
        }

        {
            let conn = self.lock_conn();
            let sql = format!(
                "UPDATE entries SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                sets.join(", ")
            );
            let mut params: Vec<SqlValue> = vec![SqlValue::from(id)];
            params.extend(values);
            conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        }

        self.notify(&ChangeSet::entry(id));
        self.get_entry(id)?.ok_or(StoreError::NotFound { kind: "entry", id })
    }

    /// Deletes an entry. Join rows cascade.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the entry does not exist.
    pub fn delete_entry(&self, id: i64) -> Result<(), StoreError> {
        let affected = {
            let conn = self.lock_conn();
            conn.execute("DELETE FROM entries WHERE id = ?1", [id])?
        };
        if affected == 0 {
            return Err(StoreError::NotFound { kind: "entry", id });
        }
        self.notify(&ChangeSet::entry(id));
        Ok(())
    }

    // === Tags ===

    /// Creates a new tag and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTagName`] if a tag with the same name
    /// (case-sensitive) already exists.
    pub fn create_tag(&self, tag: &NewTag) -> Result<Tag, StoreError> {
        let id = {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO tags (name, description) VALUES (?1, ?2)",
                rusqlite::params![tag.name, tag.description],
            )
            .map_err(|e| map_constraint(e, &tag.name, 0, 0))?;
            conn.last_insert_rowid()
        };

        self.notify(&ChangeSet::tag(id));
        self.get_tag(id)?.ok_or(StoreError::NotFound { kind: "tag", id })
    }

    /// Fetches a tag by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>, StoreError> {
        let conn = self.lock_conn();
        let tag = conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at FROM tags WHERE id = ?1",
                [id],
                row_to_tag,
            )
            .optional()?;
        Ok(tag)
    }

    /// Lists all tags in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn
            .prepare("SELECT id, name, description, created_at, updated_at FROM tags ORDER BY id")?;
        let rows = stmt.query_map([], row_to_tag)?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Applies a partial update to a tag and returns the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the tag does not exist.
    pub fn update_tag(&self, id: i64, update: &TagUpdate) -> Result<Tag, StoreError> {
        let existing = self
            .get_tag(id)?
            .ok_or(StoreError::NotFound { kind: "tag", id })?;

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(name) = &update.name {
            values.push(SqlValue::from(name.clone()));
            sets.push(format!("name = ?{}", values.len() + 1));
        }
        match &update.description {
            Patch::Keep => {}
            Patch::Clear => {
                values.push(SqlValue::Null);
                sets.push(format!("description = ?{}", values.len() + 1));
            }
            Patch::Set(value) => {
                values.push(SqlValue::from(value.clone()));
                sets.push(format!("description = ?{}", values.len() + 1));
            }
        }

        if sets.is_empty() {
            return Ok(existing);
        }

        {
            let conn = self.lock_conn();
            let sql = format!(
                "UPDATE tags SET {}, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                sets.join(", ")
            );
            let mut params: Vec<SqlValue> = vec![SqlValue::from(id)];
            params.extend(values);
            conn.execute(&sql, rusqlite::params_from_iter(params.iter()))
                .map_err(|e| map_constraint(e, update.name.as_deref().unwrap_or(""), 0, 0))?;
        }

        self.notify(&ChangeSet::tag(id));
        self.get_tag(id)?.ok_or(StoreError::NotFound { kind: "tag", id })
    }

    /// Deletes a tag. Join rows cascade.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the tag does not exist.
    pub fn delete_tag(&self, id: i64) -> Result<(), StoreError> {
        let affected = {
            let conn = self.lock_conn();
            conn.execute("DELETE FROM tags WHERE id = ?1", [id])?
        };
        if affected == 0 {
            return Err(StoreError::NotFound { kind: "tag", id });
        }
        self.notify(&ChangeSet::tag(id));
        Ok(())
    }

    // === Entry tags ===

    /// Attaches a tag to an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if either side of the pair does not
    /// exist, or [`StoreError::DuplicateEntryTag`] if the pair already
    /// exists.
    pub fn add_tag_to_entry(&self, entry_id: i64, tag_id: i64) -> Result<EntryTag, StoreError> {
        self.get_entry(entry_id)?
            .ok_or(StoreError::NotFound { kind: "entry", id: entry_id })?;
        self.get_tag(tag_id)?
            .ok_or(StoreError::NotFound { kind: "tag", id: tag_id })?;

        let id = {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT INTO entry_tags (entry_id, tag_id) VALUES (?1, ?2)",
                rusqlite::params![entry_id, tag_id],
            )
            .map_err(|e| map_constraint(e, "", entry_id, tag_id))?;
            conn.last_insert_rowid()
        };

        self.notify(&ChangeSet {
            entries: vec![entry_id],
            tags: vec![tag_id],
        });
        Ok(EntryTag {
            id,
            entry_id,
            tag_id,
        })
    }

    /// Lists the tags attached to an entry, in attachment order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_entry_tags(&self, entry_id: i64) -> Result<Vec<Tag>, StoreError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name, t.description, t.created_at, t.updated_at
             FROM tags t
             JOIN entry_tags et ON et.tag_id = t.id
             WHERE et.entry_id = ?1
             ORDER BY et.id",
        )?;
        let rows = stmt.query_map([entry_id], row_to_tag)?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        mood: row.get(3)?,
        location: row.get(4)?,
        weather: row.get(5)?,
        is_private: row.get(6)?,
        is_favorite: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Maps SQLite UNIQUE constraint failures to domain errors.
fn map_constraint(error: rusqlite::Error, tag_name: &str, entry_id: i64, tag_id: i64) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, Some(message)) = &error {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if message.contains("tags.name") {
                return StoreError::DuplicateTagName {
                    name: tag_name.to_string(),
                };
            }
            if message.contains("entry_tags") {
                return StoreError::DuplicateEntryTag { entry_id, tag_id };
            }
        }
    }
    StoreError::Database(error)
}
