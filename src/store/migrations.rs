//! Versioned schema migrations for the journal database.
//!
//! Applied versions are tracked in a `schema_versions` table so that opening
//! an existing database only runs the migrations it is missing.

use rusqlite::Connection;

use crate::error::StoreError;

/// A single schema migration.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: "
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            mood TEXT,
            location TEXT,
            weather TEXT,
            is_private INTEGER DEFAULT 1 NOT NULL CHECK (is_private IN (0, 1)),
            is_favorite INTEGER DEFAULT 0 NOT NULL CHECK (is_favorite IN (0, 1)),
            created_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL,
            updated_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at);
        CREATE INDEX IF NOT EXISTS idx_entries_is_private ON entries(is_private);

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL,
            updated_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tags_name ON tags(name);

        CREATE TABLE IF NOT EXISTS entry_tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            entry_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            created_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL,
            updated_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL,
            FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE,
            UNIQUE (entry_id, tag_id)
        );
        CREATE INDEX IF NOT EXISTS idx_entry_tags_entry_id ON entry_tags(entry_id);
        CREATE INDEX IF NOT EXISTS idx_entry_tags_tag_id ON entry_tags(tag_id);
    ",
}];

/// Applies all outstanding migrations to the connection.
///
/// # Errors
///
/// Returns an error if any migration statement fails.
pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT DEFAULT (CURRENT_TIMESTAMP) NOT NULL
        );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_versions",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::debug!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_versions (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_versions", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_versions", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn entry_tags_pair_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO entries (title, content) VALUES ('a', 'b')",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO tags (name) VALUES ('t')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO entry_tags (entry_id, tag_id) VALUES (1, 1)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO entry_tags (entry_id, tag_id) VALUES (1, 1)",
            [],
        );
        assert!(dup.is_err());
    }
}
