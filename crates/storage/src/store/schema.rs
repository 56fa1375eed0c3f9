#![forbid(unsafe_code)]

use super::StoreError;
use super::support::now_ms;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const REQUIRED_TABLES: [&str; 4] = [
    "store_state",
    "categories",
    "category_tombstones",
    "category_ops",
];

/// Refuses databases this build did not create. An empty database passes.
pub(crate) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = REQUIRED_TABLES.into_iter().collect();
    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::ResetRequired("unsupported tables detected"));
    }
    if required.iter().any(|table| !tables.contains(*table)) {
        return Err(StoreError::ResetRequired("required table is missing"));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::ResetRequired("schema version mismatch")),
        None => Err(StoreError::ResetRequired("schema state row is missing")),
    }
}

pub(crate) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          display_name TEXT NOT NULL,
          display_key TEXT NOT NULL UNIQUE,
          slug TEXT NOT NULL UNIQUE,
          weight TEXT,
          parent_id INTEGER,
          is_hidden INTEGER NOT NULL DEFAULT 0,
          is_seen INTEGER NOT NULL DEFAULT 0,
          is_manually_created INTEGER NOT NULL DEFAULT 0,
          is_returned INTEGER NOT NULL DEFAULT 0,
          article_count INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          FOREIGN KEY(parent_id) REFERENCES categories(id) ON DELETE SET NULL,
          CHECK(parent_id IS NULL OR parent_id <> id),
          CHECK(weight IS NULL OR weight IN ('blocked', 'low', 'neutral', 'medium', 'high')),
          CHECK(article_count >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_categories_parent
          ON categories(parent_id, id);

        CREATE TABLE IF NOT EXISTS category_tombstones (
          slug TEXT PRIMARY KEY,
          display_name TEXT NOT NULL,
          deleted_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS category_ops (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          op TEXT NOT NULL,
          category_id INTEGER,
          payload_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
