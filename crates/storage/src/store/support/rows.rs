#![forbid(unsafe_code)]

use crate::store::StoreError;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tp_core::ids::CategoryId;
use tp_core::model::Category;
use tp_core::weight::WeightValue;

pub(in crate::store) const CATEGORY_COLUMNS: &str = "id, display_name, slug, weight, parent_id, \
     is_hidden, is_seen, is_manually_created, is_returned, article_count";

pub(in crate::store) fn read_category(row: &Row<'_>) -> Result<Category, StoreError> {
    let weight = row
        .get::<_, Option<String>>(3)?
        .map(|raw| WeightValue::parse(&raw))
        .transpose()
        .map_err(|_| StoreError::InvalidInput("invalid weight in category row"))?;
    let article_count = u64::try_from(row.get::<_, i64>(9)?)
        .map_err(|_| StoreError::InvalidInput("negative article count"))?;

    Ok(Category {
        id: CategoryId::new(row.get::<_, i64>(0)?),
        display_name: row.get::<_, String>(1)?,
        slug: row.get::<_, String>(2)?,
        weight,
        parent_id: row.get::<_, Option<i64>>(4)?.map(CategoryId::new),
        is_hidden: row.get::<_, bool>(5)?,
        is_seen: row.get::<_, bool>(6)?,
        is_manually_created: row.get::<_, bool>(7)?,
        is_returned: row.get::<_, bool>(8)?,
        article_count,
    })
}

pub(in crate::store) fn load_category(
    conn: &Connection,
    id: CategoryId,
) -> Result<Option<Category>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id=?1"
    ))?;
    let mut rows = stmt.query(params![id.get()])?;
    match rows.next()? {
        Some(row) => Ok(Some(read_category(row)?)),
        None => Ok(None),
    }
}

pub(in crate::store) fn require_category(
    conn: &Connection,
    id: CategoryId,
) -> Result<Category, StoreError> {
    load_category(conn, id)?.ok_or(StoreError::UnknownId(id))
}

pub(in crate::store) fn find_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<CategoryId>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM categories WHERE slug=?1",
            params![slug],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .map(CategoryId::new))
}

/// Display name of another category whose display key or slug collides.
pub(in crate::store) fn find_name_conflict(
    conn: &Connection,
    display_key: &str,
    slug: &str,
    except: Option<CategoryId>,
) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT display_name FROM categories \
             WHERE (display_key=?1 OR slug=?2) AND (?3 IS NULL OR id <> ?3) \
             LIMIT 1",
            params![display_key, slug, except.map(CategoryId::get)],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

/// First child whose parent is itself a child.
pub(in crate::store) fn find_depth_violation(
    conn: &Connection,
) -> Result<Option<(CategoryId, CategoryId)>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT c.id, c.parent_id FROM categories c \
             JOIN categories p ON p.id = c.parent_id \
             WHERE p.parent_id IS NOT NULL \
             ORDER BY c.id LIMIT 1",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?
        .map(|(id, parent)| (CategoryId::new(id), CategoryId::new(parent))))
}

pub(in crate::store) fn child_ids(
    conn: &Connection,
    parent: CategoryId,
) -> Result<Vec<CategoryId>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM categories WHERE parent_id=?1 ORDER BY id")?;
    let mut rows = stmt.query(params![parent.get()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(CategoryId::new(row.get::<_, i64>(0)?));
    }
    Ok(out)
}

pub(in crate::store) fn is_tombstoned(conn: &Connection, slug: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM category_tombstones WHERE slug=?1",
            params![slug],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn write_tombstone(
    conn: &Connection,
    category: &Category,
    now_ms: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO category_tombstones(slug, display_name, deleted_at_ms) VALUES (?1, ?2, ?3) \
         ON CONFLICT(slug) DO UPDATE SET display_name=excluded.display_name, deleted_at_ms=excluded.deleted_at_ms",
        params![category.slug, category.display_name, now_ms],
    )?;
    Ok(())
}

pub(in crate::store) fn clear_tombstone(conn: &Connection, slug: &str) -> Result<bool, StoreError> {
    let removed = conn.execute(
        "DELETE FROM category_tombstones WHERE slug=?1",
        params![slug],
    )?;
    Ok(removed > 0)
}
