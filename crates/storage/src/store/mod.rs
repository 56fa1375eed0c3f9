#![forbid(unsafe_code)]

mod config;
mod error;
mod requests;
mod schema;
mod support;

pub use config::*;
pub use error::StoreError;
pub use requests::*;

use rusqlite::{Connection, params};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use support::*;
use tp_core::ids::CategoryId;
use tp_core::model::{Category, CategorySet, GroupStructure, GroupSummary};
use tp_core::names::{CategoryName, DEFAULT_MAX_NAME_LEN};
use tp_core::store::{CategoryStore, StoreFailure};
use tp_core::weight::WeightValue;

const DB_FILE: &str = "topiary.db";

/// One entry of the append-only operation log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpRecord {
    pub seq: i64,
    pub op: String,
    pub category_id: Option<CategoryId>,
    pub payload: serde_json::Value,
    pub created_at_ms: i64,
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(&StoreConfig::at(storage_dir.as_ref()))
    }

    pub fn open_with(config: &StoreConfig) -> Result<Self, StoreError> {
        let storage_dir = config.storage_dir.clone();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(config.busy_timeout)?;
        Self::init(conn, storage_dir)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, storage_dir: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn)?;
        tracing::debug!(
            target: "topiary.storage",
            op = "open",
            storage_dir = %storage_dir.display(),
            "category store opened"
        );
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id ASC"
        ))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_category(row)?);
        }
        Ok(out)
    }

    pub fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        load_category(&self.conn, id)
    }

    pub fn groups(&self) -> Result<Vec<GroupSummary>, StoreError> {
        let set = CategorySet::from_categories(self.categories()?);
        Ok(set
            .iter()
            .filter(|c| c.is_root() && set.has_children(c.id))
            .map(|c| GroupSummary {
                group: c.clone(),
                child_ids: set.child_ids(c.id),
            })
            .collect())
    }

    /// Applies every placement in one transaction; a placement that would
    /// nest a group under a child aborts the whole save.
    pub fn apply_structure(&mut self, structure: &GroupStructure) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        for placement in structure.placements() {
            require_category(&tx, placement.id)?;
            if let Some(parent) = placement.parent_id {
                if parent == placement.id {
                    return Err(StoreError::InvalidInput("category cannot be its own parent"));
                }
                require_category(&tx, parent)?;
            }
            tx.execute(
                "UPDATE categories SET parent_id=?2, updated_at_ms=?3 WHERE id=?1",
                params![
                    placement.id.get(),
                    placement.parent_id.map(CategoryId::get),
                    now_ms
                ],
            )?;
        }
        if let Some((id, parent)) = find_depth_violation(&tx)? {
            return Err(StoreError::DepthViolation { id, parent });
        }
        append_op_tx(
            &tx,
            "restructure",
            None,
            &json!({ "placements": structure.placements() }),
            now_ms,
        )?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "restructure",
            placements = structure.len(),
            "group structure saved"
        );
        Ok(())
    }

    pub fn create(&mut self, name: &CategoryName) -> Result<Category, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        if let Some(existing) = find_name_conflict(&tx, &name.display_key(), name.slug(), None)? {
            return Err(StoreError::NameTaken { name: existing });
        }
        clear_tombstone(&tx, name.slug())?;
        let id = insert_category(&tx, name, InsertFlags::manual(), now_ms)?;
        append_op_tx(
            &tx,
            "create",
            Some(id),
            &json!({ "display_name": name.display(), "slug": name.slug() }),
            now_ms,
        )?;
        let created = require_category(&tx, id)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "create",
            category_id = %id,
            slug = name.slug(),
            "category created"
        );
        Ok(created)
    }

    pub fn rename(&mut self, id: CategoryId, name: &CategoryName) -> Result<Category, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let before = require_category(&tx, id)?;
        if let Some(existing) =
            find_name_conflict(&tx, &name.display_key(), name.slug(), Some(id))?
        {
            return Err(StoreError::NameTaken { name: existing });
        }
        tx.execute(
            "UPDATE categories SET display_name=?2, display_key=?3, slug=?4, updated_at_ms=?5 WHERE id=?1",
            params![id.get(), name.display(), name.display_key(), name.slug(), now_ms],
        )
        .map_err(|err| map_insert_conflict(err, name.display()))?;
        append_op_tx(
            &tx,
            "rename",
            Some(id),
            &json!({ "from": before.display_name, "to": name.display() }),
            now_ms,
        )?;
        let renamed = require_category(&tx, id)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "rename",
            category_id = %id,
            slug = name.slug(),
            "category renamed"
        );
        Ok(renamed)
    }

    /// Deletes a category, releasing its children to root and remembering
    /// its slug so a rediscovery comes back flagged as returned.
    pub fn remove(&mut self, id: CategoryId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let category = require_category(&tx, id)?;
        let released = child_ids(&tx, id)?;
        tx.execute(
            "UPDATE categories SET parent_id=NULL, updated_at_ms=?2 WHERE parent_id=?1",
            params![id.get(), now_ms],
        )?;
        tx.execute("DELETE FROM categories WHERE id=?1", params![id.get()])?;
        write_tombstone(&tx, &category, now_ms)?;
        append_op_tx(
            &tx,
            "delete",
            Some(id),
            &json!({ "slug": category.slug, "released": released }),
            now_ms,
        )?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "delete",
            category_id = %id,
            released = released.len(),
            "category deleted"
        );
        Ok(())
    }

    pub fn set_hidden(&mut self, id: CategoryId, hidden: bool) -> Result<(), StoreError> {
        let op = if hidden { "hide" } else { "unhide" };
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_category(&tx, id)?;
        tx.execute(
            "UPDATE categories SET is_hidden=?2, updated_at_ms=?3 WHERE id=?1",
            params![id.get(), hidden, now_ms],
        )?;
        append_op_tx(&tx, op, Some(id), &json!({}), now_ms)?;
        tx.commit()?;

        tracing::debug!(target: "topiary.storage", op, category_id = %id, "visibility updated");
        Ok(())
    }

    pub fn update_weight(
        &mut self,
        id: CategoryId,
        weight: Option<WeightValue>,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        require_category(&tx, id)?;
        tx.execute(
            "UPDATE categories SET weight=?2, updated_at_ms=?3 WHERE id=?1",
            params![id.get(), weight.map(WeightValue::as_str), now_ms],
        )?;
        append_op_tx(&tx, "set_weight", Some(id), &json!({ "weight": weight }), now_ms)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "set_weight",
            category_id = %id,
            weight = weight.map(WeightValue::as_str).unwrap_or("inherit"),
            "weight updated"
        );
        Ok(())
    }

    /// Marks categories seen and clears their returned flag. Unknown ids
    /// are skipped.
    pub fn mark_seen(&mut self, ids: &[CategoryId]) -> Result<usize, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let mut changed = 0usize;
        for id in ids {
            changed += tx.execute(
                "UPDATE categories SET is_seen=1, is_returned=0, updated_at_ms=?2 \
                 WHERE id=?1 AND (is_seen=0 OR is_returned=1)",
                params![id.get(), now_ms],
            )?;
        }
        append_op_tx(&tx, "acknowledge", None, &json!({ "ids": ids }), now_ms)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "acknowledge",
            requested = ids.len(),
            changed,
            "categories acknowledged"
        );
        Ok(changed)
    }

    /// Folds `source` into `target`: children and article counts move over,
    /// then the source is deleted and tombstoned.
    pub fn merge(&mut self, source: CategoryId, target: CategoryId) -> Result<Category, StoreError> {
        if source == target {
            return Err(StoreError::InvalidInput("cannot merge a category into itself"));
        }
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let source_row = require_category(&tx, source)?;
        require_category(&tx, target)?;

        tx.execute(
            "UPDATE categories SET parent_id=NULL, updated_at_ms=?2 WHERE id=?1 AND parent_id=?3",
            params![target.get(), now_ms, source.get()],
        )?;
        tx.execute(
            "UPDATE categories SET parent_id=?2, updated_at_ms=?3 WHERE parent_id=?1",
            params![source.get(), target.get(), now_ms],
        )?;
        tx.execute(
            "UPDATE categories SET article_count=article_count + ?2, updated_at_ms=?3 WHERE id=?1",
            params![target.get(), count_to_sqlite(source_row.article_count)?, now_ms],
        )?;
        tx.execute("DELETE FROM categories WHERE id=?1", params![source.get()])?;
        if let Some((id, parent)) = find_depth_violation(&tx)? {
            return Err(StoreError::DepthViolation { id, parent });
        }
        write_tombstone(&tx, &source_row, now_ms)?;
        append_op_tx(
            &tx,
            "merge",
            Some(target),
            &json!({ "source": source, "source_slug": source_row.slug }),
            now_ms,
        )?;
        let merged = require_category(&tx, target)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "merge",
            category_id = %target,
            source = %source,
            "categories merged"
        );
        Ok(merged)
    }

    pub fn count_unseen(&self) -> Result<usize, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(1) FROM categories WHERE is_seen=0 AND is_hidden=0",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidInput("negative count"))
    }

    /// Discovery boundary. A known slug gains articles, and comes back
    /// unhidden and flagged as returned if it was hidden. A tombstoned slug is
    /// recreated flagged as returned. Anything else arrives unseen.
    pub fn discover(&mut self, request: DiscoverRequest) -> Result<Category, StoreError> {
        let name = CategoryName::parse(&request.name, DEFAULT_MAX_NAME_LEN)
            .map_err(|err| StoreError::InvalidInput(err.message()))?;
        let articles = count_to_sqlite(request.articles)?;
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        let (id, outcome) = match find_by_slug(&tx, name.slug())? {
            Some(id) => {
                let resurfaced = tx.execute(
                    "UPDATE categories SET is_hidden=0, is_seen=0, is_returned=1 \
                     WHERE id=?1 AND is_hidden=1",
                    params![id.get()],
                )? > 0;
                tx.execute(
                    "UPDATE categories SET article_count=article_count + ?2, updated_at_ms=?3 WHERE id=?1",
                    params![id.get(), articles, now_ms],
                )?;
                (id, if resurfaced { "returned" } else { "known" })
            }
            None => {
                let returned = clear_tombstone(&tx, name.slug())?;
                let flags = InsertFlags {
                    is_returned: returned,
                    article_count: articles,
                    ..InsertFlags::discovered()
                };
                let id = insert_category(&tx, &name, flags, now_ms)?;
                (id, if returned { "returned" } else { "new" })
            }
        };
        append_op_tx(
            &tx,
            "discover",
            Some(id),
            &json!({ "slug": name.slug(), "outcome": outcome, "articles": request.articles }),
            now_ms,
        )?;
        let category = require_category(&tx, id)?;
        tx.commit()?;

        tracing::debug!(
            target: "topiary.storage",
            op = "discover",
            category_id = %id,
            outcome,
            "label discovered"
        );
        Ok(category)
    }

    pub fn is_tombstoned(&self, slug: &str) -> Result<bool, StoreError> {
        is_tombstoned(&self.conn, slug)
    }

    pub fn ops_log(&self, request: OpsLogRequest) -> Result<Vec<OpRecord>, StoreError> {
        let limit = to_sqlite_i64(request.limit)?;
        let offset = to_sqlite_i64(request.offset)?;

        let mut stmt = self.conn.prepare(
            "SELECT seq, op, category_id, payload_json, created_at_ms \
             FROM category_ops \
             ORDER BY seq ASC \
             LIMIT ?1 OFFSET ?2",
        )?;
        let mut rows = stmt.query(params![limit, offset])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload_json = row.get::<_, String>(3)?;
            out.push(OpRecord {
                seq: row.get::<_, i64>(0)?,
                op: row.get::<_, String>(1)?,
                category_id: row.get::<_, Option<i64>>(2)?.map(CategoryId::new),
                payload: serde_json::from_str(&payload_json)?,
                created_at_ms: row.get::<_, i64>(4)?,
            });
        }
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug)]
struct InsertFlags {
    is_seen: bool,
    is_manually_created: bool,
    is_returned: bool,
    article_count: i64,
}

impl InsertFlags {
    fn manual() -> Self {
        Self {
            is_seen: true,
            is_manually_created: true,
            is_returned: false,
            article_count: 0,
        }
    }

    fn discovered() -> Self {
        Self {
            is_seen: false,
            is_manually_created: false,
            is_returned: false,
            article_count: 0,
        }
    }
}

fn insert_category(
    conn: &Connection,
    name: &CategoryName,
    flags: InsertFlags,
    now_ms: i64,
) -> Result<CategoryId, StoreError> {
    conn.execute(
        "INSERT INTO categories(display_name, display_key, slug, is_seen, is_manually_created, \
           is_returned, article_count, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            name.display(),
            name.display_key(),
            name.slug(),
            flags.is_seen,
            flags.is_manually_created,
            flags.is_returned,
            flags.article_count,
            now_ms
        ],
    )
    .map_err(|err| map_insert_conflict(err, name.display()))?;
    Ok(CategoryId::new(conn.last_insert_rowid()))
}

impl CategoryStore for SqliteStore {
    fn list_categories(&self) -> Result<Vec<Category>, StoreFailure> {
        Ok(self.categories()?)
    }

    fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreFailure> {
        Ok(self.groups()?)
    }

    fn save_group_structure(&mut self, structure: &GroupStructure) -> Result<(), StoreFailure> {
        Ok(self.apply_structure(structure)?)
    }

    fn create_category(&mut self, name: &CategoryName) -> Result<Category, StoreFailure> {
        Ok(self.create(name)?)
    }

    fn rename_category(
        &mut self,
        id: CategoryId,
        name: &CategoryName,
    ) -> Result<Category, StoreFailure> {
        Ok(self.rename(id, name)?)
    }

    fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        Ok(self.remove(id)?)
    }

    fn hide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        Ok(self.set_hidden(id, true)?)
    }

    fn unhide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        Ok(self.set_hidden(id, false)?)
    }

    fn set_weight(
        &mut self,
        id: CategoryId,
        weight: Option<WeightValue>,
    ) -> Result<(), StoreFailure> {
        Ok(self.update_weight(id, weight)?)
    }

    fn acknowledge(&mut self, ids: &[CategoryId]) -> Result<(), StoreFailure> {
        self.mark_seen(ids)?;
        Ok(())
    }

    fn merge_categories(
        &mut self,
        source: CategoryId,
        target: CategoryId,
    ) -> Result<Category, StoreFailure> {
        Ok(self.merge(source, target)?)
    }

    fn unseen_count(&self) -> Result<usize, StoreFailure> {
        Ok(self.count_unseen()?)
    }
}
