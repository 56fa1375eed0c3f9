#![forbid(unsafe_code)]

//! In-process [`CategoryStore`] with failure injection and a discovery
//! boundary, used by tests and embedders without persistence.

use crate::ids::CategoryId;
use crate::model::{Category, CategorySet, GroupStructure, GroupSummary, InvariantViolation};
use crate::names::{CategoryName, DEFAULT_MAX_NAME_LEN};
use crate::novelty::acknowledge_category;
use crate::store::{CategoryStore, StoreFailure};
use crate::weight::WeightValue;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreOp {
    SaveGroupStructure,
    CreateCategory,
    RenameCategory,
    DeleteCategory,
    HideCategory,
    UnhideCategory,
    SetWeight,
    Acknowledge,
    MergeCategories,
}

#[derive(Clone, Debug)]
pub struct InMemoryStore {
    categories: CategorySet,
    tombstones: BTreeSet<String>,
    next_id: i64,
    pending_failures: Vec<StoreOp>,
    calls: Vec<StoreOp>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            categories: CategorySet::new(),
            tombstones: BTreeSet::new(),
            next_id: 1,
            pending_failures: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let categories = CategorySet::from_categories(categories);
        let next_id = categories.ids().map(|id| id.get()).max().unwrap_or(0) + 1;
        Self {
            categories,
            next_id,
            ..Self::new()
        }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// The next call of `op` fails with [`StoreFailure::Unavailable`].
    pub fn fail_next(&mut self, op: StoreOp) {
        self.pending_failures.push(op);
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> &[StoreOp] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_tombstoned(&self, slug: &str) -> bool {
        self.tombstones.contains(slug)
    }

    /// Discovery boundary: a known slug gains an article, a hidden or
    /// tombstoned slug comes back unhidden and flagged as returned, anything
    /// else arrives unseen.
    pub fn discover(&mut self, raw_name: &str) -> Result<Category, StoreFailure> {
        let name = CategoryName::parse(raw_name, DEFAULT_MAX_NAME_LEN)
            .map_err(|err| StoreFailure::Rejected(err.message().to_string()))?;

        if let Some(existing) = self.categories.find_by_slug(name.slug()).map(|c| c.id) {
            self.categories.update(existing, |c| {
                c.article_count += 1;
                if c.is_hidden {
                    c.is_hidden = false;
                    c.is_seen = false;
                    c.is_returned = true;
                }
            });
            return self.get(existing);
        }

        let returned = self.tombstones.remove(name.slug());
        let id = self.allocate_id();
        let mut category = Category::discovered(id, name.display());
        category.slug = name.slug().to_string();
        category.is_returned = returned;
        category.article_count = 1;
        self.categories.upsert(category.clone());
        Ok(category)
    }

    fn record(&mut self, op: StoreOp) -> Result<(), StoreFailure> {
        self.calls.push(op);
        if let Some(index) = self.pending_failures.iter().position(|p| *p == op) {
            self.pending_failures.remove(index);
            return Err(StoreFailure::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> CategoryId {
        let id = CategoryId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn get(&self, id: CategoryId) -> Result<Category, StoreFailure> {
        self.categories
            .get(id)
            .cloned()
            .ok_or(StoreFailure::NotFound(id))
    }

    fn ensure_unique(&self, name: &CategoryName, except: Option<CategoryId>) -> Result<(), StoreFailure> {
        match self
            .categories
            .name_conflict(&name.display_key(), name.slug(), except)
        {
            Some(existing) => Err(StoreFailure::Conflict(format!(
                "category '{}' already exists",
                existing.display_name
            ))),
            None => Ok(()),
        }
    }
}

fn depth_violation(set: &CategorySet) -> Option<InvariantViolation> {
    set.check_invariants()
        .into_iter()
        .find(|v| !matches!(v, InvariantViolation::DuplicateName { .. }))
}

impl CategoryStore for InMemoryStore {
    fn list_categories(&self) -> Result<Vec<Category>, StoreFailure> {
        Ok(self.categories.to_vec())
    }

    fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreFailure> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.is_root() && self.categories.has_children(c.id))
            .map(|c| GroupSummary {
                group: c.clone(),
                child_ids: self.categories.child_ids(c.id),
            })
            .collect())
    }

    fn save_group_structure(&mut self, structure: &GroupStructure) -> Result<(), StoreFailure> {
        self.record(StoreOp::SaveGroupStructure)?;
        let mut next = self.categories.clone();
        for placement in structure.placements() {
            if !next.contains(placement.id) {
                return Err(StoreFailure::NotFound(placement.id));
            }
            if let Some(parent) = placement.parent_id {
                if !next.contains(parent) {
                    return Err(StoreFailure::NotFound(parent));
                }
            }
            next.set_parent(placement.id, placement.parent_id);
        }
        if let Some(violation) = depth_violation(&next) {
            return Err(StoreFailure::Rejected(format!(
                "structure breaks two-level hierarchy: {violation:?}"
            )));
        }
        self.categories = next;
        Ok(())
    }

    fn create_category(&mut self, name: &CategoryName) -> Result<Category, StoreFailure> {
        self.record(StoreOp::CreateCategory)?;
        self.ensure_unique(name, None)?;
        self.tombstones.remove(name.slug());
        let id = self.allocate_id();
        let mut category = Category::manual(id, name.display());
        category.slug = name.slug().to_string();
        self.categories.upsert(category.clone());
        Ok(category)
    }

    fn rename_category(
        &mut self,
        id: CategoryId,
        name: &CategoryName,
    ) -> Result<Category, StoreFailure> {
        self.record(StoreOp::RenameCategory)?;
        self.get(id)?;
        self.ensure_unique(name, Some(id))?;
        self.categories.update(id, |c| {
            c.display_name = name.display().to_string();
            c.slug = name.slug().to_string();
        });
        self.get(id)
    }

    fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        self.record(StoreOp::DeleteCategory)?;
        let category = self.get(id)?;
        for child in self.categories.child_ids(id) {
            self.categories.set_parent(child, None);
        }
        self.categories.remove(id);
        self.tombstones.insert(category.slug);
        Ok(())
    }

    fn hide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        self.record(StoreOp::HideCategory)?;
        self.get(id)?;
        self.categories.update(id, |c| c.is_hidden = true);
        Ok(())
    }

    fn unhide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure> {
        self.record(StoreOp::UnhideCategory)?;
        self.get(id)?;
        self.categories.update(id, |c| c.is_hidden = false);
        Ok(())
    }

    fn set_weight(
        &mut self,
        id: CategoryId,
        weight: Option<WeightValue>,
    ) -> Result<(), StoreFailure> {
        self.record(StoreOp::SetWeight)?;
        self.get(id)?;
        self.categories.update(id, |c| c.weight = weight);
        Ok(())
    }

    fn acknowledge(&mut self, ids: &[CategoryId]) -> Result<(), StoreFailure> {
        self.record(StoreOp::Acknowledge)?;
        for id in ids {
            self.categories.update(*id, acknowledge_category);
        }
        Ok(())
    }

    fn merge_categories(
        &mut self,
        source: CategoryId,
        target: CategoryId,
    ) -> Result<Category, StoreFailure> {
        self.record(StoreOp::MergeCategories)?;
        if source == target {
            return Err(StoreFailure::Rejected(
                "source and target must be different".to_string(),
            ));
        }
        let source_row = self.get(source)?;
        self.get(target)?;

        let mut next = self.categories.clone();
        for child in next.child_ids(source) {
            let reparent = if child == target { None } else { Some(target) };
            next.set_parent(child, reparent);
        }
        next.update(target, |c| c.article_count += source_row.article_count);
        next.remove(source);
        if let Some(violation) = depth_violation(&next) {
            return Err(StoreFailure::Rejected(format!(
                "merge breaks two-level hierarchy: {violation:?}"
            )));
        }
        self.categories = next;
        self.tombstones.insert(source_row.slug);
        self.get(target)
    }

    fn unseen_count(&self) -> Result<usize, StoreFailure> {
        Ok(self
            .categories
            .iter()
            .filter(|c| !c.is_seen && !c.is_hidden)
            .count())
    }
}
