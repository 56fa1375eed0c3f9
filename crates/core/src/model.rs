#![forbid(unsafe_code)]

//! Flat, id-indexed category arena with a derived children index.

use crate::ids::CategoryId;
use crate::names::{fold_case, normalize_display_name, slugify};
use crate::weight::{self, ResolvedWeight, WeightValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub display_name: String,
    pub slug: String,
    #[serde(default)]
    pub weight: Option<WeightValue>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_seen: bool,
    #[serde(default)]
    pub is_manually_created: bool,
    /// Set by the store when a deleted label was rediscovered.
    #[serde(default)]
    pub is_returned: bool,
    #[serde(default)]
    pub article_count: u64,
}

impl Category {
    /// A root category as produced by the discovery process: unseen, no override.
    pub fn discovered(id: CategoryId, name: &str) -> Self {
        let display_name = normalize_display_name(name);
        let slug = slugify(&display_name);
        Self {
            id,
            display_name,
            slug,
            weight: None,
            parent_id: None,
            is_hidden: false,
            is_seen: false,
            is_manually_created: false,
            is_returned: false,
            article_count: 0,
        }
    }

    /// A root category created explicitly by the user; counts as seen.
    pub fn manual(id: CategoryId, name: &str) -> Self {
        Self {
            is_seen: true,
            is_manually_created: true,
            ..Self::discovered(id, name)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn display_key(&self) -> String {
        fold_case(&self.display_name)
    }
}

/// One `{id, parent_id}` assignment inside a group structure save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Placement {
    pub id: CategoryId,
    pub parent_id: Option<CategoryId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStructure {
    placements: Vec<Placement>,
}

impl GroupStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted by id; a later placement for the same id replaces an earlier one.
    pub fn from_placements(placements: impl IntoIterator<Item = Placement>) -> Self {
        let mut by_id = BTreeMap::new();
        for placement in placements {
            by_id.insert(placement.id, placement);
        }
        Self {
            placements: by_id.into_values().collect(),
        }
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.placements.iter().map(|p| p.id)
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }
}

/// A group as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: Category,
    pub child_ids: Vec<CategoryId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    SelfParent {
        id: CategoryId,
    },
    /// `id`'s parent is itself a child.
    NestedParent {
        id: CategoryId,
        parent: CategoryId,
    },
    DuplicateName {
        first: CategoryId,
        second: CategoryId,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategorySet {
    entries: BTreeMap<CategoryId, Category>,
    children: BTreeMap<CategoryId, BTreeSet<CategoryId>>,
}

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut set = Self::new();
        for category in categories {
            set.upsert(category);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> + '_ {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.entries.keys().copied()
    }

    pub fn to_vec(&self) -> Vec<Category> {
        self.entries.values().cloned().collect()
    }

    pub fn child_ids(&self, parent: CategoryId) -> Vec<CategoryId> {
        self.children
            .get(&parent)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn children_of(&self, parent: CategoryId) -> impl Iterator<Item = &Category> + '_ {
        self.children
            .get(&parent)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.entries.get(id))
    }

    pub fn has_children(&self, id: CategoryId) -> bool {
        self.children.get(&id).is_some_and(|ids| !ids.is_empty())
    }

    pub fn parent_of(&self, id: CategoryId) -> Option<&Category> {
        self.get(id)
            .and_then(|c| c.parent_id)
            .and_then(|parent| self.get(parent))
    }

    /// Inserts or replaces a category, returning the previous value.
    pub fn upsert(&mut self, category: Category) -> Option<Category> {
        let id = category.id;
        let previous = self.entries.insert(id, category);
        if let Some(parent) = previous.as_ref().and_then(|p| p.parent_id) {
            self.unlink(id, parent);
        }
        if let Some(parent) = self.entries.get(&id).and_then(|c| c.parent_id) {
            self.children.entry(parent).or_default().insert(id);
        }
        previous
    }

    pub fn remove(&mut self, id: CategoryId) -> Option<Category> {
        let removed = self.entries.remove(&id)?;
        if let Some(parent) = removed.parent_id {
            self.unlink(id, parent);
        }
        Some(removed)
    }

    /// Applies `edit` to a category and re-indexes it. Returns false for unknown ids.
    pub fn update(&mut self, id: CategoryId, edit: impl FnOnce(&mut Category)) -> bool {
        let Some(mut category) = self.entries.get(&id).cloned() else {
            return false;
        };
        edit(&mut category);
        category.id = id;
        self.upsert(category);
        true
    }

    pub fn set_parent(&mut self, id: CategoryId, parent: Option<CategoryId>) -> bool {
        self.update(id, |c| c.parent_id = parent)
    }

    /// Another category whose display name (case-insensitive) or slug collides.
    pub fn name_conflict(
        &self,
        display_key: &str,
        slug: &str,
        except: Option<CategoryId>,
    ) -> Option<&Category> {
        self.entries.values().find(|c| {
            Some(c.id) != except && (c.slug == slug || c.display_key() == display_key)
        })
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&Category> {
        self.entries.values().find(|c| c.slug == slug)
    }

    pub fn effective_weight(&self, id: CategoryId) -> Option<WeightValue> {
        let category = self.get(id)?;
        let parent_weight = self.parent_of(id).and_then(|p| p.weight);
        Some(weight::effective_weight(category, parent_weight))
    }

    pub fn resolved_weight(&self, id: CategoryId) -> Option<ResolvedWeight> {
        weight::resolve(self, id)
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        for category in self.entries.values() {
            let Some(parent_id) = category.parent_id else {
                continue;
            };
            if parent_id == category.id {
                out.push(InvariantViolation::SelfParent { id: category.id });
                continue;
            }
            if self.get(parent_id).is_some_and(|p| p.parent_id.is_some()) {
                out.push(InvariantViolation::NestedParent {
                    id: category.id,
                    parent: parent_id,
                });
            }
        }

        let mut seen_keys: BTreeMap<String, CategoryId> = BTreeMap::new();
        let mut seen_slugs: BTreeMap<&str, CategoryId> = BTreeMap::new();
        for category in self.entries.values() {
            let clash = seen_keys
                .insert(category.display_key(), category.id)
                .or_else(|| seen_slugs.insert(category.slug.as_str(), category.id));
            if let Some(first) = clash {
                out.push(InvariantViolation::DuplicateName {
                    first,
                    second: category.id,
                });
            }
        }
        out
    }

    fn unlink(&mut self, id: CategoryId, parent: CategoryId) {
        if let Some(ids) = self.children.get_mut(&parent) {
            ids.remove(&id);
            if ids.is_empty() {
                self.children.remove(&parent);
            }
        }
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<T: IntoIterator<Item = Category>>(iter: T) -> Self {
        Self::from_categories(iter)
    }
}
