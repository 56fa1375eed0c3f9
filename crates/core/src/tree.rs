#![forbid(unsafe_code)]

//! Derives the two-level presentation tree from a flat category set.

use crate::ids::CategoryId;
use crate::model::Category;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupNode {
    pub group: Category,
    pub children: Vec<Category>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTree {
    /// Ordered by the group's display name.
    pub groups: Vec<GroupNode>,
    pub ungrouped: Vec<Category>,
    pub hidden: Vec<Category>,
}

impl CategoryTree {
    pub fn group(&self, id: CategoryId) -> Option<&GroupNode> {
        self.groups.iter().find(|node| node.group.id == id)
    }

    pub fn is_group(&self, id: CategoryId) -> bool {
        self.group(id).is_some()
    }

    pub fn is_ungrouped(&self, id: CategoryId) -> bool {
        self.ungrouped.iter().any(|c| c.id == id)
    }

    pub fn is_hidden(&self, id: CategoryId) -> bool {
        self.hidden.iter().any(|c| c.id == id)
    }

    /// Group id → visible children, the shape the presentation layer keys on.
    pub fn children_by_group(&self) -> BTreeMap<CategoryId, Vec<Category>> {
        self.groups
            .iter()
            .map(|node| (node.group.id, node.children.clone()))
            .collect()
    }

    /// Case-insensitive substring search. A matching group keeps all of its
    /// children; otherwise only matching children survive, and a group with
    /// none is dropped.
    pub fn filter(&self, query: &str) -> CategoryTree {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.clone();
        }
        let matches = |c: &Category| c.display_name.to_lowercase().contains(&query);

        let groups = self
            .groups
            .iter()
            .filter_map(|node| {
                if matches(&node.group) {
                    return Some(node.clone());
                }
                let children: Vec<Category> =
                    node.children.iter().filter(|c| matches(c)).cloned().collect();
                if children.is_empty() {
                    None
                } else {
                    Some(GroupNode {
                        group: node.group.clone(),
                        children,
                    })
                }
            })
            .collect();

        CategoryTree {
            groups,
            ungrouped: self.ungrouped.iter().filter(|c| matches(c)).cloned().collect(),
            hidden: self.hidden.iter().filter(|c| matches(c)).cloned().collect(),
        }
    }
}

/// Display-name ordering: case-insensitive first, then exact text, then id.
///
/// This approximates locale-aware ordering by comparing case-folded code
/// points. It is stable and total but not a collation: accented letters sort
/// after their plain ASCII range (`"Zebra" < "Émile"`).
pub fn compare_names(a: &Category, b: &Category) -> Ordering {
    a.display_key()
        .cmp(&b.display_key())
        .then_with(|| a.display_name.cmp(&b.display_name))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn build_tree<'a>(categories: impl IntoIterator<Item = &'a Category>) -> CategoryTree {
    let by_id: BTreeMap<CategoryId, &Category> =
        categories.into_iter().map(|c| (c.id, c)).collect();

    let mut children: BTreeMap<CategoryId, Vec<Category>> = BTreeMap::new();
    let mut detached: BTreeSet<CategoryId> = BTreeSet::new();
    let mut hidden = Vec::new();

    for category in by_id.values() {
        if category.is_hidden {
            hidden.push((*category).clone());
            continue;
        }
        let Some(parent_id) = category.parent_id else {
            continue;
        };
        let attachable = by_id
            .get(&parent_id)
            .is_some_and(|parent| !parent.is_hidden && parent.is_root() && parent.id != category.id);
        if attachable {
            children
                .entry(parent_id)
                .or_default()
                .push((*category).clone());
        } else {
            // Parent hidden, missing or nested: keep the child reachable at top level.
            detached.insert(category.id);
        }
    }

    let mut groups = Vec::new();
    let mut ungrouped = Vec::new();
    for category in by_id.values() {
        if category.is_hidden {
            continue;
        }
        if category.is_root() {
            match children.remove(&category.id) {
                Some(mut kids) => {
                    kids.sort_by(compare_names);
                    groups.push(GroupNode {
                        group: (*category).clone(),
                        children: kids,
                    });
                }
                None => ungrouped.push((*category).clone()),
            }
        } else if detached.contains(&category.id) {
            ungrouped.push((*category).clone());
        }
    }

    groups.sort_by(|a, b| compare_names(&a.group, &b.group));
    ungrouped.sort_by(compare_names);
    hidden.sort_by(compare_names);

    CategoryTree {
        groups,
        ungrouped,
        hidden,
    }
}
