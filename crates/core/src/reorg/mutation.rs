#![forbid(unsafe_code)]

use crate::coordinator::MutationKey;
use crate::ids::CategoryId;
use crate::model::{CategorySet, GroupStructure, Placement};
use crate::names::CategoryName;
use crate::novelty::acknowledge_category;
use crate::store::{CategoryStore, StoreFailure};
use crate::weight::WeightValue;
use std::collections::BTreeSet;

/// A validated change: the local prediction and the store calls that make
/// it durable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Restructure {
        structure: GroupStructure,
    },
    Rename {
        id: CategoryId,
        name: CategoryName,
    },
    /// `released` are children of deleted categories that survive at root.
    Delete {
        ids: Vec<CategoryId>,
        released: Vec<CategoryId>,
    },
    SetHidden {
        ids: Vec<CategoryId>,
        hidden: bool,
    },
    SetWeight {
        id: CategoryId,
        weight: Option<WeightValue>,
        acknowledge: bool,
    },
    Acknowledge {
        ids: Vec<CategoryId>,
    },
    Merge {
        source: CategoryId,
        target: CategoryId,
    },
}

impl Mutation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Restructure { .. } => "restructure",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::SetHidden { hidden: true, .. } => "hide",
            Self::SetHidden { hidden: false, .. } => "unhide",
            Self::SetWeight { .. } => "set_weight",
            Self::Acknowledge { .. } => "acknowledge",
            Self::Merge { .. } => "merge",
        }
    }

    pub fn key(&self) -> MutationKey {
        match self {
            Self::Restructure { .. } | Self::Delete { .. } | Self::Merge { .. } => {
                MutationKey::Structure
            }
            Self::Rename { id, .. } | Self::SetWeight { id, .. } => MutationKey::Category(*id),
            Self::SetHidden { ids, .. } | Self::Acknowledge { ids } => MutationKey::for_ids(ids),
        }
    }

    /// Entries whose stored state the prediction touches.
    pub fn affected(&self, view: &CategorySet) -> BTreeSet<CategoryId> {
        match self {
            Self::Restructure { structure } => structure.ids().collect(),
            Self::Rename { id, .. } | Self::SetWeight { id, .. } => BTreeSet::from([*id]),
            Self::Delete { ids, released } => ids.iter().chain(released).copied().collect(),
            Self::SetHidden { ids, .. } | Self::Acknowledge { ids } => {
                ids.iter().copied().collect()
            }
            Self::Merge { source, target } => {
                let mut out: BTreeSet<CategoryId> = view.child_ids(*source).into_iter().collect();
                out.insert(*source);
                out.insert(*target);
                out
            }
        }
    }

    /// Predicts the store outcome on the local view.
    pub fn apply(&self, view: &mut CategorySet) {
        match self {
            Self::Restructure { structure } => {
                for placement in structure.placements() {
                    view.set_parent(placement.id, placement.parent_id);
                }
            }
            Self::Rename { id, name } => {
                view.update(*id, |c| {
                    c.display_name = name.display().to_string();
                    c.slug = name.slug().to_string();
                });
            }
            Self::Delete { ids, released } => {
                for id in released {
                    view.set_parent(*id, None);
                }
                for id in ids {
                    view.remove(*id);
                }
            }
            Self::SetHidden { ids, hidden } => {
                for id in ids {
                    view.update(*id, |c| c.is_hidden = *hidden);
                }
            }
            Self::SetWeight {
                id,
                weight,
                acknowledge,
            } => {
                view.update(*id, |c| {
                    c.weight = *weight;
                    if *acknowledge {
                        acknowledge_category(c);
                    }
                });
            }
            Self::Acknowledge { ids } => {
                for id in ids {
                    view.update(*id, acknowledge_category);
                }
            }
            Self::Merge { source, target } => {
                let moved = view.get(*source).map(|c| c.article_count).unwrap_or(0);
                for child in view.child_ids(*source) {
                    view.set_parent(child, Some(*target));
                }
                view.update(*target, |c| c.article_count += moved);
                view.remove(*source);
            }
        }
    }

    /// Issues the store calls in order; the first failure aborts the rest.
    pub fn submit<S: CategoryStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreFailure> {
        match self {
            Self::Restructure { structure } => store.save_group_structure(structure),
            Self::Rename { id, name } => store.rename_category(*id, name).map(|_| ()),
            Self::Delete { ids, released } => {
                if !released.is_empty() {
                    let release = GroupStructure::from_placements(released.iter().map(|id| {
                        Placement {
                            id: *id,
                            parent_id: None,
                        }
                    }));
                    store.save_group_structure(&release)?;
                }
                for id in ids {
                    store.delete_category(*id)?;
                }
                Ok(())
            }
            Self::SetHidden { ids, hidden } => {
                for id in ids {
                    if *hidden {
                        store.hide_category(*id)?;
                    } else {
                        store.unhide_category(*id)?;
                    }
                }
                Ok(())
            }
            Self::SetWeight {
                id,
                weight,
                acknowledge,
            } => {
                store.set_weight(*id, *weight)?;
                if *acknowledge {
                    store.acknowledge(&[*id])?;
                }
                Ok(())
            }
            Self::Acknowledge { ids } => store.acknowledge(ids),
            Self::Merge { source, target } => store.merge_categories(*source, *target).map(|_| ()),
        }
    }
}
