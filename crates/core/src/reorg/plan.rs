#![forbid(unsafe_code)]

//! Validation and planning. Every check runs against the local view before
//! anything reaches the store; `Ok(None)` means the request is already
//! satisfied.

use super::mutation::Mutation;
use crate::error::{EngineError, StructureError, ValidationError};
use crate::ids::CategoryId;
use crate::model::{Category, CategorySet, GroupStructure, Placement};
use crate::names::CategoryName;
use crate::novelty::needs_acknowledge;
use crate::weight::WeightValue;

/// Sorted and de-duplicated, so batch results do not depend on input order.
pub fn canonical_ids(ids: &[CategoryId]) -> Vec<CategoryId> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

fn lookup(view: &CategorySet, id: CategoryId) -> Result<&Category, StructureError> {
    view.get(id).ok_or(StructureError::UnknownCategory(id))
}

fn selection(view: &CategorySet, ids: &[CategoryId]) -> Result<Vec<CategoryId>, StructureError> {
    let ids = canonical_ids(ids);
    if ids.is_empty() {
        return Err(StructureError::EmptySelection);
    }
    for id in &ids {
        lookup(view, *id)?;
    }
    Ok(ids)
}

/// Ids that may become children of some group: known, and not groups
/// themselves.
pub fn validate_group_members(
    view: &CategorySet,
    ids: &[CategoryId],
) -> Result<Vec<CategoryId>, StructureError> {
    let ids = selection(view, ids)?;
    if let Some(id) = ids.iter().find(|id| view.has_children(**id)) {
        return Err(StructureError::GroupUnderGroup { id: *id });
    }
    Ok(ids)
}

/// Parses a name for a new category and checks it against every existing one.
pub fn validate_new_name(
    view: &CategorySet,
    raw: &str,
    max_len: usize,
) -> Result<CategoryName, EngineError> {
    let name = CategoryName::parse(raw, max_len)?;
    ensure_unique(view, &name, None)?;
    Ok(name)
}

fn ensure_unique(
    view: &CategorySet,
    name: &CategoryName,
    except: Option<CategoryId>,
) -> Result<(), ValidationError> {
    match view.name_conflict(&name.display_key(), name.slug(), except) {
        Some(existing) => Err(ValidationError::DuplicateName {
            existing: existing.id,
            name: name.display().to_string(),
        }),
        None => Ok(()),
    }
}

pub fn plan_move(
    view: &CategorySet,
    ids: &[CategoryId],
    target: CategoryId,
) -> Result<Option<Mutation>, StructureError> {
    let target_row = lookup(view, target)?;
    if ids.contains(&target) {
        return Err(StructureError::SelfReference(target));
    }
    if !target_row.is_root() {
        return Err(StructureError::TargetIsChild { target });
    }
    let ids = validate_group_members(view, ids)?;

    let placements: Vec<Placement> = ids
        .into_iter()
        .filter(|id| view.get(*id).and_then(|c| c.parent_id) != Some(target))
        .map(|id| Placement {
            id,
            parent_id: Some(target),
        })
        .collect();
    Ok(restructure(placements))
}

pub fn plan_ungroup(
    view: &CategorySet,
    ids: &[CategoryId],
) -> Result<Option<Mutation>, StructureError> {
    let ids = selection(view, ids)?;
    let placements: Vec<Placement> = ids
        .into_iter()
        .filter(|id| view.get(*id).is_some_and(|c| !c.is_root()))
        .map(|id| Placement {
            id,
            parent_id: None,
        })
        .collect();
    Ok(restructure(placements))
}

/// Releases every child of `group` to root.
pub fn plan_ungroup_group(
    view: &CategorySet,
    group: CategoryId,
) -> Result<Option<Mutation>, StructureError> {
    lookup(view, group)?;
    let placements: Vec<Placement> = view
        .child_ids(group)
        .into_iter()
        .map(|id| Placement {
            id,
            parent_id: None,
        })
        .collect();
    Ok(restructure(placements))
}

fn restructure(placements: Vec<Placement>) -> Option<Mutation> {
    if placements.is_empty() {
        return None;
    }
    Some(Mutation::Restructure {
        structure: GroupStructure::from_placements(placements),
    })
}

pub fn plan_rename(
    view: &CategorySet,
    id: CategoryId,
    raw: &str,
    max_len: usize,
) -> Result<Option<Mutation>, EngineError> {
    let current = lookup(view, id)?;
    let name = CategoryName::parse(raw, max_len)?;
    ensure_unique(view, &name, Some(id))?;
    if current.display_name == name.display() && current.slug == name.slug() {
        return Ok(None);
    }
    Ok(Some(Mutation::Rename { id, name }))
}

/// Children of a deleted category that are not deleted themselves are
/// released to root; their overrides stay as they are.
pub fn plan_delete(view: &CategorySet, ids: &[CategoryId]) -> Result<Mutation, StructureError> {
    let ids = selection(view, ids)?;
    let mut released: Vec<CategoryId> = ids
        .iter()
        .flat_map(|id| view.child_ids(*id))
        .filter(|child| ids.binary_search(child).is_err())
        .collect();
    released.sort_unstable();
    released.dedup();
    Ok(Mutation::Delete { ids, released })
}

pub fn plan_visibility(
    view: &CategorySet,
    ids: &[CategoryId],
    hidden: bool,
) -> Result<Option<Mutation>, StructureError> {
    let ids: Vec<CategoryId> = selection(view, ids)?
        .into_iter()
        .filter(|id| view.get(*id).is_some_and(|c| c.is_hidden != hidden))
        .collect();
    if ids.is_empty() {
        return Ok(None);
    }
    Ok(Some(Mutation::SetHidden { ids, hidden }))
}

/// Setting or clearing an override also acknowledges the category.
pub fn plan_set_weight(
    view: &CategorySet,
    id: CategoryId,
    weight: Option<WeightValue>,
) -> Result<Option<Mutation>, StructureError> {
    let current = lookup(view, id)?;
    let acknowledge = needs_acknowledge(current);
    if current.weight == weight && !acknowledge {
        return Ok(None);
    }
    Ok(Some(Mutation::SetWeight {
        id,
        weight,
        acknowledge,
    }))
}

/// Unknown and already acknowledged ids are skipped.
pub fn plan_acknowledge(view: &CategorySet, ids: &[CategoryId]) -> Option<Mutation> {
    let ids: Vec<CategoryId> = canonical_ids(ids)
        .into_iter()
        .filter(|id| view.get(*id).is_some_and(needs_acknowledge))
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(Mutation::Acknowledge { ids })
}

/// The source's children move under the target and the source is deleted.
pub fn plan_merge(
    view: &CategorySet,
    source: CategoryId,
    target: CategoryId,
) -> Result<Mutation, StructureError> {
    if source == target {
        return Err(StructureError::MergeIntoSelf(source));
    }
    lookup(view, source)?;
    let target_row = lookup(view, target)?;
    let breaks_depth = target_row.parent_id == Some(source)
        || (!target_row.is_root() && view.has_children(source));
    if breaks_depth {
        return Err(StructureError::MergeBreaksDepth { source, target });
    }
    Ok(Mutation::Merge { source, target })
}
