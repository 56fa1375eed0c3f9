#![forbid(unsafe_code)]

//! Drag-and-drop reorganization.
//!
//! A drag session is `Idle -> Dragging -> (Idle | Applied)`. Dropping is
//! resolved against the current view by [`resolve_drop`]; invalid drops are
//! ignored quietly and never surface as errors.

use crate::ids::CategoryId;
use crate::model::CategorySet;
use crate::tree::build_tree;

/// Token of the droppable region that releases a child to root.
pub const UNGROUP_ZONE: &str = "ungroup-zone";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    UngroupZone,
    Group(CategoryId),
    Category(CategoryId),
}

impl DropTarget {
    /// `ungroup-zone`, `group:<id>` or `category:<id>`; anything else is
    /// outside every droppable region.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == UNGROUP_ZONE {
            return Some(Self::UngroupZone);
        }
        let (kind, id) = raw.split_once(':')?;
        let id = CategoryId::parse(id).ok()?;
        match kind {
            "group" => Some(Self::Group(id)),
            "category" => Some(Self::Category(id)),
            _ => None,
        }
    }

    pub fn id(self) -> Option<CategoryId> {
        match self {
            Self::UngroupZone => None,
            Self::Group(id) | Self::Category(id) => Some(id),
        }
    }

    pub fn token(self) -> String {
        match self {
            Self::UngroupZone => UNGROUP_ZONE.to_string(),
            Self::Group(id) => format!("group:{id}"),
            Self::Category(id) => format!("category:{id}"),
        }
    }
}

/// Where the dragged category sat when the drag started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Group(CategoryId),
    Ungrouped,
    Hidden,
}

impl Container {
    pub fn of(view: &CategorySet, id: CategoryId) -> Option<Self> {
        let category = view.get(id)?;
        if category.is_hidden {
            return Some(Self::Hidden);
        }
        let attached = category
            .parent_id
            .and_then(|parent| view.get(parent))
            .filter(|parent| !parent.is_hidden);
        Some(match attached {
            Some(parent) => Self::Group(parent.id),
            None => Self::Ungrouped,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropDecision {
    MoveToGroup { id: CategoryId, group: CategoryId },
    /// The ungrouped `leaf` becomes a group, keeping its identity, with `id`
    /// as its first child.
    PromoteAndMove { leaf: CategoryId, id: CategoryId },
    Ungroup { id: CategoryId },
}

impl DropDecision {
    pub fn moved(self) -> CategoryId {
        match self {
            Self::MoveToGroup { id, .. } | Self::PromoteAndMove { id, .. } | Self::Ungroup { id } => {
                id
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropRejection {
    NotDragging,
    Outside,
    SelfDrop,
    AlreadyRoot,
    ActiveIsGroup,
    AlreadyInGroup,
    TargetIsChild,
    TargetHidden,
    UnknownTarget,
    UnknownActive,
}

impl DropRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDragging => "not_dragging",
            Self::Outside => "outside",
            Self::SelfDrop => "self_drop",
            Self::AlreadyRoot => "already_root",
            Self::ActiveIsGroup => "active_is_group",
            Self::AlreadyInGroup => "already_in_group",
            Self::TargetIsChild => "target_is_child",
            Self::TargetHidden => "target_hidden",
            Self::UnknownTarget => "unknown_target",
            Self::UnknownActive => "unknown_active",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Apply(DropDecision),
    Ignore(DropRejection),
}

/// Decision table; the first matching row wins.
pub fn resolve_drop(view: &CategorySet, active: CategoryId, target: DropTarget) -> DropOutcome {
    use DropOutcome::{Apply, Ignore};

    let Some(active_row) = view.get(active) else {
        return Ignore(DropRejection::UnknownActive);
    };
    if target.id() == Some(active) {
        return Ignore(DropRejection::SelfDrop);
    }
    let Some(target_id) = target.id() else {
        return if active_row.is_root() {
            Ignore(DropRejection::AlreadyRoot)
        } else {
            Apply(DropDecision::Ungroup { id: active })
        };
    };
    if view.has_children(active) {
        return Ignore(DropRejection::ActiveIsGroup);
    }

    let tree = build_tree(view.iter());
    if tree.is_group(target_id) {
        if active_row.parent_id == Some(target_id) {
            return Ignore(DropRejection::AlreadyInGroup);
        }
        return Apply(DropDecision::MoveToGroup {
            id: active,
            group: target_id,
        });
    }

    let Some(target_row) = view.get(target_id) else {
        return Ignore(DropRejection::UnknownTarget);
    };
    if !target_row.is_root() {
        return Ignore(DropRejection::TargetIsChild);
    }
    if target_row.is_hidden {
        return Ignore(DropRejection::TargetHidden);
    }
    if view.has_children(target_id) {
        // Root whose children are all hidden: already a parent, no promotion.
        if active_row.parent_id == Some(target_id) {
            return Ignore(DropRejection::AlreadyInGroup);
        }
        return Apply(DropDecision::MoveToGroup {
            id: active,
            group: target_id,
        });
    }
    Apply(DropDecision::PromoteAndMove {
        leaf: target_id,
        id: active,
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        active: CategoryId,
        source: Container,
    },
    Applied {
        decision: DropDecision,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragError {
    AlreadyDragging { active: CategoryId },
    UnknownCategory(CategoryId),
}

impl std::fmt::Display for DragError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyDragging { active } => {
                write!(f, "a drag of category {active} is already in progress")
            }
            Self::UnknownCategory(id) => write!(f, "unknown category (id={id})"),
        }
    }
}

impl std::error::Error for DragError {}

/// At most one drag in flight.
#[derive(Clone, Debug, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn active(&self) -> Option<CategoryId> {
        match self.state {
            DragState::Dragging { active, .. } => Some(active),
            _ => None,
        }
    }

    pub fn start(&mut self, view: &CategorySet, active: CategoryId) -> Result<(), DragError> {
        if let DragState::Dragging { active: current, .. } = self.state {
            return Err(DragError::AlreadyDragging { active: current });
        }
        let source = Container::of(view, active).ok_or(DragError::UnknownCategory(active))?;
        self.state = DragState::Dragging { active, source };
        Ok(())
    }

    /// Resolves a release over `target` (`None` when released outside any
    /// droppable region). Ignored drops return to idle.
    pub fn drop_on(&mut self, view: &CategorySet, target: Option<&str>) -> DropOutcome {
        let DragState::Dragging { active, .. } = self.state else {
            return DropOutcome::Ignore(DropRejection::NotDragging);
        };
        let outcome = match target.and_then(DropTarget::parse) {
            Some(target) => resolve_drop(view, active, target),
            None => DropOutcome::Ignore(DropRejection::Outside),
        };
        match outcome {
            DropOutcome::Apply(decision) => {
                self.state = DragState::Applied { decision };
            }
            DropOutcome::Ignore(reason) => {
                tracing::debug!(
                    target: "topiary.core",
                    op = "drop",
                    category_id = %active,
                    drop_target = target.unwrap_or(""),
                    reason = reason.as_str(),
                    "drop ignored"
                );
                self.state = DragState::Idle;
            }
        }
        outcome
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Takes the applied decision, if any, and returns to idle.
    pub fn finish(&mut self) -> Option<DropDecision> {
        let decision = match self.state {
            DragState::Applied { decision } => Some(decision),
            _ => None,
        };
        self.state = DragState::Idle;
        decision
    }
}
