#![forbid(unsafe_code)]

//! Presentation-facing facade. Owns the local view, the coordinator and the
//! store handle; every write goes plan -> coordinator -> store.

use crate::config::EngineConfig;
use crate::coordinator::{MutationKey, Notice, OptimisticCoordinator};
use crate::dragdrop::{DragError, DragSession, DropDecision, DropOutcome, DropRejection};
use crate::error::{EngineError, StructureError, ValidationError};
use crate::ids::CategoryId;
use crate::model::{Category, CategorySet, GroupSummary};
use crate::names::CategoryName;
use crate::novelty::{NoveltyFlags, NoveltyPoll, NoveltyState};
use crate::reorg::{self, Mutation};
use crate::store::CategoryStore;
use crate::tree::{CategoryTree, build_tree};
use crate::weight::{self, ResolvedWeight, WeightValue};
use std::time::Instant;

pub struct Organizer<S: CategoryStore> {
    store: S,
    view: CategorySet,
    coordinator: OptimisticCoordinator,
    drag: DragSession,
    config: EngineConfig,
    poll: NoveltyPoll,
    unseen: usize,
}

impl<S: CategoryStore> Organizer<S> {
    pub fn open(store: S, config: EngineConfig) -> Result<Self, EngineError> {
        let view = CategorySet::from_categories(store.list_categories()?);
        let unseen = store.unseen_count()?;
        let poll = NoveltyPoll::new(config.novelty_poll_interval);
        Ok(Self {
            store,
            view,
            coordinator: OptimisticCoordinator::new(),
            drag: DragSession::new(),
            config,
            poll,
            unseen,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct store access, e.g. for the discovery process. Call
    /// [`Organizer::reload`] afterwards.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn view(&self) -> &CategorySet {
        &self.view
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.view.get(id)
    }

    /// Reloads from the store, keeping pending predictions on top.
    pub fn reload(&mut self) -> Result<(), EngineError> {
        let categories = self.store.list_categories()?;
        self.coordinator.refresh(&mut self.view, categories);
        Ok(())
    }

    pub fn tree(&self) -> CategoryTree {
        build_tree(self.view.iter())
    }

    pub fn search(&self, query: &str) -> CategoryTree {
        self.tree().filter(query)
    }

    pub fn groups(&self) -> Result<Vec<GroupSummary>, EngineError> {
        Ok(self.store.list_groups()?)
    }

    pub fn weight(&self, id: CategoryId) -> Option<ResolvedWeight> {
        self.view.resolved_weight(id)
    }

    pub fn multiplier(&self, ids: &[CategoryId]) -> f64 {
        weight::category_multiplier(&self.view, ids)
    }

    pub fn is_blocked(&self, ids: &[CategoryId]) -> bool {
        weight::is_blocked(&self.view, ids)
    }

    pub fn novelty(&self) -> NoveltyState {
        NoveltyState::compute(self.view.iter())
    }

    pub fn novelty_flags(&self, id: CategoryId) -> NoveltyFlags {
        self.novelty().flags(id)
    }

    /// Last polled badge count.
    pub fn unseen_badge(&self) -> usize {
        self.unseen
    }

    pub fn create_category(&mut self, raw: &str) -> Result<Category, EngineError> {
        let name = reorg::validate_new_name(&self.view, raw, self.config.max_name_len)?;
        let created = self.create_in_store(&name)?;
        self.reload()?;
        Ok(created)
    }

    /// Creates a group named `raw` and moves `ids` under it. Name and move
    /// preconditions are checked before the group is created.
    pub fn create_group_and_move(
        &mut self,
        raw: &str,
        ids: &[CategoryId],
    ) -> Result<Category, EngineError> {
        let name = reorg::validate_new_name(&self.view, raw, self.config.max_name_len)?;
        let ids = reorg::validate_group_members(&self.view, ids)?;
        let group = self.create_in_store(&name)?;
        self.reload()?;
        let mutation = reorg::plan_move(&self.view, &ids, group.id)?;
        self.run(mutation)?;
        Ok(group)
    }

    pub fn move_to_group(
        &mut self,
        ids: &[CategoryId],
        target: CategoryId,
    ) -> Result<(), EngineError> {
        let mutation = reorg::plan_move(&self.view, ids, target)?;
        self.run(mutation)
    }

    pub fn ungroup(&mut self, ids: &[CategoryId]) -> Result<(), EngineError> {
        let mutation = reorg::plan_ungroup(&self.view, ids)?;
        self.run(mutation)
    }

    pub fn ungroup_group(&mut self, group: CategoryId) -> Result<(), EngineError> {
        let mutation = reorg::plan_ungroup_group(&self.view, group)?;
        self.run(mutation)
    }

    pub fn rename_category(&mut self, id: CategoryId, raw: &str) -> Result<(), EngineError> {
        let mutation = reorg::plan_rename(&self.view, id, raw, self.config.max_name_len)?;
        self.run(mutation)
    }

    pub fn delete_category(&mut self, id: CategoryId) -> Result<(), EngineError> {
        self.delete_categories(&[id])
    }

    pub fn delete_categories(&mut self, ids: &[CategoryId]) -> Result<(), EngineError> {
        let mutation = reorg::plan_delete(&self.view, ids)?;
        self.run(Some(mutation))
    }

    pub fn hide(&mut self, id: CategoryId) -> Result<(), EngineError> {
        self.hide_categories(&[id])
    }

    pub fn unhide(&mut self, id: CategoryId) -> Result<(), EngineError> {
        self.unhide_categories(&[id])
    }

    pub fn hide_categories(&mut self, ids: &[CategoryId]) -> Result<(), EngineError> {
        let mutation = reorg::plan_visibility(&self.view, ids, true)?;
        self.run(mutation)
    }

    pub fn unhide_categories(&mut self, ids: &[CategoryId]) -> Result<(), EngineError> {
        let mutation = reorg::plan_visibility(&self.view, ids, false)?;
        self.run(mutation)
    }

    /// `None` clears the override so the category inherits again.
    pub fn set_weight(
        &mut self,
        id: CategoryId,
        weight: Option<WeightValue>,
    ) -> Result<(), EngineError> {
        let mutation = reorg::plan_set_weight(&self.view, id, weight)?;
        self.run(mutation)
    }

    /// Accepts a weight name, a legacy alias, or `inherit`.
    pub fn set_weight_named(&mut self, id: CategoryId, raw: &str) -> Result<(), EngineError> {
        let weight = weight::parse_override(raw).map_err(ValidationError::from)?;
        self.set_weight(id, weight)
    }

    pub fn acknowledge(&mut self, ids: &[CategoryId]) -> Result<(), EngineError> {
        let mutation = reorg::plan_acknowledge(&self.view, ids);
        self.run(mutation)?;
        self.unseen = self.novelty().unseen_count();
        Ok(())
    }

    pub fn merge_categories(
        &mut self,
        source: CategoryId,
        target: CategoryId,
    ) -> Result<(), EngineError> {
        let mutation = reorg::plan_merge(&self.view, source, target)?;
        self.run(Some(mutation))
    }

    pub fn start_drag(&mut self, id: CategoryId) -> Result<(), DragError> {
        self.drag.start(&self.view, id)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    /// Releases the current drag over `target`. Ignored drops are not errors.
    pub fn drop_on(&mut self, target: Option<&str>) -> Result<DropOutcome, EngineError> {
        let outcome = self.drag.drop_on(&self.view, target);
        if let Some(decision) = self.drag.finish() {
            self.apply_drop(decision)?;
        }
        Ok(outcome)
    }

    /// One-shot drag of `active` onto `target`.
    pub fn handle_drop(
        &mut self,
        active: CategoryId,
        target: Option<&str>,
    ) -> Result<DropOutcome, EngineError> {
        self.drag.cancel();
        if let Err(err) = self.drag.start(&self.view, active) {
            tracing::debug!(
                target: "topiary.core",
                op = "drop",
                category_id = %active,
                error = %err,
                "drag not started"
            );
            return Ok(DropOutcome::Ignore(DropRejection::UnknownActive));
        }
        self.drop_on(target)
    }

    pub fn apply_drop(&mut self, decision: DropDecision) -> Result<(), EngineError> {
        let planned = match decision {
            DropDecision::MoveToGroup { id, group } => reorg::plan_move(&self.view, &[id], group),
            DropDecision::PromoteAndMove { leaf, id } => reorg::plan_move(&self.view, &[id], leaf),
            DropDecision::Ungroup { id } => reorg::plan_ungroup(&self.view, &[id]),
        };
        match planned {
            Ok(mutation) => self.run(mutation),
            Err(err) => {
                log_ignored_drop(decision, &err);
                Ok(())
            }
        }
    }

    /// Polls the unseen count when due. Best effort: a failed poll is logged
    /// and retried on the next cycle.
    pub fn refresh_novelty(&mut self, now: Instant) -> bool {
        if !self.poll.is_due(now) {
            return false;
        }
        self.poll.mark_refreshed(now);
        match self.store.unseen_count() {
            Ok(count) => {
                self.unseen = count;
                true
            }
            Err(err) => {
                tracing::warn!(
                    target: "topiary.core",
                    op = "unseen_count",
                    error = %err,
                    "novelty poll failed"
                );
                false
            }
        }
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.coordinator.is_pending(key)
    }

    /// True while any in-flight mutation targets `id`.
    pub fn is_busy(&self, id: CategoryId) -> bool {
        self.coordinator.touches(id) || self.coordinator.is_pending(&MutationKey::Structure)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.coordinator.drain_notices()
    }

    fn create_in_store(
        &mut self,
        name: &CategoryName,
    ) -> Result<Category, EngineError> {
        match self.store.create_category(name) {
            Ok(created) => {
                tracing::debug!(
                    target: "topiary.core",
                    op = "create",
                    category_id = %created.id,
                    "category created"
                );
                Ok(created)
            }
            Err(err) => {
                tracing::warn!(
                    target: "topiary.core",
                    op = "create",
                    error = %err,
                    "store rejected create"
                );
                Err(err.into())
            }
        }
    }

    fn run(&mut self, mutation: Option<Mutation>) -> Result<(), EngineError> {
        let Some(mutation) = mutation else {
            tracing::debug!(target: "topiary.core", "request already satisfied; nothing to do");
            return Ok(());
        };
        let label = mutation.label();
        self.coordinator
            .run(&mut self.view, &mut self.store, mutation)?;
        tracing::debug!(target: "topiary.core", op = label, "mutation committed");
        Ok(())
    }
}

fn log_ignored_drop(decision: DropDecision, err: &StructureError) {
    tracing::debug!(
        target: "topiary.core",
        op = "drop",
        category_id = %decision.moved(),
        error = %err,
        "drop ignored"
    );
}
