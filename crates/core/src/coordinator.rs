#![forbid(unsafe_code)]

//! Optimistic updates with exact rollback.
//!
//! A mutation is applied to the local view as a *layer* keyed by the entity
//! it touches, then issued to the store. Failure reverts that layer alone:
//! newer layers are unwound, the failed layer's snapshot is restored, and the
//! newer layers are replayed. `complete` then refreshes the view from the
//! store after either outcome and re-applies every layer still in flight.
//! There is at most one layer per key; a newer `begin` on the same key rolls
//! the older prediction back and makes its ticket stale.

use crate::ids::CategoryId;
use crate::model::{Category, CategorySet};
use crate::reorg::{Mutation, canonical_ids};
use crate::store::{CategoryStore, StoreFailure};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutationKey {
    /// A single-entity change (rename, weight, hide one).
    Category(CategoryId),
    /// A flag change over several categories, keyed by the canonical id set.
    Selection(Vec<CategoryId>),
    /// Anything that moves parent links or removes categories.
    Structure,
}

impl MutationKey {
    pub fn for_ids(ids: &[CategoryId]) -> Self {
        match canonical_ids(ids).as_slice() {
            [one] => Self::Category(*one),
            many => Self::Selection(many.to_vec()),
        }
    }
}

/// Handle for one in-flight layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub key: MutationKey,
    pub seq: u64,
}

/// Pre-mutation state of the affected entries; `None` marks an entry that
/// did not exist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(CategoryId, Option<Category>)>,
}

impl Snapshot {
    pub fn capture(view: &CategorySet, ids: &BTreeSet<CategoryId>) -> Self {
        Self {
            entries: ids.iter().map(|id| (*id, view.get(*id).cloned())).collect(),
        }
    }

    pub fn restore(&self, view: &mut CategorySet) {
        for (id, entry) in &self.entries {
            match entry {
                Some(category) => {
                    view.upsert(category.clone());
                }
                None => {
                    view.remove(*id);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct OptimisticCommand {
    pub ticket: Ticket,
    pub mutation: Mutation,
    pub before: Snapshot,
}

/// Transient user-facing failure message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub detail: String,
}

impl Notice {
    fn for_failure(mutation: &Mutation, failure: &StoreFailure) -> Self {
        Self {
            title: format!("Could not {}", mutation.label().replace('_', " ")),
            detail: failure.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    RolledBack(StoreFailure),
    /// The layer was superseded or already settled; nothing changed.
    Stale,
}

#[derive(Debug, Default)]
pub struct OptimisticCoordinator {
    next_seq: u64,
    layers: BTreeMap<MutationKey, OptimisticCommand>,
    notices: Vec<Notice>,
}

impl OptimisticCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the prediction and marks its key pending.
    pub fn begin(&mut self, view: &mut CategorySet, mutation: Mutation) -> Ticket {
        let key = mutation.key();
        if let Some(previous) = self.withdraw(view, &key) {
            tracing::debug!(
                target: "topiary.core",
                op = previous.mutation.label(),
                seq = previous.ticket.seq,
                "optimistic layer superseded"
            );
        }

        let before = Snapshot::capture(view, &mutation.affected(view));
        mutation.apply(view);
        self.next_seq += 1;
        let ticket = Ticket {
            key: key.clone(),
            seq: self.next_seq,
        };
        tracing::debug!(
            target: "topiary.core",
            op = mutation.label(),
            seq = ticket.seq,
            affected = before.len(),
            "optimistic layer applied"
        );
        self.layers.insert(
            key,
            OptimisticCommand {
                ticket: ticket.clone(),
                mutation,
                before,
            },
        );
        ticket
    }

    /// The mutation behind a pending ticket, for issuing it to the store.
    pub fn command(&self, ticket: &Ticket) -> Option<&OptimisticCommand> {
        self.layers
            .get(&ticket.key)
            .filter(|command| command.ticket.seq == ticket.seq)
    }

    /// Resolves a layer. A failure reverts the layer's prediction and queues
    /// a notice; there is no retry.
    pub fn settle(
        &mut self,
        view: &mut CategorySet,
        ticket: &Ticket,
        outcome: Result<(), StoreFailure>,
    ) -> Settlement {
        if self.command(ticket).is_none() {
            tracing::debug!(
                target: "topiary.core",
                seq = ticket.seq,
                "stale settlement ignored"
            );
            return Settlement::Stale;
        }
        let failure = match outcome {
            Ok(()) => {
                self.layers.remove(&ticket.key);
                return Settlement::Committed;
            }
            Err(failure) => failure,
        };
        let Some(command) = self.withdraw(view, &ticket.key) else {
            return Settlement::Stale;
        };

        tracing::warn!(
            target: "topiary.core",
            op = command.mutation.label(),
            seq = ticket.seq,
            code = failure.code(),
            error = %failure,
            "store rejected mutation; rolled back"
        );
        self.notices
            .push(Notice::for_failure(&command.mutation, &failure));
        Settlement::RolledBack(failure)
    }

    /// Removes the layer under `key` from the view. Newer layers are unwound
    /// first and replayed afterwards, so their predictions survive and only
    /// the withdrawn layer's fields revert.
    fn withdraw(
        &mut self,
        view: &mut CategorySet,
        key: &MutationKey,
    ) -> Option<OptimisticCommand> {
        let seq = self.layers.get(key)?.ticket.seq;
        let mut newer: Vec<(u64, MutationKey)> = self
            .layers
            .iter()
            .filter(|(_, command)| command.ticket.seq > seq)
            .map(|(other, command)| (command.ticket.seq, other.clone()))
            .collect();
        newer.sort();

        for (_, other) in newer.iter().rev() {
            if let Some(command) = self.layers.get(other) {
                command.before.restore(view);
            }
        }
        let withdrawn = self.layers.remove(key)?;
        withdrawn.before.restore(view);
        for (_, other) in &newer {
            if let Some(command) = self.layers.get_mut(other) {
                command.before = Snapshot::capture(view, &command.mutation.affected(view));
                command.mutation.apply(view);
            }
        }
        Some(withdrawn)
    }

    /// Replaces the view with store state and re-applies pending layers in
    /// the order they began.
    pub fn refresh(&mut self, view: &mut CategorySet, categories: Vec<Category>) {
        *view = CategorySet::from_categories(categories);
        let mut pending: Vec<&mut OptimisticCommand> = self.layers.values_mut().collect();
        pending.sort_by_key(|command| command.ticket.seq);
        for command in pending {
            command.before = Snapshot::capture(view, &command.mutation.affected(view));
            command.mutation.apply(view);
        }
    }

    /// Settles a ticket, then reloads the view from the store whether the
    /// write committed or rolled back. A composite write that failed midway
    /// may have left partial changes in the store; the reload picks them up.
    pub fn complete<S: CategoryStore + ?Sized>(
        &mut self,
        view: &mut CategorySet,
        store: &S,
        ticket: &Ticket,
        outcome: Result<(), StoreFailure>,
    ) -> Settlement {
        let settlement = self.settle(view, ticket, outcome);
        if settlement != Settlement::Stale {
            match store.list_categories() {
                Ok(categories) => self.refresh(view, categories),
                Err(err) => tracing::warn!(
                    target: "topiary.core",
                    error = %err,
                    "refresh after settlement failed; keeping local view"
                ),
            }
        }
        settlement
    }

    /// begin, submit, complete in one call.
    pub fn run<S: CategoryStore + ?Sized>(
        &mut self,
        view: &mut CategorySet,
        store: &mut S,
        mutation: Mutation,
    ) -> Result<(), StoreFailure> {
        let ticket = self.begin(view, mutation);
        let outcome = match self.command(&ticket) {
            Some(command) => command.mutation.submit(store),
            None => Ok(()),
        };
        match self.complete(view, store, &ticket, outcome) {
            Settlement::RolledBack(failure) => Err(failure),
            Settlement::Committed | Settlement::Stale => Ok(()),
        }
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.layers.contains_key(key)
    }

    /// True when any pending layer touches `id`.
    pub fn touches(&self, id: CategoryId) -> bool {
        self.layers.keys().any(|key| match key {
            MutationKey::Category(other) => *other == id,
            MutationKey::Selection(ids) => ids.contains(&id),
            MutationKey::Structure => false,
        })
    }

    pub fn pending_keys(&self) -> Vec<MutationKey> {
        self.layers.keys().cloned().collect()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
