#![forbid(unsafe_code)]

use crate::ids::CategoryId;
use crate::model::Category;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NoveltyFlags {
    pub is_new: bool,
    pub is_returned: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NoveltyState {
    pub new: BTreeSet<CategoryId>,
    pub returned: BTreeSet<CategoryId>,
}

impl NoveltyState {
    pub fn compute<'a>(categories: impl IntoIterator<Item = &'a Category>) -> Self {
        NoveltyTracker::from_categories(categories).state()
    }

    pub fn flags(&self, id: CategoryId) -> NoveltyFlags {
        NoveltyFlags {
            is_new: self.new.contains(&id),
            is_returned: self.returned.contains(&id),
        }
    }

    /// Badge count: categories never seen and not hidden.
    pub fn unseen_count(&self) -> usize {
        self.new.len()
    }
}

/// Seen / hidden / returned markers; `new = all - seen - hidden`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoveltyTracker {
    all: BTreeSet<CategoryId>,
    seen: BTreeSet<CategoryId>,
    hidden: BTreeSet<CategoryId>,
    returned: BTreeSet<CategoryId>,
}

impl NoveltyTracker {
    pub fn from_categories<'a>(categories: impl IntoIterator<Item = &'a Category>) -> Self {
        let mut tracker = Self::default();
        for category in categories {
            tracker.all.insert(category.id);
            if category.is_seen {
                tracker.seen.insert(category.id);
            }
            if category.is_hidden {
                tracker.hidden.insert(category.id);
            }
            if category.is_returned {
                tracker.returned.insert(category.id);
            }
        }
        tracker
    }

    pub fn new_set(&self) -> BTreeSet<CategoryId> {
        self.all
            .iter()
            .filter(|id| !self.seen.contains(*id) && !self.hidden.contains(*id))
            .copied()
            .collect()
    }

    pub fn returned_set(&self) -> &BTreeSet<CategoryId> {
        &self.returned
    }

    /// Idempotent; ids the tracker does not know are ignored.
    pub fn acknowledge(&mut self, ids: &[CategoryId]) {
        for id in ids {
            if !self.all.contains(id) {
                continue;
            }
            self.seen.insert(*id);
            self.returned.remove(id);
        }
    }

    pub fn state(&self) -> NoveltyState {
        NoveltyState {
            new: self.new_set(),
            returned: self.returned.clone(),
        }
    }
}

/// Applies an acknowledge to a single category record.
pub fn acknowledge_category(category: &mut Category) {
    category.is_seen = true;
    category.is_returned = false;
}

pub fn needs_acknowledge(category: &Category) -> bool {
    !category.is_seen || category.is_returned
}

/// Best-effort refresh schedule for badge counts. Missing a cycle only delays
/// the badge.
#[derive(Clone, Debug)]
pub struct NoveltyPoll {
    interval: Duration,
    last_refresh: Option<Instant>,
}

impl NoveltyPoll {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_refresh: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: i64) -> CategoryId {
        CategoryId::new(value)
    }

    fn sample() -> Vec<Category> {
        let seen = Category::manual(id(1), "seen");
        let fresh = Category::discovered(id(2), "fresh");
        let mut hidden = Category::discovered(id(3), "hidden");
        hidden.is_hidden = true;
        let mut back = Category::discovered(id(4), "back");
        back.is_returned = true;
        vec![seen, fresh, hidden, back]
    }

    #[test]
    fn new_excludes_seen_and_hidden() {
        let state = NoveltyState::compute(&sample());
        assert_eq!(state.new, BTreeSet::from([id(2), id(4)]));
        assert_eq!(state.returned, BTreeSet::from([id(4)]));
        assert_eq!(state.unseen_count(), 2);
        assert!(state.flags(id(4)).is_returned);
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let categories = sample();
        let mut once = NoveltyTracker::from_categories(&categories);
        once.acknowledge(&[id(4)]);
        let mut twice = once.clone();
        twice.acknowledge(&[id(4)]);

        assert_eq!(once, twice);
        let state = twice.state();
        assert!(!state.new.contains(&id(4)));
        assert!(!state.returned.contains(&id(4)));
        assert!(state.new.contains(&id(2)));
    }

    #[test]
    fn poll_schedule() {
        let start = Instant::now();
        let mut poll = NoveltyPoll::new(Duration::from_secs(30));
        assert!(poll.is_due(start));
        poll.mark_refreshed(start);
        assert!(!poll.is_due(start + Duration::from_secs(10)));
        assert!(poll.is_due(start + Duration::from_secs(30)));
    }
}
