#![forbid(unsafe_code)]

//! Cancellable text inputs for rename and create.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputDraft {
    committed: String,
    value: String,
    editing: bool,
}

impl InputDraft {
    pub fn new(committed: impl Into<String>) -> Self {
        let committed = committed.into();
        Self {
            value: committed.clone(),
            committed,
            editing: false,
        }
    }

    pub fn start(&mut self) {
        self.value = self.committed.clone();
        self.editing = true;
    }

    pub fn edit(&mut self, value: impl Into<String>) {
        if self.editing {
            self.value = value.into();
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Ends editing. Yields the trimmed value only when it is non-empty and
    /// differs from the committed one; otherwise reverts like `cancel`.
    pub fn submit(&mut self) -> Option<String> {
        if !self.editing {
            return None;
        }
        self.editing = false;
        let trimmed = self.value.trim();
        if trimmed.is_empty() || trimmed == self.committed {
            self.value = self.committed.clone();
            return None;
        }
        let submitted = trimmed.to_string();
        self.committed = submitted.clone();
        self.value = submitted.clone();
        Some(submitted)
    }

    pub fn cancel(&mut self) {
        self.editing = false;
        self.value = self.committed.clone();
    }

    /// Re-bases the draft after the store rejected a submitted value.
    pub fn revert_to(&mut self, committed: impl Into<String>) {
        self.committed = committed.into();
        self.value = self.committed.clone();
        self.editing = false;
    }
}
