#![forbid(unsafe_code)]

//! The category store collaborator.
//!
//! Every call completes with a `Result`; that is the completion signal the
//! engine sequences composite workflows on. Implementations must reject
//! writes that would break the two-level hierarchy or name uniqueness, even
//! though the engine validates first.

use crate::ids::CategoryId;
use crate::model::{Category, GroupStructure, GroupSummary};
use crate::names::CategoryName;
use crate::weight::WeightValue;

pub trait CategoryStore {
    fn list_categories(&self) -> Result<Vec<Category>, StoreFailure>;

    fn list_groups(&self) -> Result<Vec<GroupSummary>, StoreFailure>;

    /// Applies every placement atomically or none of them.
    fn save_group_structure(&mut self, structure: &GroupStructure) -> Result<(), StoreFailure>;

    fn create_category(&mut self, name: &CategoryName) -> Result<Category, StoreFailure>;

    fn rename_category(
        &mut self,
        id: CategoryId,
        name: &CategoryName,
    ) -> Result<Category, StoreFailure>;

    /// Releases children to root and remembers the slug for rediscovery.
    fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreFailure>;

    fn hide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure>;

    fn unhide_category(&mut self, id: CategoryId) -> Result<(), StoreFailure>;

    /// `None` clears the override.
    fn set_weight(
        &mut self,
        id: CategoryId,
        weight: Option<WeightValue>,
    ) -> Result<(), StoreFailure>;

    fn acknowledge(&mut self, ids: &[CategoryId]) -> Result<(), StoreFailure>;

    /// Moves the source's children and article count onto the target, then
    /// deletes the source.
    fn merge_categories(
        &mut self,
        source: CategoryId,
        target: CategoryId,
    ) -> Result<Category, StoreFailure>;

    fn unseen_count(&self) -> Result<usize, StoreFailure>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreFailure {
    Unavailable(String),
    NotFound(CategoryId),
    Conflict(String),
    Rejected(String),
}

impl StoreFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::NotFound(_) => "UNKNOWN_ID",
            Self::Conflict(_) => "CONFLICT",
            Self::Rejected(_) => "REJECTED",
        }
    }
}

impl std::fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::NotFound(id) => write!(f, "category not found (id={id})"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Rejected(message) => write!(f, "rejected: {message}"),
        }
    }
}

impl std::error::Error for StoreFailure {}
