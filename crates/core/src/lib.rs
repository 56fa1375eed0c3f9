#![forbid(unsafe_code)]

//! Category hierarchy and weight resolution engine.
//!
//! Categories live in a flat, id-indexed [`model::CategorySet`] and form a
//! hierarchy at most two levels deep. Reads derive the presentation tree,
//! effective weights and novelty from that set. Writes are planned by
//! [`reorg`], applied optimistically by [`coordinator`], and made durable
//! through a [`store::CategoryStore`].

pub mod config;
pub mod coordinator;
pub mod dragdrop;
pub mod edit;
pub mod error;
pub mod ids;
pub mod memory;
pub mod model;
pub mod names;
pub mod novelty;
pub mod organizer;
pub mod reorg;
pub mod store;
pub mod tree;
pub mod weight;

pub use config::EngineConfig;
pub use coordinator::{MutationKey, Notice, OptimisticCoordinator, Settlement, Ticket};
pub use dragdrop::{DragSession, DropDecision, DropOutcome, DropRejection, DropTarget};
pub use error::{EngineError, StructureError, ValidationError};
pub use ids::CategoryId;
pub use memory::InMemoryStore;
pub use model::{Category, CategorySet, GroupStructure, GroupSummary, Placement};
pub use names::CategoryName;
pub use organizer::Organizer;
pub use store::{CategoryStore, StoreFailure};
pub use tree::{CategoryTree, GroupNode, build_tree};
pub use weight::{ResolvedWeight, WeightValue};
