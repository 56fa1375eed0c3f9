#![forbid(unsafe_code)]

use crate::ids::CategoryId;
use crate::names::NameError;
use crate::store::StoreFailure;
use crate::weight::WeightParseError;

/// Rejected before any store call; surfaced inline to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    Name(NameError),
    DuplicateName { existing: CategoryId, name: String },
    UnknownWeight(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(err) => write!(f, "{}", err.message()),
            Self::DuplicateName { existing, name } => {
                write!(f, "category '{name}' already exists (id={existing})")
            }
            Self::UnknownWeight(value) => write!(f, "unknown weight '{value}'"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<NameError> for ValidationError {
    fn from(value: NameError) -> Self {
        Self::Name(value)
    }
}

impl From<WeightParseError> for ValidationError {
    fn from(value: WeightParseError) -> Self {
        Self::UnknownWeight(value.value)
    }
}

/// A reorganization that would break the two-level hierarchy or reference
/// something that does not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StructureError {
    UnknownCategory(CategoryId),
    EmptySelection,
    SelfReference(CategoryId),
    TargetIsChild { target: CategoryId },
    GroupUnderGroup { id: CategoryId },
    MergeIntoSelf(CategoryId),
    MergeBreaksDepth { source: CategoryId, target: CategoryId },
}

impl std::fmt::Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCategory(id) => write!(f, "unknown category (id={id})"),
            Self::EmptySelection => write!(f, "no categories selected"),
            Self::SelfReference(id) => write!(f, "category {id} cannot be its own parent"),
            Self::TargetIsChild { target } => {
                write!(f, "target {target} is a child and cannot receive children")
            }
            Self::GroupUnderGroup { id } => write!(
                f,
                "category {id} has children and cannot be nested under another parent"
            ),
            Self::MergeIntoSelf(id) => write!(f, "category {id} cannot be merged into itself"),
            Self::MergeBreaksDepth { source, target } => write!(
                f,
                "merging {source} into {target} would nest a group under a child"
            ),
        }
    }
}

impl std::error::Error for StructureError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    Validation(ValidationError),
    Structure(StructureError),
    Store(StoreFailure),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::DuplicateName { .. }) => "DUPLICATE_NAME",
            Self::Validation(_) => "INVALID_INPUT",
            Self::Structure(StructureError::UnknownCategory(_)) => "UNKNOWN_ID",
            Self::Structure(_) => "STRUCTURE_VIOLATION",
            Self::Store(failure) => failure.code(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation: {err}"),
            Self::Structure(err) => write!(f, "structure: {err}"),
            Self::Store(err) => write!(f, "store: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Structure(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<NameError> for EngineError {
    fn from(value: NameError) -> Self {
        Self::Validation(ValidationError::Name(value))
    }
}

impl From<StructureError> for EngineError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

impl From<StoreFailure> for EngineError {
    fn from(value: StoreFailure) -> Self {
        Self::Store(value)
    }
}
