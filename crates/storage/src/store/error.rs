#![forbid(unsafe_code)]

use tp_core::ids::CategoryId;
use tp_core::store::StoreFailure;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    /// The on-disk schema is foreign or from another version.
    ResetRequired(&'static str),
    UnknownId(CategoryId),
    NameTaken { name: String },
    DepthViolation { id: CategoryId, parent: CategoryId },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::Json(_) => "JSON",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ResetRequired(_) => "RESET_REQUIRED",
            Self::UnknownId(_) => "UNKNOWN_ID",
            Self::NameTaken { .. } => "CONFLICT",
            Self::DepthViolation { .. } => "STRUCTURE_VIOLATION",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::ResetRequired(message) => write!(f, "RESET_REQUIRED: {message}"),
            Self::UnknownId(id) => write!(f, "unknown category (id={id})"),
            Self::NameTaken { name } => write!(f, "category name already taken ({name})"),
            Self::DepthViolation { id, parent } => write!(
                f,
                "category {id} cannot sit under {parent}: parent is itself a child"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<StoreError> for StoreFailure {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownId(id) => StoreFailure::NotFound(id),
            StoreError::NameTaken { name } => StoreFailure::Conflict(name),
            StoreError::InvalidInput(_) | StoreError::DepthViolation { .. } => {
                StoreFailure::Rejected(value.to_string())
            }
            StoreError::Io(_)
            | StoreError::Sql(_)
            | StoreError::Json(_)
            | StoreError::ResetRequired(_) => StoreFailure::Unavailable(value.to_string()),
        }
    }
}
