#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity of a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub fn parse(value: &str) -> Result<Self, CategoryIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CategoryIdError::Empty);
        }
        let raw = trimmed
            .parse::<i64>()
            .map_err(|_| CategoryIdError::NotANumber)?;
        if raw <= 0 {
            return Err(CategoryIdError::NonPositive);
        }
        Ok(Self(raw))
    }
}

impl From<i64> for CategoryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryIdError {
    Empty,
    NotANumber,
    NonPositive,
}

impl CategoryIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "category id must not be empty",
            Self::NotANumber => "category id must be an integer",
            Self::NonPositive => "category id must be positive",
        }
    }
}
