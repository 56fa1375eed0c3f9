#![forbid(unsafe_code)]

//! Interest weights and their inheritance rule.
//!
//! One canonical five-level scale is used everywhere. The older vocabulary
//! (`block`, `reduce`, `normal`, `boost`, `max`) is accepted on input through a
//! single alias table and never emitted.

use crate::ids::CategoryId;
use crate::model::{Category, CategorySet};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum WeightValue {
    Blocked,
    Low,
    #[default]
    Neutral,
    Medium,
    High,
}

/// Keyword accepted by [`parse_override`] to clear an override.
pub const INHERIT_KEYWORD: &str = "inherit";

const LEGACY_ALIASES: &[(&str, WeightValue)] = &[
    ("block", WeightValue::Blocked),
    ("reduce", WeightValue::Low),
    ("normal", WeightValue::Neutral),
    ("boost", WeightValue::Medium),
    ("max", WeightValue::High),
];

impl WeightValue {
    pub const ALL: [WeightValue; 5] = [
        WeightValue::Blocked,
        WeightValue::Low,
        WeightValue::Neutral,
        WeightValue::Medium,
        WeightValue::High,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Low => "low",
            Self::Neutral => "neutral",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Result<Self, WeightParseError> {
        let folded = value.trim().to_ascii_lowercase();
        if let Some(weight) = Self::ALL.iter().find(|w| w.as_str() == folded) {
            return Ok(*weight);
        }
        LEGACY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == folded)
            .map(|(_, weight)| *weight)
            .ok_or_else(|| WeightParseError {
                value: value.trim().to_string(),
            })
    }

    /// Score multiplier consumed by downstream ranking.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Blocked => 0.0,
            Self::Low => 0.5,
            Self::Neutral => 1.0,
            Self::Medium => 1.5,
            Self::High => 2.0,
        }
    }

    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked)
    }
}

impl fmt::Display for WeightValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for WeightValue {
    type Error = WeightParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WeightValue> for String {
    fn from(value: WeightValue) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightParseError {
    pub value: String,
}

impl fmt::Display for WeightParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown weight '{}' (expected blocked, low, neutral, medium, high or inherit)",
            self.value
        )
    }
}

impl std::error::Error for WeightParseError {}

/// Parses a weight setting where `inherit` clears the override.
pub fn parse_override(value: &str) -> Result<Option<WeightValue>, WeightParseError> {
    if value.trim().eq_ignore_ascii_case(INHERIT_KEYWORD) {
        return Ok(None);
    }
    WeightValue::parse(value).map(Some)
}

pub fn effective_weight(category: &Category, parent_weight: Option<WeightValue>) -> WeightValue {
    category.weight.or(parent_weight).unwrap_or_default()
}

pub fn is_overridden(category: &Category) -> bool {
    category.weight.is_some()
}

/// Effective weight plus where it came from, for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedWeight {
    pub value: WeightValue,
    pub overridden: bool,
    pub inherited_from: Option<CategoryId>,
}

pub fn resolve(set: &CategorySet, id: CategoryId) -> Option<ResolvedWeight> {
    let category = set.get(id)?;
    if let Some(value) = category.weight {
        return Some(ResolvedWeight {
            value,
            overridden: true,
            inherited_from: None,
        });
    }
    let parent = category.parent_id.and_then(|parent_id| set.get(parent_id));
    match parent.and_then(|p| p.weight.map(|w| (p.id, w))) {
        Some((parent_id, value)) => Some(ResolvedWeight {
            value,
            overridden: false,
            inherited_from: Some(parent_id),
        }),
        None => Some(ResolvedWeight {
            value: WeightValue::default(),
            overridden: false,
            inherited_from: None,
        }),
    }
}

/// Mean multiplier over the effective weights of `ids`; unknown ids count as neutral.
pub fn category_multiplier(set: &CategorySet, ids: &[CategoryId]) -> f64 {
    if ids.is_empty() {
        return 1.0;
    }
    let total: f64 = ids
        .iter()
        .map(|id| {
            set.effective_weight(*id)
                .unwrap_or_default()
                .multiplier()
        })
        .sum();
    total / ids.len() as f64
}

/// True when any listed category is hidden or effectively blocked.
pub fn is_blocked(set: &CategorySet, ids: &[CategoryId]) -> bool {
    ids.iter().any(|id| match set.get(*id) {
        Some(category) if category.is_hidden => true,
        Some(_) => set
            .effective_weight(*id)
            .is_some_and(WeightValue::is_blocked),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, parent: Option<i64>, weight: Option<WeightValue>) -> Category {
        let mut c = Category::discovered(CategoryId::new(id), &format!("cat {id}"));
        c.parent_id = parent.map(CategoryId::new);
        c.weight = weight;
        c
    }

    #[test]
    fn parse_accepts_canonical_and_legacy() {
        assert_eq!(WeightValue::parse("HIGH").unwrap(), WeightValue::High);
        assert_eq!(WeightValue::parse(" boost ").unwrap(), WeightValue::Medium);
        assert_eq!(WeightValue::parse("block").unwrap(), WeightValue::Blocked);
        assert!(WeightValue::parse("extreme").is_err());
        assert_eq!(parse_override("Inherit").unwrap(), None);
        assert_eq!(parse_override("low").unwrap(), Some(WeightValue::Low));
    }

    #[test]
    fn serde_emits_canonical_names() {
        let json = serde_json::to_string(&WeightValue::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let legacy: WeightValue = serde_json::from_str("\"reduce\"").unwrap();
        assert_eq!(legacy, WeightValue::Low);
        assert!(serde_json::from_str::<WeightValue>("\"bogus\"").is_err());
    }

    #[test]
    fn effective_weight_precedence() {
        let own = category(1, None, Some(WeightValue::High));
        assert_eq!(
            effective_weight(&own, Some(WeightValue::Low)),
            WeightValue::High
        );
        let bare = category(2, None, None);
        assert_eq!(
            effective_weight(&bare, Some(WeightValue::Low)),
            WeightValue::Low
        );
        assert_eq!(effective_weight(&bare, None), WeightValue::Neutral);
        assert!(is_overridden(&own));
        assert!(!is_overridden(&bare));
    }

    #[test]
    fn resolve_reports_inheritance_source() {
        let set = CategorySet::from_categories([
            category(1, None, Some(WeightValue::Medium)),
            category(2, Some(1), None),
            category(3, Some(1), Some(WeightValue::Blocked)),
        ]);
        let inherited = resolve(&set, CategoryId::new(2)).unwrap();
        assert_eq!(inherited.value, WeightValue::Medium);
        assert_eq!(inherited.inherited_from, Some(CategoryId::new(1)));
        assert!(!inherited.overridden);

        let own = resolve(&set, CategoryId::new(3)).unwrap();
        assert_eq!(own.value, WeightValue::Blocked);
        assert!(own.overridden);
        assert!(resolve(&set, CategoryId::new(9)).is_none());
    }

    #[test]
    fn multiplier_and_blocked_checks() {
        let mut hidden = category(4, None, None);
        hidden.is_hidden = true;
        let set = CategorySet::from_categories([
            category(1, None, Some(WeightValue::High)),
            category(2, None, Some(WeightValue::Low)),
            category(3, Some(1), None),
            hidden,
        ]);
        let ids = [CategoryId::new(1), CategoryId::new(2)];
        assert!((category_multiplier(&set, &ids) - 1.25).abs() < f64::EPSILON);
        assert!((category_multiplier(&set, &[]) - 1.0).abs() < f64::EPSILON);
        assert!(!is_blocked(&set, &ids));
        assert!(is_blocked(&set, &[CategoryId::new(3), CategoryId::new(4)]));
    }
}
