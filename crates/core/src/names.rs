#![forbid(unsafe_code)]

//! Category name normalization.
//!
//! A name has two stored forms: the display name (trimmed, inner whitespace
//! collapsed to single spaces) and the slug (case-folded, every run of
//! non-alphanumeric characters collapsed to one `-`). Uniqueness is checked
//! against both.

pub const DEFAULT_MAX_NAME_LEN: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryName {
    display: String,
    slug: String,
}

impl CategoryName {
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, NameError> {
        if raw.chars().any(|c| c.is_control() && !c.is_whitespace()) {
            return Err(NameError::ContainsControl);
        }
        let display = normalize_display_name(raw);
        if display.is_empty() {
            return Err(NameError::Empty);
        }
        if display.chars().count() > max_len {
            return Err(NameError::TooLong { max: max_len });
        }
        let slug = slugify(&display);
        if slug.is_empty() {
            return Err(NameError::NoSlug);
        }
        Ok(Self { display, slug })
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Case-folded display name used for case-insensitive comparison.
    pub fn display_key(&self) -> String {
        fold_case(&self.display)
    }

    pub fn into_parts(self) -> (String, String) {
        (self.display, self.slug)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameError {
    Empty,
    TooLong { max: usize },
    ContainsControl,
    NoSlug,
}

impl NameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "category name must not be empty",
            Self::TooLong { .. } => "category name is too long",
            Self::ContainsControl => "category name contains control characters",
            Self::NoSlug => "category name must contain a letter or digit",
        }
    }
}

pub fn normalize_display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}
