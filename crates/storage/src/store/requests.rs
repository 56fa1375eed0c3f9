#![forbid(unsafe_code)]

/// One label observed by the discovery process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoverRequest {
    pub name: String,
    /// Articles tagged with the label in this batch.
    pub articles: u64,
}

impl DiscoverRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            articles: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpsLogRequest {
    pub limit: usize,
    pub offset: usize,
}

impl Default for OpsLogRequest {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}
