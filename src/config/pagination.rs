use serde::Deserialize;

/// Bounds for client-supplied page sizes and the secret sealing page tokens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when the client sends none (default: 10)
    pub default_limit: usize,

    /// Smallest accepted page size (default: 1)
    pub min_limit: usize,

    /// Largest accepted page size (default: 20)
    pub max_limit: usize,

    /// Key mixed into every page token digest
    pub token_secret: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            min_limit: 1,
            max_limit: 20,
            token_secret: "conduit-development-secret".to_string(),
        }
    }
}
