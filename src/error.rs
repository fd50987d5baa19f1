//! Error types shared across the crate.
//!
//! Every fallible operation returns [`PlatformError`]. The enum is `Clone`
//! because module initialization hands one shared outcome to every caller
//! awaiting it (see [`crate::registry::ModuleInit`]).

/// Errors produced while parsing a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("invalid selector `{selector}` at column {column}: {reason}")]
    Invalid {
        selector: String,
        column: u32,
        reason: String,
    },
}

/// Crate-wide error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    /// Fetching a remote template or style failed.
    #[error("failed to fetch `{url}`: {reason}")]
    Fetch { url: String, reason: String },

    /// A URL could not be resolved against its base.
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A remote loader was asked for DOM before `init()` completed.
    #[error("{what} is not loaded yet, await init() first")]
    NotLoaded { what: String },

    /// A lazy reference resolved to nothing.
    #[error("reference `{selector}` did not match any node")]
    UnresolvedRef { selector: String },

    /// A reference was dereferenced before its render root was ready.
    #[error("reference `{selector}` is not ready")]
    RefNotReady { selector: String },

    #[error("element `{tag}` already has a shadow root")]
    ShadowRootExists { tag: String },

    /// The requested tree mutation would produce an invalid document.
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    /// The node to remove or replace is not a child of the given parent.
    #[error("node is not a child of this parent")]
    NotFound,

    #[error("`{tag}` is not a valid custom element name")]
    InvalidTag { tag: String },

    #[error("custom element `{tag}` is already defined")]
    AlreadyDefined { tag: String },

    #[error("template#{id} not found")]
    MissingTemplate { id: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// A bound value could not be converted to a DOM value.
    #[error("value conversion failed: {0}")]
    Value(String),
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        Self::Value(err.to_string())
    }
}

impl From<toml::de::Error> for PlatformError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = PlatformError> = std::result::Result<T, E>;
