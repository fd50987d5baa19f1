//! Platform configuration.
//!
//! ```toml
//! base_url = "https://cdn.cian.site/"
//! log_filter = "spark_elements=debug"
//!
//! [[rewrites]]
//! from = "https://cdn.cian.site/ui-kit/"
//! to = "http://localhost:8000/ui-kit/"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PlatformError, Result};

/// URL prefix substitution applied before fetching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRewrite {
    pub from: String,
    pub to: String,
}

impl UrlRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// `url` with the `from` prefix replaced, or `None` if it does not apply.
    pub fn apply(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.from)
            .map(|rest| format!("{}{rest}", self.to))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base for loaders created without their own.
    pub base_url: Option<Url>,
    /// `tracing` filter directive, overridden by `SPARK_ELEMENTS_LOG`.
    pub log_filter: Option<String>,
    /// Checked in order; the first matching prefix wins.
    pub rewrites: Vec<UrlRewrite>,
}

impl PlatformConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PlatformError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Apply the first matching rewrite to `url`.
    pub fn rewrite(&self, url: &str) -> Option<String> {
        self.rewrites.iter().find_map(|rewrite| rewrite.apply(url))
    }
}
