//! Asset fetchers used by remote loaders.
//!
//! - [`MapFetcher`] - In-memory assets keyed by absolute URL.
//! - [`FileFetcher`] - `file://` URLs read with `async-fs`.
//! - [`RewritingFetcher`] - Prefix rewrites in front of another fetcher, the
//!   dev-server mapping of CDN URLs to a local origin.
//! - `ReqwestFetcher` - `http(s)` URLs through `reqwest`, behind the `http`
//!   feature.
//!
//! Loaders without an explicit fetcher use the thread's default, replaced
//! with [`install`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use url::Url;

use crate::config::{PlatformConfig, UrlRewrite};
use crate::error::{PlatformError, Result};

/// Source of template and style text.
pub trait Fetch {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String>>;
}

thread_local! {
    static DEFAULT_FETCHER: RefCell<Rc<dyn Fetch>> = RefCell::new(Rc::new(FileFetcher));
}

/// Make `fetcher` the default for this thread.
pub fn install(fetcher: Rc<dyn Fetch>) {
    DEFAULT_FETCHER.with(|slot| *slot.borrow_mut() = fetcher);
}

/// The fetcher loaders use when none was configured.
pub fn default_fetcher() -> Rc<dyn Fetch> {
    DEFAULT_FETCHER.with(|slot| Rc::clone(&slot.borrow()))
}

// =============================================================================
// MapFetcher
// =============================================================================

/// Serves assets from memory.
#[derive(Debug, Default)]
pub struct MapFetcher {
    assets: RefCell<HashMap<String, String>>,
    requests: Cell<usize>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MapFetcher::insert`].
    pub fn with(self, url: &str, body: &str) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&self, url: &str, body: &str) {
        self.assets
            .borrow_mut()
            .insert(url.to_string(), body.to_string());
    }

    /// Number of fetches served or refused so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl Fetch for MapFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String>> {
        self.requests.set(self.requests.get() + 1);
        let result = self
            .assets
            .borrow()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| PlatformError::Fetch {
                url: url.to_string(),
                reason: "404 not found".to_string(),
            });
        future::ready(result).boxed_local()
    }
}

// =============================================================================
// FileFetcher
// =============================================================================

/// Reads `file://` URLs from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetch for FileFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String>> {
        let url = url.clone();
        async move {
            let path = url.to_file_path().map_err(|()| PlatformError::Fetch {
                url: url.to_string(),
                reason: "only file:// urls can be read from disk".to_string(),
            })?;
            async_fs::read_to_string(&path)
                .await
                .map_err(|e| PlatformError::Fetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
        }
        .boxed_local()
    }
}

// =============================================================================
// RewritingFetcher
// =============================================================================

/// Rewrites URL prefixes, then delegates.
pub struct RewritingFetcher {
    rewrites: Vec<UrlRewrite>,
    inner: Rc<dyn Fetch>,
}

impl RewritingFetcher {
    pub fn new(rewrites: Vec<UrlRewrite>, inner: Rc<dyn Fetch>) -> Self {
        Self { rewrites, inner }
    }

    pub fn from_config(config: &PlatformConfig, inner: Rc<dyn Fetch>) -> Self {
        Self::new(config.rewrites.clone(), inner)
    }

    fn rewrite(&self, url: &Url) -> Result<Url> {
        let Some(rewritten) = self.rewrites.iter().find_map(|r| r.apply(url.as_str())) else {
            return Ok(url.clone());
        };
        tracing::debug!(from = %url, to = %rewritten, "rewriting fetch");
        Url::parse(&rewritten).map_err(|e| PlatformError::InvalidUrl {
            url: rewritten,
            reason: e.to_string(),
        })
    }
}

impl Fetch for RewritingFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String>> {
        match self.rewrite(url) {
            Ok(target) => self.inner.fetch(&target),
            Err(err) => future::ready(Err(err)).boxed_local(),
        }
    }
}

// =============================================================================
// ReqwestFetcher
// =============================================================================

/// Fetches `http(s)` URLs with a shared [`reqwest::Client`].
///
/// `reqwest` runs on tokio, so the returned futures must be polled inside a
/// tokio runtime context, e.g. a current-thread runtime's `block_on` or a
/// `LocalSet`. Non-success statuses are reported as [`PlatformError::Fetch`].
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl Fetch for ReqwestFetcher {
    fn fetch(&self, url: &Url) -> LocalBoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let url = url.clone();
        async move {
            let failed = |e: reqwest::Error| PlatformError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            };
            let response = client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(failed)?;
            response.text().await.map_err(failed)
        }
        .boxed_local()
    }
}
