//! Template and style loaders.
//!
//! A [`Loader`] produces fresh DOM for a shadow root. Inline loaders are
//! ready at construction; remote loaders fetch their text in
//! [`Loader::init`] and cache it after the first successful load.
//!
//! ```ignore
//! let options = LoaderOptions::new().base_url(Url::parse("https://cdn.cian.site/filters/")?);
//! let template = Rc::new(RemoteTemplate::new("filters-widget.html", options.clone()));
//! let style = Rc::new(RemoteStyle::new("filters-widget.css", options));
//! futures::try_join!(template.init(), style.init())?;
//! shadow.append_child(&style.create_dom()?)?;
//! shadow.append_child(&template.create_dom()?)?;
//! ```

pub mod style;
pub mod template;

pub use style::{RemoteStyle, StringStyle};
pub use template::{RemoteTemplate, StringTemplate, Template};

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use url::Url;

use crate::config::PlatformConfig;
use crate::dom::Node;
use crate::error::{PlatformError, Result};
use crate::fetch::{self, Fetch};

/// Source of DOM for a shadow root.
pub trait Loader {
    /// Resolves once the content is resident. Idempotent.
    fn init(&self) -> LocalBoxFuture<'_, Result<()>>;

    /// A fresh copy of the content, safe to insert anywhere.
    fn create_dom(&self) -> Result<Node>;
}

/// Where remote loaders resolve and fetch from.
#[derive(Clone, Default)]
pub struct LoaderOptions {
    pub base_url: Option<Url>,
    /// Falls back to [`fetch::default_fetcher`] at load time.
    pub fetcher: Option<Rc<dyn Fetch>>,
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            fetcher: None,
        }
    }

    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn fetcher(mut self, fetcher: Rc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    fn resolve_fetcher(&self) -> Rc<dyn Fetch> {
        self.fetcher.clone().unwrap_or_else(fetch::default_fetcher)
    }
}

/// Resolve `url` against `base`. Absolute URLs ignore the base.
pub fn resolve_url(url: &str, base: Option<&Url>) -> Result<Url> {
    let resolved = match base {
        Some(base) => base.join(url),
        None => Url::parse(url),
    };
    resolved.map_err(|e| PlatformError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Make every `link[href]` under `content` absolute against `base`.
/// Without a base, hrefs are left as written.
pub(crate) fn rewrite_links(content: &Node, base: Option<&Url>) -> Result<()> {
    let Some(base) = base else {
        return Ok(());
    };
    for link in content.query_selector_all("link[href]")? {
        let Some(href) = link.get_attribute("href") else {
            continue;
        };
        let absolute = resolve_url(&href, Some(base))?;
        link.set_attribute("href", absolute.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let base = Url::parse("https://cdn.cian.site/filters/filters-widget.js").unwrap();
        assert_eq!(
            resolve_url("filters-widget.html", Some(&base)).unwrap().as_str(),
            "https://cdn.cian.site/filters/filters-widget.html"
        );
        assert_eq!(
            resolve_url("https://other.test/x.css", Some(&base)).unwrap().as_str(),
            "https://other.test/x.css"
        );
    }

    #[test]
    fn test_resolve_relative_without_base_fails() {
        let err = resolve_url("x.html", None).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidUrl { .. }));
    }

    #[test]
    fn test_rewrite_links() {
        let base = Url::parse("https://cdn.cian.site/w/").unwrap();
        let content = Node::fragment();
        content
            .set_inner_html("<link rel=stylesheet href=\"a.css\"><link rel=icon><a href=\"b\">b</a>")
            .unwrap();
        rewrite_links(&content, Some(&base)).unwrap();
        let links = content.query_selector_all("link").unwrap();
        assert_eq!(
            links[0].get_attribute("href").as_deref(),
            Some("https://cdn.cian.site/w/a.css")
        );
        assert!(!links[1].has_attribute("href"));
        // Only links are rewritten.
        let anchor = content.query_selector("a").unwrap().unwrap();
        assert_eq!(anchor.get_attribute("href").as_deref(), Some("b"));
    }
}
