//! Style loaders. Each produces a `style` element.

use std::cell::RefCell;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::dom::Node;
use crate::error::{PlatformError, Result};

use super::{Loader, LoaderOptions, resolve_url};

fn style_element(css: &str) -> Result<Node> {
    let style = Node::element("style");
    style.set_text_content(css)?;
    Ok(style)
}

/// CSS given inline.
#[derive(Debug, Clone)]
pub struct StringStyle {
    style: Node,
}

impl StringStyle {
    pub fn new(css: &str) -> Result<Self> {
        Ok(Self {
            style: style_element(css)?,
        })
    }
}

impl Loader for StringStyle {
    fn init(&self) -> LocalBoxFuture<'_, Result<()>> {
        future::ready(Ok(())).boxed_local()
    }

    fn create_dom(&self) -> Result<Node> {
        Ok(self.style.clone_node(true))
    }
}

/// CSS fetched from `url`, relative to the base URL.
#[derive(Debug)]
pub struct RemoteStyle {
    url: String,
    options: LoaderOptions,
    style: RefCell<Option<Node>>,
}

impl RemoteStyle {
    pub fn new(url: impl Into<String>, options: LoaderOptions) -> Self {
        Self {
            url: url.into(),
            options,
            style: RefCell::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.style.borrow().is_some()
    }
}

impl Loader for RemoteStyle {
    fn init(&self) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            if self.is_loaded() {
                return Ok(());
            }
            let url = resolve_url(&self.url, self.options.base_url.as_ref())?;
            tracing::debug!(%url, "loading style");
            let css = self.options.resolve_fetcher().fetch(&url).await?;
            *self.style.borrow_mut() = Some(style_element(&css)?);
            Ok(())
        }
        .boxed_local()
    }

    fn create_dom(&self) -> Result<Node> {
        self.style
            .borrow()
            .as_ref()
            .map(|style| style.clone_node(true))
            .ok_or_else(|| PlatformError::NotLoaded {
                what: format!("style `{}`", self.url),
            })
    }
}
