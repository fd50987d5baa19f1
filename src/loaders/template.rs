//! Template loaders.

use std::cell::RefCell;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::dom::Node;
use crate::error::{PlatformError, Result};

use super::{Loader, LoaderOptions, resolve_url, rewrite_links};

fn parse_template(html: &str, options: &LoaderOptions) -> Result<Node> {
    let template = Node::element("template");
    template.set_inner_html(html)?;
    if let Some(content) = template.template_content() {
        rewrite_links(&content, options.base_url.as_ref())?;
    }
    Ok(template)
}

fn clone_content(template: &Node) -> Node {
    match template.template_content() {
        Some(content) => content.clone_node(true),
        None => template.clone_node(true),
    }
}

// =============================================================================
// Template
// =============================================================================

/// Wraps an existing `template` element.
#[derive(Debug, Clone)]
pub struct Template {
    template: Node,
}

impl Template {
    pub fn new(template: Node) -> Self {
        Self { template }
    }

    pub fn node(&self) -> &Node {
        &self.template
    }
}

impl Loader for Template {
    fn init(&self) -> LocalBoxFuture<'_, Result<()>> {
        future::ready(Ok(())).boxed_local()
    }

    fn create_dom(&self) -> Result<Node> {
        Ok(clone_content(&self.template))
    }
}

// =============================================================================
// StringTemplate
// =============================================================================

/// Template markup given inline.
#[derive(Debug, Clone)]
pub struct StringTemplate {
    template: Node,
}

impl StringTemplate {
    /// Parses `html`. `link[href]`s are made absolute against the base URL.
    pub fn new(html: &str, options: LoaderOptions) -> Result<Self> {
        Ok(Self {
            template: parse_template(html, &options)?,
        })
    }
}

impl Loader for StringTemplate {
    fn init(&self) -> LocalBoxFuture<'_, Result<()>> {
        future::ready(Ok(())).boxed_local()
    }

    fn create_dom(&self) -> Result<Node> {
        Ok(clone_content(&self.template))
    }
}

// =============================================================================
// RemoteTemplate
// =============================================================================

/// Template markup fetched from `url`, relative to the base URL.
#[derive(Debug)]
pub struct RemoteTemplate {
    url: String,
    options: LoaderOptions,
    template: RefCell<Option<Node>>,
}

impl RemoteTemplate {
    pub fn new(url: impl Into<String>, options: LoaderOptions) -> Self {
        Self {
            url: url.into(),
            options,
            template: RefCell::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.template.borrow().is_some()
    }

    fn loaded(&self) -> Result<Node> {
        self.template
            .borrow()
            .clone()
            .ok_or_else(|| PlatformError::NotLoaded {
                what: format!("template `{}`", self.url),
            })
    }

    /// The nested `template#id` of the loaded markup, as its own loader.
    pub fn inner_template(&self, id: &str) -> Result<Template> {
        let template = self.loaded()?;
        let content = template.template_content().unwrap_or(template);
        content
            .query_selector_all("template")?
            .into_iter()
            .find(|node| node.get_attribute("id").as_deref() == Some(id))
            .map(Template::new)
            .ok_or_else(|| PlatformError::MissingTemplate { id: id.to_string() })
    }
}

impl Loader for RemoteTemplate {
    fn init(&self) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            if self.is_loaded() {
                return Ok(());
            }
            let url = resolve_url(&self.url, self.options.base_url.as_ref())?;
            tracing::debug!(%url, "loading template");
            let html = self.options.resolve_fetcher().fetch(&url).await?;
            let template = parse_template(&html, &self.options)?;
            *self.template.borrow_mut() = Some(template);
            Ok(())
        }
        .boxed_local()
    }

    fn create_dom(&self) -> Result<Node> {
        Ok(clone_content(&self.loaded()?))
    }
}
