//! Shadow root population.
//!
//! `unrendered -> rendered`, terminal. [`ShadowDomRenderer::render`] waits
//! for the host reference, attaches an open shadow root and appends one
//! fresh copy of every child loader in declaration order. Styles go first so
//! they apply before templated content lays out.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dom::{Node, Selector};
use crate::error::Result;
use crate::loaders::Loader;
use crate::refs::{LazyRef, ReadyCallback, Reference, RenderRoot};

use super::RenderState;

pub struct ShadowDomRenderer {
    this: Weak<Self>,
    reference: Rc<dyn Reference>,
    children: Vec<Rc<dyn Loader>>,
    shadow: RefCell<Option<Node>>,
    requested: Cell<bool>,
    state: RenderState,
}

impl fmt::Debug for ShadowDomRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowDomRenderer")
            .field("children", &self.children.len())
            .field("rendered", &self.state.is_rendered())
            .finish()
    }
}

impl ShadowDomRenderer {
    pub fn new(reference: Rc<dyn Reference>, children: Vec<Rc<dyn Loader>>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            reference,
            children,
            shadow: RefCell::new(None),
            requested: Cell::new(false),
            state: RenderState::default(),
        })
    }

    /// Render once the host reference is ready. Calls after the first are
    /// no-ops.
    pub fn render(&self) {
        if self.requested.replace(true) {
            tracing::trace!("shadow render already requested");
            return;
        }
        let this = self.this.clone();
        self.reference.on_ready(Box::new(move || {
            if let Some(renderer) = this.upgrade() {
                if let Err(err) = renderer.populate() {
                    tracing::error!(error = %err, "shadow render failed");
                    renderer.requested.set(false);
                }
            }
        }));
    }

    fn populate(&self) -> Result<()> {
        let host = self.reference.el()?;
        // Materialize every child before touching the host.
        let nodes = self
            .children
            .iter()
            .map(|child| child.create_dom())
            .collect::<Result<Vec<_>>>()?;
        // A pass that failed after attaching leaves its shadow root recorded.
        // Retries empty and reuse it rather than attaching a second one.
        let attached = self.shadow.borrow().clone();
        let shadow = match attached {
            Some(shadow) => {
                for child in shadow.child_nodes() {
                    shadow.remove_child(&child)?;
                }
                shadow
            }
            None => {
                let shadow = host.attach_shadow()?;
                *self.shadow.borrow_mut() = Some(shadow.clone());
                shadow
            }
        };
        for node in &nodes {
            shadow.append_child(node)?;
        }
        tracing::debug!(host = %host.tag_name(), children = nodes.len(), "shadow rendered");
        self.state.mark_rendered();
        Ok(())
    }

    pub fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    pub fn on_rendered(&self, callback: ReadyCallback) {
        self.state.on_rendered(callback);
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.shadow.borrow().clone()
    }

    /// First match inside the shadow root, `None` before rendering.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Node>> {
        let selector = Selector::parse(selector)?;
        Ok(self.find(&selector))
    }

    /// A [`LazyRef`] scoped to this renderer's output.
    pub fn lazy_ref(self: &Rc<Self>, selector: &str) -> Rc<LazyRef> {
        LazyRef::new(Rc::clone(self) as Rc<dyn RenderRoot>, selector)
    }
}

impl RenderRoot for ShadowDomRenderer {
    fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    fn on_rendered(&self, callback: ReadyCallback) {
        self.state.on_rendered(callback);
    }

    fn find(&self, selector: &Selector) -> Option<Node> {
        self.shadow.borrow().as_ref()?.find_first(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::{LoaderOptions, RemoteTemplate, StringStyle, StringTemplate};
    use crate::refs::ElementRef;
    use std::cell::Cell;

    fn children() -> Vec<Rc<dyn Loader>> {
        vec![
            Rc::new(StringStyle::new("p { color: red }").unwrap()) as Rc<dyn Loader>,
            Rc::new(StringTemplate::new("<p id=title>hi</p>", LoaderOptions::new()).unwrap()),
        ]
    }

    #[test]
    fn test_render_appends_in_order_once() {
        let host = Node::element("x-widget");
        let renderer = ShadowDomRenderer::new(ElementRef::new(host.clone()), children());
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        renderer.on_rendered(Box::new(move || count_clone.set(count_clone.get() + 1)));

        assert!(!renderer.is_rendered());
        renderer.render();
        renderer.render();

        let shadow = host.shadow_root().unwrap();
        let tags: Vec<String> = shadow.child_nodes().iter().map(Node::tag_name).collect();
        assert_eq!(tags, vec!["style", "p"]);
        assert!(renderer.is_rendered());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_query_is_scoped_to_shadow() {
        let host = Node::element("x-widget");
        host.set_inner_html("<p id=title>light</p>").unwrap();
        let renderer = ShadowDomRenderer::new(ElementRef::new(host.clone()), children());
        assert_eq!(renderer.query_selector("#title").unwrap(), None);

        renderer.render();
        let title = renderer.query_selector("#title").unwrap().unwrap();
        assert_eq!(title.text_content(), "hi");
        assert_eq!(title.parent(), renderer.shadow_root());
    }

    #[test]
    fn test_lazy_ref_resolves_after_render() {
        let host = Node::element("x-widget");
        let renderer = ShadowDomRenderer::new(ElementRef::new(host), children());
        let title = renderer.lazy_ref("#title");
        assert!(!title.is_ready());
        renderer.render();
        assert!(title.is_ready());
        assert_eq!(title.el().unwrap().text_content(), "hi");
    }

    #[test]
    fn test_unloaded_child_leaves_renderer_unrendered() {
        let host = Node::element("x-widget");
        let remote: Rc<dyn Loader> = Rc::new(RemoteTemplate::new("a.html", LoaderOptions::new()));
        let renderer = ShadowDomRenderer::new(ElementRef::new(host.clone()), vec![remote]);
        renderer.render();
        assert!(!renderer.is_rendered());
        assert!(host.shadow_root().is_none());
    }

    /// Hands out an uninsertable node on its first `create_dom`.
    struct FailsOnce {
        failed: Cell<bool>,
    }

    impl Loader for FailsOnce {
        fn init(&self) -> futures::future::LocalBoxFuture<'_, Result<()>> {
            Box::pin(futures::future::ready(Ok(())))
        }

        fn create_dom(&self) -> Result<Node> {
            if self.failed.replace(true) {
                Ok(Node::element("footer"))
            } else {
                Node::element("div").attach_shadow()
            }
        }
    }

    #[test]
    fn test_failed_append_can_be_retried() {
        let host = Node::element("x-widget");
        let mut loaders = children();
        loaders.push(Rc::new(FailsOnce {
            failed: Cell::new(false),
        }));
        let renderer = ShadowDomRenderer::new(ElementRef::new(host.clone()), loaders);

        renderer.render();
        assert!(!renderer.is_rendered());
        let shadow = host.shadow_root().unwrap();

        renderer.render();
        assert!(renderer.is_rendered());
        assert_eq!(host.shadow_root(), Some(shadow.clone()));
        let tags: Vec<String> = shadow.child_nodes().iter().map(Node::tag_name).collect();
        assert_eq!(tags, vec!["style", "p", "footer"]);
    }

    #[test]
    fn test_existing_shadow_root_is_reported() {
        let host = Node::element("x-widget");
        host.attach_shadow().unwrap();
        let renderer = ShadowDomRenderer::new(ElementRef::new(host), children());
        renderer.render();
        assert!(!renderer.is_rendered());
    }
}
