//! Deferred handles to DOM nodes.
//!
//! - [`ElementRef`] - A node known up front. Always ready.
//! - [`LazyRef`] - A selector resolved against a [`RenderRoot`] once it has
//!   rendered. Ready exactly once, never reverts.
//! - [`Nodes`] - A fixed node list acting as an always-rendered root, used
//!   for per-item references in list rendering.
//!
//! # Selector misses
//!
//! A lazy reference whose selector matches nothing still becomes ready, but
//! [`Reference::el`] returns [`PlatformError::UnresolvedRef`]. The miss is
//! logged at resolution time and consumers skip the rule they would have
//! installed.
//!
//! ```ignore
//! let renderer = ShadowDomRenderer::new(ElementRef::new(host.clone()), children);
//! let input = LazyRef::new(renderer.clone(), "input");
//! input.on_ready(Box::new(move || { /* input.el() is resolved now */ }));
//! renderer.render();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dom::{Node, Selector};
use crate::error::{PlatformError, Result, SelectorError};
use crate::events::{EventChannel, READY};

/// Callback run once when a reference or root becomes ready.
pub type ReadyCallback = Box<dyn FnOnce()>;

/// Adapt a one-shot callback to the `Fn` listeners of [`EventChannel`].
pub(crate) fn once_listener<D>(callback: ReadyCallback) -> impl Fn(&D) + 'static {
    let slot = Cell::new(Some(callback));
    move |_| {
        if let Some(callback) = slot.take() {
            callback();
        }
    }
}

/// A handle to a node that may not exist yet.
pub trait Reference {
    fn is_ready(&self) -> bool;

    /// Run `callback` now if ready, otherwise exactly once on readiness.
    fn on_ready(&self, callback: ReadyCallback);

    /// The resolved node.
    fn el(&self) -> Result<Node>;
}

/// Something a [`LazyRef`] can resolve against.
pub trait RenderRoot {
    fn is_rendered(&self) -> bool;

    /// Run `callback` now if rendered, otherwise exactly once after the
    /// first render pass.
    fn on_rendered(&self, callback: ReadyCallback);

    /// First node of the rendered output matching `selector`.
    fn find(&self, selector: &Selector) -> Option<Node>;
}

// =============================================================================
// ElementRef
// =============================================================================

/// Reference to a node known at construction.
#[derive(Debug)]
pub struct ElementRef {
    el: Node,
}

impl ElementRef {
    pub fn new(el: Node) -> Rc<Self> {
        Rc::new(Self { el })
    }
}

impl Reference for ElementRef {
    fn is_ready(&self) -> bool {
        true
    }

    fn on_ready(&self, callback: ReadyCallback) {
        callback();
    }

    fn el(&self) -> Result<Node> {
        Ok(self.el.clone())
    }
}

// =============================================================================
// LazyRef
// =============================================================================

/// Reference resolved by selector once its root renders.
pub struct LazyRef {
    root: Rc<dyn RenderRoot>,
    source: String,
    selector: std::result::Result<Selector, SelectorError>,
    ready: Cell<bool>,
    el: RefCell<Option<Node>>,
    channel: EventChannel<()>,
}

impl fmt::Debug for LazyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRef")
            .field("selector", &self.source)
            .field("ready", &self.ready.get())
            .field("el", &*self.el.borrow())
            .finish()
    }
}

impl LazyRef {
    /// An invalid selector is reported when the reference resolves.
    pub fn new(root: Rc<dyn RenderRoot>, selector: &str) -> Rc<Self> {
        let lazy = Rc::new(Self {
            root: Rc::clone(&root),
            source: selector.to_string(),
            selector: Selector::parse(selector),
            ready: Cell::new(false),
            el: RefCell::new(None),
            channel: EventChannel::new(),
        });
        let weak: Weak<Self> = Rc::downgrade(&lazy);
        root.on_rendered(Box::new(move || {
            if let Some(lazy) = weak.upgrade() {
                lazy.resolve();
            }
        }));
        lazy
    }

    pub fn selector(&self) -> &str {
        &self.source
    }

    fn resolve(&self) {
        if self.ready.get() {
            return;
        }
        match &self.selector {
            Ok(selector) => {
                let found = self.root.find(selector);
                if found.is_none() {
                    tracing::warn!(selector = %self.source, "lazy reference matched nothing");
                }
                *self.el.borrow_mut() = found;
            }
            Err(err) => {
                tracing::warn!(selector = %self.source, error = %err, "invalid lazy reference selector");
            }
        }
        self.ready.set(true);
        tracing::debug!(selector = %self.source, "lazy reference ready");
        self.channel.dispatch(READY, &());
    }
}

impl Reference for LazyRef {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn on_ready(&self, callback: ReadyCallback) {
        if self.ready.get() {
            callback();
        } else {
            self.channel.once(READY, once_listener(callback));
        }
    }

    fn el(&self) -> Result<Node> {
        if !self.ready.get() {
            return Err(PlatformError::RefNotReady {
                selector: self.source.clone(),
            });
        }
        if let Err(err) = &self.selector {
            return Err(err.clone().into());
        }
        self.el
            .borrow()
            .clone()
            .ok_or_else(|| PlatformError::UnresolvedRef {
                selector: self.source.clone(),
            })
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// A fixed list of nodes, already rendered.
#[derive(Debug, Clone)]
pub struct Nodes {
    nodes: Vec<Node>,
}

impl Nodes {
    pub fn new(nodes: Vec<Node>) -> Rc<Self> {
        Rc::new(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Shorthand for `LazyRef::new(nodes, selector)`.
    pub fn lazy_ref(self: &Rc<Self>, selector: &str) -> Rc<LazyRef> {
        LazyRef::new(Rc::clone(self) as Rc<dyn RenderRoot>, selector)
    }
}

impl RenderRoot for Nodes {
    fn is_rendered(&self) -> bool {
        true
    }

    fn on_rendered(&self, callback: ReadyCallback) {
        callback();
    }

    /// Each node is tested itself first, then its descendants.
    fn find(&self, selector: &Selector) -> Option<Node> {
        self.nodes
            .iter()
            .filter(|node| node.is_element())
            .find_map(|node| {
                if selector.matches(node) {
                    Some(node.clone())
                } else {
                    node.find_first(selector)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RENDERED;

    /// A root whose render pass is triggered by hand.
    struct ManualRoot {
        content: Node,
        rendered: Cell<bool>,
        channel: EventChannel<()>,
    }

    impl ManualRoot {
        fn new(html: &str) -> Rc<Self> {
            let content = Node::fragment();
            content.set_inner_html(html).unwrap();
            Rc::new(Self {
                content,
                rendered: Cell::new(false),
                channel: EventChannel::new(),
            })
        }

        fn render(&self) {
            self.rendered.set(true);
            self.channel.dispatch(RENDERED, &());
        }
    }

    impl RenderRoot for ManualRoot {
        fn is_rendered(&self) -> bool {
            self.rendered.get()
        }

        fn on_rendered(&self, callback: ReadyCallback) {
            if self.rendered.get() {
                callback();
            } else {
                self.channel.once(RENDERED, once_listener(callback));
            }
        }

        fn find(&self, selector: &Selector) -> Option<Node> {
            self.content.find_first(selector)
        }
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> ReadyCallback) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move || {
            let count = count_clone.clone();
            Box::new(move || count.set(count.get() + 1)) as ReadyCallback
        })
    }

    #[test]
    fn test_element_ref_is_ready() {
        let node = Node::element("div");
        let reference = ElementRef::new(node.clone());
        let (count, make) = counter();
        assert!(reference.is_ready());
        reference.on_ready(make());
        assert_eq!(count.get(), 1);
        assert_eq!(reference.el().unwrap(), node);
    }

    #[test]
    fn test_lazy_ref_waits_for_render() {
        let root = ManualRoot::new("<div><input id=q></div>");
        let lazy = LazyRef::new(root.clone(), "#q");
        let (count, make) = counter();

        lazy.on_ready(make());
        lazy.on_ready(make());
        assert!(!lazy.is_ready());
        assert!(matches!(lazy.el(), Err(PlatformError::RefNotReady { .. })));
        assert_eq!(count.get(), 0);

        root.render();
        assert!(lazy.is_ready());
        assert_eq!(count.get(), 2);
        assert_eq!(lazy.el().unwrap().tag_name(), "input");

        // Late registrations run immediately; earlier ones never rerun.
        lazy.on_ready(make());
        assert_eq!(count.get(), 3);
        root.render();
        assert_eq!(count.get(), 3);
        assert!(lazy.is_ready());
    }

    #[test]
    fn test_lazy_ref_on_rendered_root() {
        let root = ManualRoot::new("<span class=a></span>");
        root.render();
        let lazy = LazyRef::new(root, ".a");
        assert!(lazy.is_ready());
        assert_eq!(lazy.el().unwrap().tag_name(), "span");
    }

    #[test]
    fn test_lazy_ref_miss_is_explicit() {
        let root = ManualRoot::new("<p></p>");
        let lazy = LazyRef::new(root.clone(), "#missing");
        root.render();
        assert!(lazy.is_ready());
        assert_eq!(
            lazy.el().unwrap_err(),
            PlatformError::UnresolvedRef {
                selector: "#missing".to_string()
            }
        );
    }

    #[test]
    fn test_lazy_ref_invalid_selector() {
        let root = ManualRoot::new("<p></p>");
        let lazy = LazyRef::new(root.clone(), "p >");
        root.render();
        assert!(matches!(lazy.el(), Err(PlatformError::Selector(_))));
    }

    #[test]
    fn test_nodes_checks_self_then_descendants() {
        let fragment = Node::fragment();
        fragment
            .set_inner_html("text<li class=item><span class=title>t</span></li><li class=item></li>")
            .unwrap();
        let nodes = Nodes::new(fragment.child_nodes());
        let item = nodes.lazy_ref(".item");
        let title = nodes.lazy_ref(".title");
        assert!(item.is_ready());
        assert_eq!(item.el().unwrap(), fragment.child_nodes()[1]);
        assert_eq!(title.el().unwrap().text_content(), "t");
    }
}
