//! Positional list projection.
//!
//! Every `changed` of the backing list runs one reconciliation pass keyed by
//! index, never by item identity:
//!
//! 1. Items past the new length lose their nodes and are destroyed, in index
//!    order.
//! 2. Items within both lengths receive the new value through their own
//!    property. Their DOM is reused.
//! 3. Items past the old length get a fresh template clone appended to the
//!    root, a fresh property and a call to the item renderer.
//!
//! Reordering a list is therefore indistinguishable from rewriting the value
//! at every shared index.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::events::ListenerId;
use crate::loaders::Loader;
use crate::reactive::{Observable, Property};
use crate::refs::{Nodes, ReadyCallback, Reference};

use super::{Destroy, RenderState};

/// Builds the bindings of one item from its nodes and value cell.
pub type ItemRenderer<T> = Box<dyn Fn(Rc<Nodes>, Property<T>) -> Rc<dyn Destroy>>;

pub struct ListRendererOptions<O, T> {
    /// Element the items are appended to.
    pub root: Rc<dyn Reference>,
    /// Cloned once per item.
    pub template: Rc<dyn Loader>,
    pub list: O,
    pub item_renderer: ItemRenderer<T>,
}

struct Item<T> {
    nodes: Rc<Nodes>,
    property: Property<T>,
    bindings: Rc<dyn Destroy>,
}

pub struct ListRenderer<O, T> {
    root: Rc<dyn Reference>,
    template: Rc<dyn Loader>,
    list: O,
    item_renderer: ItemRenderer<T>,
    items: RefCell<Vec<Item<T>>>,
    subscription: Cell<Option<ListenerId>>,
    state: RenderState,
}

impl<O, T> fmt::Debug for ListRenderer<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListRenderer")
            .field("items", &self.items.borrow().len())
            .field("rendered", &self.state.is_rendered())
            .finish()
    }
}

impl<O, T> ListRenderer<O, T>
where
    O: Observable<Value = Vec<T>> + 'static,
    T: Clone + 'static,
{
    pub fn new(options: ListRendererOptions<O, T>) -> Rc<Self> {
        let ListRendererOptions {
            root,
            template,
            list,
            item_renderer,
        } = options;
        let renderer = Rc::new(Self {
            root: Rc::clone(&root),
            template,
            list,
            item_renderer,
            items: RefCell::new(Vec::new()),
            subscription: Cell::new(None),
            state: RenderState::default(),
        });
        let pending = Rc::clone(&renderer);
        root.on_ready(Box::new(move || pending.init()));
        renderer
    }

    fn init(self: &Rc<Self>) {
        if self.state.is_destroyed() {
            return;
        }
        if let Err(err) = self.reconcile(&self.list.get()) {
            tracing::error!(error = %err, "list renderer skipped");
            return;
        }
        let renderer = Rc::clone(self);
        let id = self.list.subscribe(move |values| {
            if let Err(err) = renderer.reconcile(values) {
                tracing::error!(error = %err, "list update failed");
            }
        });
        self.subscription.set(Some(id));
        self.state.mark_rendered();
    }

    fn reconcile(&self, values: &[T]) -> Result<()> {
        let root = self.root.el()?;
        let prev_len = self.items.borrow().len();
        let new_len = values.len();
        tracing::trace!(prev_len, new_len, "reconciling list");

        // Callbacks below may read this renderer, so no borrow is held
        // across them.
        let removed = {
            let mut items = self.items.borrow_mut();
            let keep = new_len.min(items.len());
            items.split_off(keep)
        };
        for item in removed {
            for node in item.nodes.nodes() {
                if node.parent().as_ref() == Some(&root) {
                    root.remove_child(node)?;
                }
            }
            item.bindings.destroy();
        }

        let shared: Vec<Property<T>> = self
            .items
            .borrow()
            .iter()
            .map(|item| item.property.clone())
            .collect();
        for (property, value) in shared.iter().zip(values) {
            property.set(value.clone());
        }

        for value in values.iter().skip(prev_len) {
            let before = root.child_count();
            root.append_child(&self.template.create_dom()?)?;
            let added = root.child_nodes().split_off(before);
            let nodes = Nodes::new(added);
            let property = Property::new(value.clone());
            let bindings = (self.item_renderer)(Rc::clone(&nodes), property.clone());
            self.items.borrow_mut().push(Item {
                nodes,
                property,
                bindings,
            });
        }
        Ok(())
    }

    /// Number of items currently projected.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value cell of the item at `index`.
    pub fn item_property(&self, index: usize) -> Option<Property<T>> {
        self.items
            .borrow()
            .get(index)
            .map(|item| item.property.clone())
    }

    pub fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    pub fn on_rendered(&self, callback: ReadyCallback) {
        self.state.on_rendered(callback);
    }
}

impl<O: Observable, T> Destroy for ListRenderer<O, T> {
    /// Also destroys every item's bindings. Projected nodes stay in place.
    fn destroy(&self) {
        self.state.mark_destroyed();
        if let Some(id) = self.subscription.take() {
            self.list.unsubscribe(id);
        }
        let bindings: Vec<Rc<dyn Destroy>> = self
            .items
            .borrow()
            .iter()
            .map(|item| Rc::clone(&item.bindings))
            .collect();
        bindings.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::loaders::{LoaderOptions, StringTemplate};
    use crate::refs::ElementRef;
    use crate::renderer::TextContentRenderer;
    use pretty_assertions::assert_eq;

    struct Fixture {
        ul: Node,
        list: Property<Vec<String>>,
        renderer: Rc<ListRenderer<Property<Vec<String>>, String>>,
        created: Rc<Cell<usize>>,
        destroyed: Rc<Cell<usize>>,
    }

    struct Counted {
        text: Rc<dyn Destroy>,
        destroyed: Rc<Cell<usize>>,
    }

    impl Destroy for Counted {
        fn destroy(&self) {
            self.text.destroy();
            self.destroyed.set(self.destroyed.get() + 1);
        }
    }

    fn fixture(initial: Vec<&str>) -> Fixture {
        let ul = Node::element("ul");
        let list = Property::new(initial.into_iter().map(String::from).collect::<Vec<_>>());
        let created = Rc::new(Cell::new(0));
        let destroyed = Rc::new(Cell::new(0));
        let template: Rc<dyn Loader> = Rc::new(
            StringTemplate::new("<li><span class=title></span></li>", LoaderOptions::new()).unwrap(),
        );
        let created_clone = created.clone();
        let destroyed_clone = destroyed.clone();
        let renderer = ListRenderer::new(ListRendererOptions {
            root: ElementRef::new(ul.clone()),
            template,
            list: list.clone(),
            item_renderer: Box::new(move |nodes: Rc<Nodes>, property: Property<String>| -> Rc<dyn Destroy> {
                created_clone.set(created_clone.get() + 1);
                Rc::new(Counted {
                    text: TextContentRenderer::new(nodes.lazy_ref(".title"), property),
                    destroyed: destroyed_clone.clone(),
                })
            }),
        });
        Fixture {
            ul,
            list,
            renderer,
            created,
            destroyed,
        }
    }

    fn titles(ul: &Node) -> Vec<String> {
        ul.child_nodes().iter().map(Node::text_content).collect()
    }

    fn set(list: &Property<Vec<String>>, values: &[&str]) {
        list.set(values.iter().map(|v| v.to_string()).collect());
    }

    #[test]
    fn test_positional_sequence() {
        let f = fixture(vec![]);
        assert!(f.renderer.is_rendered());
        assert!(f.renderer.is_empty());

        set(&f.list, &["a", "b"]);
        assert_eq!(f.created.get(), 2);
        assert_eq!(titles(&f.ul), vec!["a", "b"]);
        let second = f.ul.child_nodes()[1].clone();

        set(&f.list, &["a", "c"]);
        assert_eq!(f.created.get(), 2);
        assert_eq!(titles(&f.ul), vec!["a", "c"]);
        // Same node, new value.
        assert_eq!(f.ul.child_nodes()[1], second);

        set(&f.list, &["c"]);
        assert_eq!(f.created.get(), 2);
        assert_eq!(f.destroyed.get(), 1);
        assert_eq!(titles(&f.ul), vec!["c"]);
        assert_eq!(f.renderer.len(), 1);
        assert_eq!(f.renderer.item_property(0).unwrap().get(), "c");
        assert!(second.parent().is_none());
    }

    #[test]
    fn test_initial_items_render_on_ready() {
        let f = fixture(vec!["x", "y", "z"]);
        assert_eq!(titles(&f.ul), vec!["x", "y", "z"]);
        assert_eq!(f.created.get(), 3);
    }

    #[test]
    fn test_clear_destroys_in_order() {
        let f = fixture(vec!["x", "y"]);
        let first = f.renderer.item_property(0).unwrap();
        set(&f.list, &[]);
        assert_eq!(f.destroyed.get(), 2);
        assert_eq!(f.ul.child_count(), 0);
        // Destroyed items no longer follow their property.
        assert_eq!(first.listener_count(), 0);
    }

    #[test]
    fn test_destroy_unsubscribes_list() {
        let f = fixture(vec!["x"]);
        let item = f.renderer.item_property(0).unwrap();
        f.renderer.destroy();
        assert_eq!(f.list.listener_count(), 0);
        assert_eq!(item.listener_count(), 0);
        assert_eq!(f.destroyed.get(), 1);
        set(&f.list, &["x", "y"]);
        assert_eq!(f.ul.child_count(), 1);
    }

    #[test]
    fn test_dropped_handle_keeps_projecting() {
        let f = fixture(vec!["x"]);
        let weak = Rc::downgrade(&f.renderer);
        drop(f.renderer);

        set(&f.list, &["x", "y"]);
        assert_eq!(titles(&f.ul), vec!["x", "y"]);
        assert!(weak.upgrade().is_some());
    }
}
