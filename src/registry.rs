//! Custom element registry.
//!
//! Maps element tags to [`Component`] types. A tag is defined at most once
//! per thread, after every declared dependency has loaded, so templates and
//! styles are resident before any instance is constructed.
//!
//! # Lifecycle
//!
//! - An element with a defined tag is upgraded (its component constructed)
//!   when it becomes connected to a document, or at definition time if it is
//!   already connected.
//! - `connected()` runs after every connection, `disconnected()` after every
//!   removal from a connected tree.
//! - Writes to observed attributes of upgraded elements route to
//!   [`Component::attribute_changed`].
//!
//! ```ignore
//! struct CianInput { value: Property<Option<String>>, renderer: Rc<ShadowDomRenderer> }
//!
//! impl Component for CianInput {
//!     const TAG: &'static str = "cian-input";
//!     const OBSERVED_ATTRIBUTES: &'static [&'static str] = &["value"];
//!     fn create(host: &Node) -> Self { /* properties, renderer, links */ }
//!     fn connected(&self) { self.renderer.render(); }
//!     fn attribute_property(&self, name: &str) -> Option<&Property<Option<String>>> {
//!         (name == "value").then_some(&self.value)
//!     }
//! }
//!
//! register::<CianInput>().await?;
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared, try_join_all};

use crate::dom::{Node, WeakNode};
use crate::error::{PlatformError, Result};
use crate::loaders::Loader;
use crate::reactive::Property;

// =============================================================================
// Component contract
// =============================================================================

/// A custom element implementation.
pub trait Component: 'static {
    /// Element tag, a valid custom element name.
    const TAG: &'static str;

    /// Attributes whose changes reach [`Component::attribute_changed`].
    const OBSERVED_ATTRIBUTES: &'static [&'static str] = &[];

    /// Loaders awaited before the tag is defined.
    fn deps() -> Vec<Rc<dyn Loader>> {
        Vec::new()
    }

    /// Construct the instance for `host`.
    fn create(host: &Node) -> Self;

    fn connected(&self) {}

    fn disconnected(&self) {}

    /// The property mirroring attribute `name`.
    fn attribute_property(&self, _name: &str) -> Option<&Property<Option<String>>> {
        None
    }

    /// Default: set the attribute property of the same name.
    fn attribute_changed(&self, name: &str, _old: Option<&str>, new: Option<&str>) {
        match self.attribute_property(name) {
            Some(property) => property.set(new.map(str::to_string)),
            None => {
                tracing::warn!(tag = Self::TAG, attribute = name, "observed attribute has no property");
            }
        }
    }
}

/// Object-safe view of a component's lifecycle hooks.
trait Lifecycle {
    fn observes(&self, name: &str) -> bool;
    fn connected(&self);
    fn disconnected(&self);
    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>);
}

impl<C: Component> Lifecycle for C {
    fn observes(&self, name: &str) -> bool {
        C::OBSERVED_ATTRIBUTES.iter().any(|attr| *attr == name)
    }

    fn connected(&self) {
        Component::connected(self);
    }

    fn disconnected(&self) {
        Component::disconnected(self);
    }

    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        Component::attribute_changed(self, name, old, new);
    }
}

/// A component instance attached to its host element.
#[derive(Clone)]
pub(crate) struct ComponentSlot {
    instance: Rc<dyn Any>,
    hooks: Rc<dyn Lifecycle>,
}

impl ComponentSlot {
    fn new<C: Component>(component: C) -> Self {
        let component = Rc::new(component);
        Self {
            instance: Rc::clone(&component) as Rc<dyn Any>,
            hooks: component,
        }
    }

    pub(crate) fn instance(&self) -> Rc<dyn Any> {
        Rc::clone(&self.instance)
    }
}

impl fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentSlot")
    }
}

// =============================================================================
// Registry state
// =============================================================================

struct Definition {
    construct: Box<dyn Fn(&Node) -> ComponentSlot>,
}

thread_local! {
    /// Defined tags.
    static DEFINITIONS: RefCell<HashMap<String, Rc<Definition>>> = RefCell::new(HashMap::new());

    /// Documents that may hold elements awaiting an upgrade.
    static DOCUMENTS: RefCell<Vec<WeakNode>> = const { RefCell::new(Vec::new()) };
}

fn definition(tag: &str) -> Option<Rc<Definition>> {
    DEFINITIONS.with(|defs| defs.borrow().get(tag).cloned())
}

pub(crate) fn track_document(document: &Node) {
    DOCUMENTS.with(|docs| {
        let mut docs = docs.borrow_mut();
        docs.retain(|doc| doc.upgrade().is_some());
        docs.push(document.downgrade());
    });
}

/// Whether `tag` is a valid custom element name.
pub fn is_valid_tag(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_lowercase())
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}

pub fn is_defined(tag: &str) -> bool {
    DEFINITIONS.with(|defs| defs.borrow().contains_key(tag))
}

// =============================================================================
// Definition
// =============================================================================

/// Define `C` against its tag without awaiting dependencies. Already
/// connected elements with the tag are upgraded immediately.
pub fn define<C: Component>() -> Result<()> {
    let tag = C::TAG;
    if !is_valid_tag(tag) {
        return Err(PlatformError::InvalidTag {
            tag: tag.to_string(),
        });
    }
    DEFINITIONS.with(|defs| {
        let mut defs = defs.borrow_mut();
        if defs.contains_key(tag) {
            return Err(PlatformError::AlreadyDefined {
                tag: tag.to_string(),
            });
        }
        defs.insert(
            tag.to_string(),
            Rc::new(Definition {
                construct: Box::new(|host: &Node| ComponentSlot::new(C::create(host))),
            }),
        );
        Ok(())
    })?;
    tracing::debug!(tag, "custom element defined");

    let documents: Vec<Node> =
        DOCUMENTS.with(|docs| docs.borrow().iter().filter_map(WeakNode::upgrade).collect());
    for document in documents {
        for element in collect_elements(&document) {
            if element.tag_name() == tag && !element.is_upgraded() && element.is_connected() {
                upgrade(&element);
                if let Some(slot) = element.component_slot() {
                    slot.hooks.connected();
                }
            }
        }
    }
    Ok(())
}

/// Await `init()` of every dependency of `C`, then define it. The first
/// failing dependency fails the registration without waiting for the rest.
pub async fn register<C: Component>() -> Result<()> {
    let deps = C::deps();
    try_join_all(deps.iter().map(|dep| dep.init())).await?;
    define::<C>()
}

fn upgrade(element: &Node) {
    let Some(definition) = definition(&element.tag_name()) else {
        return;
    };
    tracing::debug!(tag = %element.tag_name(), "upgrading element");
    let slot = (definition.construct)(element);
    element.set_component_slot(slot);
}

/// Elements of `root`'s subtree in tree order, shadow trees included.
fn collect_elements(root: &Node) -> Vec<Node> {
    fn walk(node: &Node, out: &mut Vec<Node>) {
        if node.is_element() {
            out.push(node.clone());
        }
        if let Some(shadow) = node.shadow_root() {
            walk(&shadow, out);
        }
        for child in node.child_nodes() {
            walk(&child, out);
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

// =============================================================================
// Tree hooks
// =============================================================================

/// `node` was inserted into a connected tree.
pub(crate) fn connect_subtree(node: &Node) {
    // Snapshot first: connection callbacks render shadow trees, and those
    // insertions connect their own nodes.
    for element in collect_elements(node) {
        if !element.is_connected() {
            continue;
        }
        if !element.is_upgraded() {
            upgrade(&element);
        }
        if let Some(slot) = element.component_slot() {
            slot.hooks.connected();
        }
    }
}

/// `node` was removed from a connected tree.
pub(crate) fn disconnect_subtree(node: &Node) {
    for element in collect_elements(node) {
        if let Some(slot) = element.component_slot() {
            slot.hooks.disconnected();
        }
    }
}

pub(crate) fn attribute_changed(node: &Node, name: &str, old: Option<&str>, new: Option<&str>) {
    let Some(slot) = node.component_slot() else {
        return;
    };
    if slot.hooks.observes(name) {
        slot.hooks.attribute_changed(name, old, new);
    }
}

// =============================================================================
// Module initialization
// =============================================================================

/// Shared outcome of a [`ModuleInit`].
pub type InitFuture = Shared<LocalBoxFuture<'static, Result<()>>>;

/// A run-once async initializer.
///
/// [`ModuleInit::run`] may be called any number of times, concurrently or
/// sequentially. The initializer runs on the first call and every caller
/// awaits the same outcome.
///
/// ```ignore
/// thread_local! {
///     static INIT: ModuleInit = ModuleInit::new(|| async {
///         register::<CianInput>().await
///     });
/// }
///
/// pub fn init() -> impl Future<Output = Result<()>> {
///     INIT.with(ModuleInit::run)
/// }
/// ```
pub struct ModuleInit {
    init: RefCell<Option<Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<()>>>>>,
    outcome: RefCell<Option<InitFuture>>,
}

impl fmt::Debug for ModuleInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInit")
            .field("started", &self.outcome.borrow().is_some())
            .finish()
    }
}

impl ModuleInit {
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        Self {
            init: RefCell::new(Some(Box::new(move || init().boxed_local()))),
            outcome: RefCell::new(None),
        }
    }

    /// Start the initializer if needed and return the shared outcome.
    pub fn run(&self) -> InitFuture {
        if let Some(outcome) = self.outcome.borrow().as_ref() {
            return outcome.clone();
        }
        let init = self.init.borrow_mut().take();
        let outcome = match init {
            Some(init) => init().shared(),
            None => futures::future::ready(Ok(())).boxed_local().shared(),
        };
        *self.outcome.borrow_mut() = Some(outcome.clone());
        outcome
    }

    pub fn is_started(&self) -> bool {
        self.outcome.borrow().is_some()
    }
}
