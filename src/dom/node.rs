//! Node handles and tree mutation.
//!
//! A [`Node`] is a cheap, cloneable handle (`Rc`) to one node of a document
//! tree. Parents own their children; children point back with a `Weak`.
//! Shadow roots hang off their host element and point back at it, which is
//! how connectedness crosses the shadow boundary.
//!
//! Tree mutations notify the component registry when nodes enter or leave a
//! connected tree. No `RefCell` borrow is held while those callbacks run.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{PlatformError, Result};
use crate::events::{EventChannel, ListenerId, ListenerOptions};
use crate::registry::{self, ComponentSlot};

use super::markup;
use super::selector::Selector;

// =============================================================================
// Types
// =============================================================================

/// What kind of node a handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Fragment,
    ShadowRoot,
    Element,
    Text,
    Comment,
}

/// An event delivered to node listeners.
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub name: String,
    /// Payload of custom events, `Value::Null` for plain events.
    pub detail: Value,
    target: Option<Node>,
}

impl DomEvent {
    /// A plain event with no detail (`input`, `change`, ...).
    pub fn new(name: impl Into<String>) -> Self {
        Self::custom(name, Value::Null)
    }

    /// A custom event carrying `detail`.
    pub fn custom(name: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            target: None,
        }
    }

    /// Node the event was dispatched on.
    pub fn target(&self) -> Option<&Node> {
        self.target.as_ref()
    }
}

struct NodeData {
    kind: NodeKind,
    tag: String,
    attributes: IndexMap<String, String>,
    properties: HashMap<String, Value>,
    text: String,
    children: Vec<Node>,
    parent: Weak<RefCell<NodeData>>,
    host: Weak<RefCell<NodeData>>,
    shadow_root: Option<Node>,
    template_content: Option<Node>,
    component: Option<ComponentSlot>,
    listeners: Rc<EventChannel<DomEvent>>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            attributes: IndexMap::new(),
            properties: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: Weak::new(),
            host: Weak::new(),
            shadow_root: None,
            template_content: None,
            component: None,
            listeners: Rc::new(EventChannel::new()),
        }
    }
}

/// Handle to a document node. Equality is identity.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeData>>,
}

/// Non-owning node handle.
#[derive(Clone)]
pub(crate) struct WeakNode(Weak<RefCell<NodeData>>);

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node::from_rc)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        match data.kind {
            NodeKind::Element => write!(f, "<{}>", data.tag),
            NodeKind::Text => write!(f, "#text({:?})", data.text),
            NodeKind::Comment => write!(f, "#comment({:?})", data.text),
            kind => write!(f, "#{kind:?}"),
        }
    }
}

// =============================================================================
// Construction & inspection
// =============================================================================

impl Node {
    fn with_data(data: NodeData) -> Self {
        Self {
            inner: Rc::new(RefCell::new(data)),
        }
    }

    fn from_rc(inner: Rc<RefCell<NodeData>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.inner))
    }

    fn data(&self) -> Ref<'_, NodeData> {
        self.inner.borrow()
    }

    fn data_mut(&self) -> RefMut<'_, NodeData> {
        self.inner.borrow_mut()
    }

    /// A document root. Everything attached below it is connected.
    pub fn document() -> Self {
        let document = Self::with_data(NodeData::new(NodeKind::Document));
        registry::track_document(&document);
        document
    }

    /// An element. Tag names are ASCII-lowercased; `template` elements get
    /// an inert content fragment.
    pub fn element(tag: &str) -> Self {
        let mut data = NodeData::new(NodeKind::Element);
        data.tag = tag.to_ascii_lowercase();
        if data.tag == "template" {
            data.template_content = Some(Self::fragment());
        }
        Self::with_data(data)
    }

    pub fn text(content: &str) -> Self {
        let mut data = NodeData::new(NodeKind::Text);
        data.text = content.to_string();
        Self::with_data(data)
    }

    pub fn comment(content: &str) -> Self {
        let mut data = NodeData::new(NodeKind::Comment);
        data.text = content.to_string();
        Self::with_data(data)
    }

    pub fn fragment() -> Self {
        Self::with_data(NodeData::new(NodeKind::Fragment))
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    /// Lowercase tag name, empty for non-elements.
    pub fn tag_name(&self) -> String {
        self.data().tag.clone()
    }

    pub fn parent(&self) -> Option<Node> {
        self.data().parent.upgrade().map(Self::from_rc)
    }

    /// Parent if it is an element. Stops at shadow roots and fragments.
    pub fn parent_element(&self) -> Option<Node> {
        self.parent().filter(Node::is_element)
    }

    /// Host element of a shadow root.
    pub fn host(&self) -> Option<Node> {
        self.data().host.upgrade().map(Self::from_rc)
    }

    pub fn child_nodes(&self) -> Vec<Node> {
        self.data().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.data().children.first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.data().children.last().cloned()
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        self.sibling(-1)
    }

    pub fn next_sibling(&self) -> Option<Node> {
        self.sibling(1)
    }

    fn sibling(&self, step: isize) -> Option<Node> {
        let parent = self.parent()?;
        let data = parent.data();
        let index = data.children.iter().position(|child| child == self)?;
        data.children.get(index.checked_add_signed(step)?).cloned()
    }

    /// Address of the shared node data, stable for the node's lifetime.
    pub(super) fn identity(&self) -> NonNull<()> {
        NonNull::from(&*self.inner).cast()
    }

    /// Content fragment of a `template` element.
    pub fn template_content(&self) -> Option<Node> {
        self.data().template_content.clone()
    }

    /// Whether the node is reachable from a document, crossing shadow roots.
    pub fn is_connected(&self) -> bool {
        let mut current = self.clone();
        loop {
            let next = {
                let data = current.data();
                if data.kind == NodeKind::Document {
                    return true;
                }
                data.parent.upgrade().or_else(|| data.host.upgrade())
            };
            match next {
                Some(next) => current = Self::from_rc(next),
                None => return false,
            }
        }
    }

    /// Whether `other` is this node or one of its light-tree descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node == *self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn can_have_children(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::Document | NodeKind::Fragment | NodeKind::ShadowRoot | NodeKind::Element
        )
    }
}

// =============================================================================
// Tree mutation
// =============================================================================

impl Node {
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.insert_before(child, None)
    }

    /// Insert `child` before `reference` (or at the end). Fragments insert
    /// their children and are left empty. A node already in a tree is moved.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<()> {
        if !self.can_have_children() {
            return Err(PlatformError::HierarchyRequest(
                "this node cannot have children",
            ));
        }
        if matches!(child.kind(), NodeKind::Document | NodeKind::ShadowRoot) {
            return Err(PlatformError::HierarchyRequest(
                "documents and shadow roots cannot be inserted",
            ));
        }
        if child.contains(self) {
            return Err(PlatformError::HierarchyRequest(
                "a node cannot be inserted into itself or its descendants",
            ));
        }
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if reference.parent().as_ref() != Some(self) {
                return Err(PlatformError::NotFound);
            }
        }

        let incoming = if child.kind() == NodeKind::Fragment {
            let moved: Vec<Node> = std::mem::take(&mut child.data_mut().children);
            for node in &moved {
                node.data_mut().parent = Weak::new();
            }
            moved
        } else {
            if let Some(old_parent) = child.parent() {
                old_parent.remove_child(child)?;
            }
            vec![child.clone()]
        };

        {
            let mut data = self.data_mut();
            let index = reference
                .and_then(|r| data.children.iter().position(|c| c == r))
                .unwrap_or(data.children.len());
            for (offset, node) in incoming.iter().enumerate() {
                node.data_mut().parent = Rc::downgrade(&self.inner);
                data.children.insert(index + offset, node.clone());
            }
        }

        if self.is_connected() {
            for node in &incoming {
                registry::connect_subtree(node);
            }
        }
        Ok(())
    }

    /// Detach `child` and return it.
    pub fn remove_child(&self, child: &Node) -> Result<Node> {
        let was_connected = {
            let index = self
                .data()
                .children
                .iter()
                .position(|c| c == child)
                .ok_or(PlatformError::NotFound)?;
            let connected = self.is_connected();
            self.data_mut().children.remove(index);
            child.data_mut().parent = Weak::new();
            connected
        };
        if was_connected {
            registry::disconnect_subtree(child);
        }
        Ok(child.clone())
    }

    /// Put `new_child` where `old_child` is and return `old_child`.
    pub fn replace_child(&self, new_child: &Node, old_child: &Node) -> Result<Node> {
        if old_child.parent().as_ref() != Some(self) {
            return Err(PlatformError::NotFound);
        }
        if new_child == old_child {
            return Ok(old_child.clone());
        }
        self.insert_before(new_child, Some(old_child))?;
        self.remove_child(old_child)
    }

    /// Detach this node from its parent, if any.
    pub fn remove(&self) -> Result<()> {
        if let Some(parent) = self.parent() {
            parent.remove_child(self)?;
        }
        Ok(())
    }

    /// Copy this node. Attributes and text are copied, dynamic properties,
    /// listeners, shadow roots and component instances are not.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = {
            let data = self.data();
            let mut fresh = NodeData::new(data.kind);
            fresh.tag = data.tag.clone();
            fresh.attributes = data.attributes.clone();
            fresh.text = data.text.clone();
            fresh.template_content = data
                .template_content
                .as_ref()
                .map(|content| content.clone_node(true));
            Node::with_data(fresh)
        };
        if deep {
            for child in self.child_nodes() {
                let child_copy = child.clone_node(true);
                child_copy.data_mut().parent = Rc::downgrade(&copy.inner);
                copy.data_mut().children.push(child_copy);
            }
        }
        copy
    }
}

// =============================================================================
// Text, attributes, properties
// =============================================================================

impl Node {
    /// Concatenated descendant text, or the data of a text/comment node.
    pub fn text_content(&self) -> String {
        let data = self.data();
        match data.kind {
            NodeKind::Text | NodeKind::Comment => data.text.clone(),
            _ => {
                let mut out = String::new();
                for child in &data.children {
                    if child.kind() != NodeKind::Comment {
                        out.push_str(&child.text_content());
                    }
                }
                out
            }
        }
    }

    /// Replace all children with a single text node (none if `text` is empty).
    pub fn set_text_content(&self, text: &str) -> Result<()> {
        match self.kind() {
            NodeKind::Text | NodeKind::Comment => {
                self.data_mut().text = text.to_string();
                Ok(())
            }
            _ => {
                for child in self.child_nodes() {
                    self.remove_child(&child)?;
                }
                if !text.is_empty() {
                    self.append_child(&Node::text(text))?;
                }
                Ok(())
            }
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.data().attributes.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.data().attributes.contains_key(&name.to_ascii_lowercase())
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.data()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set an attribute. Observed attributes of upgraded custom elements are
    /// routed to the component after the write.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let old = self
            .data_mut()
            .attributes
            .insert(name.clone(), value.to_string());
        registry::attribute_changed(self, &name, old.as_deref(), Some(value));
    }

    pub fn remove_attribute(&self, name: &str) {
        let name = name.to_ascii_lowercase();
        let old = self.data_mut().attributes.shift_remove(&name);
        if old.is_some() {
            registry::attribute_changed(self, &name, old.as_deref(), None);
        }
    }

    /// Dynamic (non-attribute) property, the `el.value` of script land.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.data().properties.get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        self.data_mut()
            .properties
            .insert(name.to_string(), value.into());
    }
}

// =============================================================================
// Shadow DOM, selectors, markup
// =============================================================================

impl Node {
    /// Attach an open shadow root to this element.
    pub fn attach_shadow(&self) -> Result<Node> {
        if !self.is_element() {
            return Err(PlatformError::HierarchyRequest(
                "only elements can host a shadow root",
            ));
        }
        if self.data().shadow_root.is_some() {
            return Err(PlatformError::ShadowRootExists {
                tag: self.tag_name(),
            });
        }
        let mut data = NodeData::new(NodeKind::ShadowRoot);
        data.host = Rc::downgrade(&self.inner);
        let root = Node::with_data(data);
        self.data_mut().shadow_root = Some(root.clone());
        Ok(root)
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.data().shadow_root.clone()
    }

    /// First light-tree descendant matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Node>> {
        let selector = Selector::parse(selector)?;
        Ok(self.find_first(&selector))
    }

    /// Every light-tree descendant matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Node>> {
        let selector = Selector::parse(selector)?;
        let mut out = Vec::new();
        self.collect_matches(&selector, &mut out);
        Ok(out)
    }

    pub fn matches(&self, selector: &str) -> Result<bool> {
        Ok(Selector::parse(selector)?.matches(self))
    }

    pub(crate) fn find_first(&self, selector: &Selector) -> Option<Node> {
        for child in self.child_nodes() {
            if selector.matches(&child) {
                return Some(child);
            }
            if let Some(found) = child.find_first(selector) {
                return Some(found);
            }
        }
        None
    }

    fn collect_matches(&self, selector: &Selector, out: &mut Vec<Node>) {
        for child in self.child_nodes() {
            if selector.matches(&child) {
                out.push(child.clone());
            }
            child.collect_matches(selector, out);
        }
    }

    /// Replace the children (or template content) with parsed `html`.
    pub fn set_inner_html(&self, html: &str) -> Result<()> {
        let target = self.template_content().unwrap_or_else(|| self.clone());
        let context = match self.kind() {
            NodeKind::Element => self.tag_name(),
            _ => "body".to_string(),
        };
        for child in target.child_nodes() {
            target.remove_child(&child)?;
        }
        target.append_child(&markup::parse_fragment(html, &context))
    }

    /// Serialized children (or template content).
    pub fn inner_html(&self) -> String {
        let target = self.template_content().unwrap_or_else(|| self.clone());
        markup::serialize_children(&target)
    }

    /// Serialized node including itself.
    pub fn outer_html(&self) -> String {
        markup::serialize(self)
    }
}

// =============================================================================
// Events & components
// =============================================================================

impl Node {
    pub fn add_event_listener(
        &self,
        name: &str,
        callback: impl Fn(&DomEvent) + 'static,
    ) -> ListenerId {
        self.data()
            .listeners
            .add_listener(name, callback, ListenerOptions::empty())
    }

    pub fn add_event_listener_with(
        &self,
        name: &str,
        callback: impl Fn(&DomEvent) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        self.data().listeners.add_listener(name, callback, options)
    }

    pub fn remove_event_listener(&self, name: &str, id: ListenerId) -> bool {
        self.data().listeners.remove_listener(name, id)
    }

    /// Deliver `event` to this node's listeners. Events do not bubble.
    pub fn dispatch_event(&self, mut event: DomEvent) -> usize {
        event.target = Some(self.clone());
        let listeners = Rc::clone(&self.data().listeners);
        listeners.dispatch(&event.name, &event)
    }

    pub fn event_listener_count(&self, name: &str) -> usize {
        self.data().listeners.listener_count(name)
    }

    /// Component instance of type `C` attached to this element, if upgraded.
    pub fn component<C: Any>(&self) -> Option<Rc<C>> {
        let slot = self.data().component.clone()?;
        slot.instance().downcast::<C>().ok()
    }

    pub fn is_upgraded(&self) -> bool {
        self.data().component.is_some()
    }

    pub(crate) fn component_slot(&self) -> Option<ComponentSlot> {
        self.data().component.clone()
    }

    pub(crate) fn set_component_slot(&self, slot: ComponentSlot) {
        self.data_mut().component = Some(slot);
    }
}
