//! Property-to-element synchronization rules.
//!
//! - [`DownLink`] - Writes a value to an attribute or property of the
//!   referenced element, now and on every `changed`.
//! - [`UpLink`] - Writes the value extracted from a DOM event into a
//!   property, then fires `triggered`.
//! - [`TwoWayLink`] - Both, republishing `triggered` as `up-link-triggered`.
//!
//! Each link installs its rule once its reference is ready. A reference that
//! fails to resolve is logged and the rule is skipped. An installed rule owns
//! its link, so dropping the returned handle leaves it in force until
//! [`Destroy::destroy`].
//!
//! ```ignore
//! let link = TwoWayLink::new(TwoWayLinkOptions {
//!     property: self.query.clone(),
//!     reference: input_ref,
//!     target: LinkTarget::Attribute("value".into()),
//!     event: "on-value-change".into(),
//!     value_getter: Box::new(|event| event.detail["value"].as_str().map(String::from)),
//! });
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::dom::{DomEvent, Node};
use crate::error::Result;
use crate::events::{EventChannel, ListenerId, TRIGGERED, UP_LINK_TRIGGERED};
use crate::reactive::{Observable, Property};
use crate::refs::Reference;
use crate::renderer::{Destroy, text_of, to_value};

/// Which side of the element a [`DownLink`] writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// `el.setAttribute(name, text)`. A `null` value removes the attribute.
    Attribute(String),
    /// `el[name] = value`.
    Property(String),
}

impl LinkTarget {
    fn write(&self, el: &Node, value: Value) {
        match self {
            LinkTarget::Attribute(name) if value.is_null() => el.remove_attribute(name),
            LinkTarget::Attribute(name) => el.set_attribute(name, &text_of(&value)),
            LinkTarget::Property(name) => el.set_property(name, value),
        }
    }
}

/// Extracts the linked value from a DOM event.
pub type ValueGetter<T> = Box<dyn Fn(&DomEvent) -> T>;

// =============================================================================
// DownLink
// =============================================================================

pub struct DownLinkOptions<O> {
    pub property: O,
    pub reference: Rc<dyn Reference>,
    pub target: LinkTarget,
}

pub struct DownLink<O> {
    property: O,
    reference: Rc<dyn Reference>,
    target: LinkTarget,
    subscription: Cell<Option<ListenerId>>,
    destroyed: Cell<bool>,
}

impl<O> fmt::Debug for DownLink<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownLink")
            .field("target", &self.target)
            .field("installed", &self.subscription.get().is_some())
            .finish()
    }
}

impl<O> DownLink<O>
where
    O: Observable + 'static,
    O::Value: Serialize,
{
    pub fn new(options: DownLinkOptions<O>) -> Rc<Self> {
        let DownLinkOptions {
            property,
            reference,
            target,
        } = options;
        let link = Rc::new(Self {
            property,
            reference: Rc::clone(&reference),
            target,
            subscription: Cell::new(None),
            destroyed: Cell::new(false),
        });
        let pending = Rc::clone(&link);
        reference.on_ready(Box::new(move || {
            if let Err(err) = pending.install() {
                tracing::error!(error = %err, target = ?pending.target, "down link skipped");
            }
        }));
        link
    }

    fn install(self: &Rc<Self>) -> Result<()> {
        if self.destroyed.get() {
            return Ok(());
        }
        self.apply(&self.property.get())?;
        let link = Rc::clone(self);
        let id = self.property.subscribe(move |value| {
            if let Err(err) = link.apply(value) {
                tracing::error!(error = %err, "down link update failed");
            }
        });
        self.subscription.set(Some(id));
        Ok(())
    }

    fn apply(&self, value: &O::Value) -> Result<()> {
        let el = self.reference.el()?;
        self.target.write(&el, to_value(value)?);
        Ok(())
    }

    /// Whether the rule is in place.
    pub fn is_installed(&self) -> bool {
        self.subscription.get().is_some()
    }
}

impl<O: Observable> Destroy for DownLink<O> {
    fn destroy(&self) {
        self.destroyed.set(true);
        if let Some(id) = self.subscription.take() {
            self.property.unsubscribe(id);
        }
    }
}

// =============================================================================
// UpLink
// =============================================================================

pub struct UpLinkOptions<T> {
    pub reference: Rc<dyn Reference>,
    /// DOM event to listen for on the referenced element.
    pub event: String,
    pub value_getter: ValueGetter<T>,
    pub property: Property<T>,
}

pub struct UpLink<T> {
    reference: Rc<dyn Reference>,
    event: String,
    value_getter: ValueGetter<T>,
    property: Property<T>,
    listener: RefCell<Option<(Node, ListenerId)>>,
    channel: EventChannel<T>,
    destroyed: Cell<bool>,
}

impl<T> fmt::Debug for UpLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpLink")
            .field("event", &self.event)
            .field("installed", &self.listener.borrow().is_some())
            .finish()
    }
}

impl<T: Clone + 'static> UpLink<T> {
    pub fn new(options: UpLinkOptions<T>) -> Rc<Self> {
        let UpLinkOptions {
            reference,
            event,
            value_getter,
            property,
        } = options;
        let link = Rc::new(Self {
            reference: Rc::clone(&reference),
            event,
            value_getter,
            property,
            listener: RefCell::new(None),
            channel: EventChannel::new(),
            destroyed: Cell::new(false),
        });
        let pending = Rc::clone(&link);
        reference.on_ready(Box::new(move || {
            if let Err(err) = pending.install() {
                tracing::error!(error = %err, event = %pending.event, "up link skipped");
            }
        }));
        link
    }

    fn install(self: &Rc<Self>) -> Result<()> {
        if self.destroyed.get() {
            return Ok(());
        }
        let el = self.reference.el()?;
        let link = Rc::clone(self);
        let id = el.add_event_listener(&self.event, move |event| link.trigger(event));
        *self.listener.borrow_mut() = Some((el, id));
        Ok(())
    }

    fn trigger(&self, event: &DomEvent) {
        let value = (self.value_getter)(event);
        self.property.set(value.clone());
        self.channel.dispatch(TRIGGERED, &value);
    }

    /// Listen for `triggered`, fired after the property is updated.
    pub fn on_triggered(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.channel.on(TRIGGERED, callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.channel.remove_listener(TRIGGERED, id)
    }

    pub fn is_installed(&self) -> bool {
        self.listener.borrow().is_some()
    }
}

impl<T> Destroy for UpLink<T> {
    fn destroy(&self) {
        self.destroyed.set(true);
        if let Some((el, id)) = self.listener.borrow_mut().take() {
            el.remove_event_listener(&self.event, id);
        }
    }
}

// =============================================================================
// TwoWayLink
// =============================================================================

pub struct TwoWayLinkOptions<T> {
    pub property: Property<T>,
    pub reference: Rc<dyn Reference>,
    pub target: LinkTarget,
    pub event: String,
    pub value_getter: ValueGetter<T>,
}

pub struct TwoWayLink<T> {
    down: Rc<DownLink<Property<T>>>,
    up: Rc<UpLink<T>>,
    channel: EventChannel<T>,
    republish: Cell<Option<ListenerId>>,
}

impl<T> fmt::Debug for TwoWayLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWayLink")
            .field("down", &self.down)
            .field("up", &self.up)
            .finish()
    }
}

impl<T: Clone + Serialize + 'static> TwoWayLink<T> {
    pub fn new(options: TwoWayLinkOptions<T>) -> Rc<Self> {
        let TwoWayLinkOptions {
            property,
            reference,
            target,
            event,
            value_getter,
        } = options;
        let down = DownLink::new(DownLinkOptions {
            property: property.clone(),
            reference: Rc::clone(&reference),
            target,
        });
        let up = UpLink::new(UpLinkOptions {
            reference,
            event,
            value_getter,
            property,
        });
        let link = Rc::new(Self {
            down,
            up,
            channel: EventChannel::new(),
            republish: Cell::new(None),
        });
        let republishing = Rc::clone(&link);
        let id = link.up.on_triggered(move |value| {
            republishing.channel.dispatch(UP_LINK_TRIGGERED, value);
        });
        link.republish.set(Some(id));
        link
    }

    /// Listen for values pushed up from the element.
    pub fn on_up_link_triggered(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.channel.on(UP_LINK_TRIGGERED, callback)
    }

    pub fn down(&self) -> &DownLink<Property<T>> {
        &self.down
    }

    pub fn up(&self) -> &UpLink<T> {
        &self.up
    }
}

impl<T: Clone + 'static> Destroy for TwoWayLink<T> {
    fn destroy(&self) {
        self.down.destroy();
        self.up.destroy();
        if let Some(id) = self.republish.take() {
            self.up.remove_listener(id);
        }
    }
}
