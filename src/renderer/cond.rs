//! Conditional presence.
//!
//! The managed node and an empty text placeholder share one slot in the
//! node's original parent. Exactly one of them is attached at any time.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::dom::Node;
use crate::error::{PlatformError, Result};
use crate::events::ListenerId;
use crate::reactive::Observable;
use crate::refs::{ReadyCallback, Reference};

use super::{Destroy, RenderState, to_value, truthy};

struct Slot {
    parent: Node,
    el: Node,
    placeholder: Node,
}

pub struct CondRenderer<O: Observable> {
    reference: Rc<dyn Reference>,
    value: O,
    slot: RefCell<Option<Slot>>,
    attached: Cell<bool>,
    subscription: Cell<Option<ListenerId>>,
    state: RenderState,
}

impl<O: Observable> fmt::Debug for CondRenderer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CondRenderer")
            .field("attached", &self.attached.get())
            .field("rendered", &self.state.is_rendered())
            .finish()
    }
}

impl<O> CondRenderer<O>
where
    O: Observable + 'static,
    O::Value: Serialize,
{
    pub fn new(reference: Rc<dyn Reference>, value: O) -> Rc<Self> {
        let renderer = Rc::new(Self {
            reference: Rc::clone(&reference),
            value,
            slot: RefCell::new(None),
            attached: Cell::new(false),
            subscription: Cell::new(None),
            state: RenderState::default(),
        });
        let pending = Rc::clone(&renderer);
        reference.on_ready(Box::new(move || {
            if let Err(err) = pending.init() {
                tracing::error!(error = %err, "cond renderer skipped");
            }
        }));
        renderer
    }

    fn init(self: &Rc<Self>) -> Result<()> {
        if self.state.is_destroyed() {
            return Ok(());
        }
        let el = self.reference.el()?;
        // The parent is captured once; later moves of the node are not followed.
        let parent = el.parent().ok_or(PlatformError::HierarchyRequest(
            "conditional node has no parent",
        ))?;
        *self.slot.borrow_mut() = Some(Slot {
            parent,
            el,
            placeholder: Node::text(""),
        });
        self.attached.set(true);

        let renderer = Rc::clone(self);
        let id = self.value.subscribe(move |value| {
            if let Err(err) = renderer.apply(value) {
                tracing::error!(error = %err, "cond update failed");
            }
        });
        self.subscription.set(Some(id));
        self.apply(&self.value.get())?;
        self.state.mark_rendered();
        Ok(())
    }

    fn apply(&self, value: &O::Value) -> Result<()> {
        let should_attach = truthy(&to_value(value)?);
        let slot = self.slot.borrow();
        let Some(slot) = slot.as_ref() else {
            return Ok(());
        };
        if self.attached.get() && !should_attach {
            slot.parent.replace_child(&slot.placeholder, &slot.el)?;
            self.attached.set(false);
        } else if !self.attached.get() && should_attach {
            slot.parent.replace_child(&slot.el, &slot.placeholder)?;
            self.attached.set(true);
        }
        Ok(())
    }

    /// Whether the managed node currently occupies the slot.
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    pub fn on_rendered(&self, callback: ReadyCallback) {
        self.state.on_rendered(callback);
    }
}

impl<O: Observable> Destroy for CondRenderer<O> {
    fn destroy(&self) {
        self.state.mark_destroyed();
        if let Some(id) = self.subscription.take() {
            self.value.unsubscribe(id);
        }
    }
}
