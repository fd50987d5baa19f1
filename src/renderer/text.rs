//! Text mirroring.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::Result;
use crate::events::ListenerId;
use crate::reactive::Observable;
use crate::refs::{ReadyCallback, Reference};

use super::{Destroy, RenderState, text_of, to_value};

/// Keeps a node's text content equal to the text form of a value.
pub struct TextContentRenderer<O: Observable> {
    reference: Rc<dyn Reference>,
    value: O,
    subscription: Cell<Option<ListenerId>>,
    state: RenderState,
}

impl<O: Observable> fmt::Debug for TextContentRenderer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextContentRenderer")
            .field("rendered", &self.state.is_rendered())
            .field("subscribed", &self.subscription.get().is_some())
            .finish()
    }
}

impl<O> TextContentRenderer<O>
where
    O: Observable + 'static,
    O::Value: Serialize,
{
    pub fn new(reference: Rc<dyn Reference>, value: O) -> Rc<Self> {
        let renderer = Rc::new(Self {
            reference: Rc::clone(&reference),
            value,
            subscription: Cell::new(None),
            state: RenderState::default(),
        });
        let pending = Rc::clone(&renderer);
        reference.on_ready(Box::new(move || pending.init()));
        renderer
    }

    fn init(self: &Rc<Self>) {
        if self.state.is_destroyed() {
            return;
        }
        if let Err(err) = self.apply(&self.value.get()) {
            tracing::error!(error = %err, "text renderer skipped");
            return;
        }
        let renderer = Rc::clone(self);
        let id = self.value.subscribe(move |value| {
            if let Err(err) = renderer.apply(value) {
                tracing::error!(error = %err, "text update failed");
            }
        });
        self.subscription.set(Some(id));
        self.state.mark_rendered();
    }

    fn apply(&self, value: &O::Value) -> Result<()> {
        let text = text_of(&to_value(value)?);
        self.reference.el()?.set_text_content(&text)
    }

    pub fn is_rendered(&self) -> bool {
        self.state.is_rendered()
    }

    pub fn on_rendered(&self, callback: ReadyCallback) {
        self.state.on_rendered(callback);
    }
}

impl<O: Observable> Destroy for TextContentRenderer<O> {
    fn destroy(&self) {
        self.state.mark_destroyed();
        if let Some(id) = self.subscription.take() {
            self.value.unsubscribe(id);
        }
    }
}
