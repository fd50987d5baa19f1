//! Renderers bind a reference and one or more observables to a DOM
//! mutation strategy.
//!
//! - [`ShadowDomRenderer`] - Populates a shadow root from loaders, once.
//! - [`TextContentRenderer`] - Mirrors a value into a node's text.
//! - [`CondRenderer`] - Swaps a node with a placeholder on truthiness.
//! - [`ListRenderer`] - Projects a list onto cloned template items by index.
//!
//! Every renderer owns a monotone `rendered` flag and fires `rendered` once.
//! Each exclusively owns the DOM region it manages.
//!
//! The pending ready callback and the installed subscription each hold a
//! strong handle, so a renderer keeps working after the `Rc` returned by
//! `new` is dropped. [`Destroy::destroy`] releases both.
//!
//! # Values
//!
//! Bound values are converted through `serde_json::Value`:
//!
//! | Value          | Text         | Truthy |
//! |----------------|--------------|--------|
//! | `null`         | `""`         | no     |
//! | `false`/`true` | JSON         | as is  |
//! | `0`            | `"0"`        | no     |
//! | `""`           | `""`         | no     |
//! | other strings  | verbatim     | yes    |
//! | arrays/objects | JSON         | yes    |

pub mod cond;
pub mod list;
pub mod shadow;
pub mod text;

pub use cond::CondRenderer;
pub use list::{ItemRenderer, ListRenderer, ListRendererOptions};
pub use shadow::ShadowDomRenderer;
pub use text::TextContentRenderer;

use std::cell::Cell;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::events::{EventChannel, RENDERED};
use crate::refs::{ReadyCallback, once_listener};

/// Teardown for renderers and per-item bindings.
pub trait Destroy {
    /// Unsubscribe from every observed value and drop the listeners that
    /// keep the binding alive. A binding destroyed before its reference is
    /// ready never installs.
    fn destroy(&self);
}

impl<D: Destroy + ?Sized> Destroy for std::rc::Rc<D> {
    fn destroy(&self) {
        (**self).destroy();
    }
}

impl<D: Destroy> Destroy for Vec<D> {
    fn destroy(&self) {
        for item in self {
            item.destroy();
        }
    }
}

/// Item bindings that need no teardown.
impl Destroy for () {
    fn destroy(&self) {}
}

// =============================================================================
// Render state
// =============================================================================

/// The `rendered` flag and its one-shot event.
#[derive(Debug, Default)]
pub(crate) struct RenderState {
    rendered: Cell<bool>,
    destroyed: Cell<bool>,
    channel: EventChannel<()>,
}

impl RenderState {
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.set(true);
    }

    pub(crate) fn is_rendered(&self) -> bool {
        self.rendered.get()
    }

    pub(crate) fn on_rendered(&self, callback: ReadyCallback) {
        if self.rendered.get() {
            callback();
        } else {
            self.channel.once(RENDERED, once_listener(callback));
        }
    }

    /// Flip to rendered and notify. Later calls do nothing.
    pub(crate) fn mark_rendered(&self) {
        if self.rendered.replace(true) {
            return;
        }
        self.channel.dispatch(RENDERED, &());
    }
}

// =============================================================================
// Value conversion
// =============================================================================

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Script truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form: strings verbatim, `null` empty, everything else as JSON.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy_value in [json!(true), json!(1), json!(-0.5), json!("0"), json!([]), json!({})] {
            assert!(truthy(&truthy_value), "{truthy_value} should be truthy");
        }
    }

    #[test]
    fn test_text_of() {
        assert_eq!(text_of(&json!(null)), "");
        assert_eq!(text_of(&json!("flat")), "flat");
        assert_eq!(text_of(&json!(3)), "3");
        assert_eq!(text_of(&json!(true)), "true");
        assert_eq!(text_of(&json!(["a"])), "[\"a\"]");
    }

    #[test]
    fn test_render_state_fires_once() {
        let state = RenderState::default();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        state.on_rendered(Box::new(move || count_clone.set(count_clone.get() + 1)));
        assert!(!state.is_rendered());

        state.mark_rendered();
        state.mark_rendered();
        assert!(state.is_rendered());
        assert_eq!(count.get(), 1);

        let count_clone = count.clone();
        state.on_rendered(Box::new(move || count_clone.set(count_clone.get() + 1)));
        assert_eq!(count.get(), 2);
    }
}
