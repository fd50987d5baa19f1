//! Reactive cells.
//!
//! - [`Property`] - A mutable cell that notifies on every write.
//! - [`ComputedProperty`] - A read-only cell derived from other cells.
//!
//! Both implement [`Observable`], the read side consumed by renderers and
//! links.
//!
//! # Invariants
//!
//! 1. Every `set` produces exactly one `changed` notification, even when the
//!    new value equals the old one. There is no equality check and no
//!    batching.
//! 2. Listeners run synchronously, in registration order, before `set`
//!    returns.
//! 3. A computed cell recomputes eagerly on every upstream notification and
//!    republishes once per notification. Its value is never stale after a
//!    dependency notification has been delivered.

pub mod computed;
pub mod property;

pub use computed::ComputedProperty;
pub use property::Property;

use crate::events::ListenerId;

/// Read side of a reactive cell.
pub trait Observable {
    type Value: Clone + 'static;

    /// Current value.
    fn get(&self) -> Self::Value;

    /// Listen for `changed` notifications. The callback receives the new value.
    fn subscribe(&self, callback: impl Fn(&Self::Value) + 'static) -> ListenerId;

    /// Stop a subscription made with [`Observable::subscribe`].
    fn unsubscribe(&self, id: ListenerId) -> bool;
}
