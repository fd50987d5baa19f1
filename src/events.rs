//! Event Channel - Typed, named publish/subscribe.
//!
//! Every reactive primitive in the crate owns an [`EventChannel`] instead of
//! inheriting event-target behavior. Delivery is synchronous and in
//! registration order.
//!
//! # Example
//!
//! ```ignore
//! use spark_elements::events::{EventChannel, ListenerOptions};
//!
//! let channel: EventChannel<i32> = EventChannel::new();
//! let id = channel.on("changed", |value| println!("got {value}"));
//! channel.add_listener("changed", |_| println!("first only"), ListenerOptions::ONCE);
//!
//! channel.dispatch("changed", &1); // both listeners
//! channel.dispatch("changed", &2); // only the first
//! channel.remove_listener("changed", id);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

// =============================================================================
// Event Names
// =============================================================================

/// Emitted by observables on every write.
pub const CHANGED: &str = "changed";
/// Emitted once by renderers after their first render pass.
pub const RENDERED: &str = "rendered";
/// Emitted once by lazy references when they resolve.
pub const READY: &str = "ready";
/// Emitted by up-links after pushing a value into their property.
pub const TRIGGERED: &str = "triggered";
/// Emitted by two-way links when their up-link fires.
pub const UP_LINK_TRIGGERED: &str = "up-link-triggered";

// =============================================================================
// Types
// =============================================================================

bitflags! {
    /// Options for [`EventChannel::add_listener`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ListenerOptions: u8 {
        /// Remove the listener before its first invocation.
        const ONCE = 0b0000_0001;
    }
}

/// Handle returned by [`EventChannel::add_listener`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<D> = Rc<dyn Fn(&D)>;

struct Entry<D> {
    id: ListenerId,
    name: String,
    options: ListenerOptions,
    callback: Listener<D>,
}

// =============================================================================
// EventChannel
// =============================================================================

/// A set of named listeners receiving a detail of type `D`.
pub struct EventChannel<D> {
    entries: RefCell<Vec<Entry<D>>>,
    next_id: Cell<u64>,
}

impl<D> Default for EventChannel<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for EventChannel<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        f.debug_struct("EventChannel")
            .field("listeners", &entries.len())
            .finish()
    }
}

impl<D> EventChannel<D> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Register `callback` for events called `name`.
    pub fn add_listener(
        &self,
        name: &str,
        callback: impl Fn(&D) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            name: name.to_string(),
            options,
            callback: Rc::new(callback),
        });
        id
    }

    /// Register a persistent listener.
    pub fn on(&self, name: &str, callback: impl Fn(&D) + 'static) -> ListenerId {
        self.add_listener(name, callback, ListenerOptions::empty())
    }

    /// Register a listener that runs at most once.
    pub fn once(&self, name: &str, callback: impl Fn(&D) + 'static) -> ListenerId {
        self.add_listener(name, callback, ListenerOptions::ONCE)
    }

    /// Remove a listener. Returns false if it was not registered under `name`.
    pub fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        // Dropped after the borrow ends: the callback may own the last
        // handle to whatever registered it.
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|e| e.id == id && e.name == name)
                .map(|index| entries.remove(index))
        };
        removed.is_some()
    }

    /// Deliver `detail` to every listener of `name`, returning how many ran.
    ///
    /// The listener set is snapshotted first: listeners added during delivery
    /// wait for the next dispatch, listeners removed during delivery are
    /// skipped. No borrow is held while a callback runs, so callbacks may
    /// freely add, remove or dispatch on the same channel.
    pub fn dispatch(&self, name: &str, detail: &D) -> usize {
        let snapshot: Vec<(ListenerId, ListenerOptions, Listener<D>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.name == name)
            .map(|e| (e.id, e.options, e.callback.clone()))
            .collect();

        let mut delivered = 0;
        for (id, options, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            if options.contains(ListenerOptions::ONCE) {
                self.entries.borrow_mut().retain(|e| e.id != id);
            }
            callback(detail);
            delivered += 1;
        }
        delivered
    }

    /// Number of listeners currently registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.name == name)
            .count()
    }

    /// Drop every listener.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.entries.borrow_mut());
        drop(removed);
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }
}

// =============================================================================
// Tests
// =============================================================================
