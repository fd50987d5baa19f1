//! Eager computed cells derived from [`Observable`] sources.
//!
//! # Design
//!
//! [`ComputedProperty<T>`] subscribes to each source at construction. Every
//! upstream `changed` triggers a synchronous recomputation followed by its own
//! `changed`. Two upstream writes produce two recomputations and two
//! notifications; nothing is coalesced.
//!
//! Source listeners hold only a `Weak` handle to the computed cell, so
//! dropping the last `ComputedProperty` handle unsubscribes from every source.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::events::{CHANGED, EventChannel, ListenerId};

use super::Observable;

struct ComputedInner<T> {
    value: RefCell<T>,
    compute: Box<dyn Fn() -> T>,
    channel: EventChannel<T>,
    /// Unsubscribe hooks, one per source.
    detach: RefCell<Vec<Box<dyn Fn()>>>,
}

impl<T: Clone> ComputedInner<T> {
    fn recompute(&self) {
        let next = (self.compute)();
        *self.value.borrow_mut() = next.clone();
        self.channel.dispatch(CHANGED, &next);
    }

    fn detach_all(&self) {
        for hook in self.detach.borrow_mut().drain(..) {
            hook();
        }
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        for hook in self.detach.get_mut().drain(..) {
            hook();
        }
    }
}

/// A read-only cell whose value is `f` applied to its sources.
///
/// Cloning creates a new handle to the **same** cell.
pub struct ComputedProperty<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for ComputedProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ComputedProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("value", &*self.inner.value.borrow())
            .field("sources", &self.inner.detach.borrow().len())
            .finish()
    }
}

fn watch<O, T>(source: &O, weak: Weak<ComputedInner<T>>) -> Box<dyn Fn()>
where
    O: Observable + Clone + 'static,
    T: Clone + 'static,
{
    let id = source.subscribe(move |_| {
        if let Some(inner) = weak.upgrade() {
            inner.recompute();
        }
    });
    let source = source.clone();
    Box::new(move || {
        source.unsubscribe(id);
    })
}

impl<T: Clone + 'static> ComputedProperty<T> {
    fn build(
        compute: Box<dyn Fn() -> T>,
        subscribe: impl FnOnce(Weak<ComputedInner<T>>) -> Vec<Box<dyn Fn()>>,
    ) -> Self {
        let initial = compute();
        let inner = Rc::new(ComputedInner {
            value: RefCell::new(initial),
            compute,
            channel: EventChannel::new(),
            detach: RefCell::new(Vec::new()),
        });
        let hooks = subscribe(Rc::downgrade(&inner));
        *inner.detach.borrow_mut() = hooks;
        Self { inner }
    }

    /// Derive from a single source.
    pub fn from_observable<A>(a: &A, map: impl Fn(&A::Value) -> T + 'static) -> Self
    where
        A: Observable + Clone + 'static,
    {
        let a_clone = a.clone();
        let compute = Box::new(move || map(&a_clone.get()));
        Self::build(compute, |weak| vec![watch(a, weak)])
    }

    /// Derive from two sources.
    pub fn from2<A, B>(a: &A, b: &B, map: impl Fn(&A::Value, &B::Value) -> T + 'static) -> Self
    where
        A: Observable + Clone + 'static,
        B: Observable + Clone + 'static,
    {
        let a_clone = a.clone();
        let b_clone = b.clone();
        let compute = Box::new(move || map(&a_clone.get(), &b_clone.get()));
        Self::build(compute, |weak| vec![watch(a, weak.clone()), watch(b, weak)])
    }

    /// Derive from three sources.
    pub fn from3<A, B, C>(
        a: &A,
        b: &B,
        c: &C,
        map: impl Fn(&A::Value, &B::Value, &C::Value) -> T + 'static,
    ) -> Self
    where
        A: Observable + Clone + 'static,
        B: Observable + Clone + 'static,
        C: Observable + Clone + 'static,
    {
        let a_clone = a.clone();
        let b_clone = b.clone();
        let c_clone = c.clone();
        let compute = Box::new(move || map(&a_clone.get(), &b_clone.get(), &c_clone.get()));
        Self::build(compute, |weak| {
            vec![
                watch(a, weak.clone()),
                watch(b, weak.clone()),
                watch(c, weak),
            ]
        })
    }

    /// Derive from any number of sources of the same type.
    ///
    /// `map` receives the source values in the order the sources were given.
    pub fn from_all<A>(sources: &[A], map: impl Fn(&[A::Value]) -> T + 'static) -> Self
    where
        A: Observable + Clone + 'static,
    {
        let owned: Vec<A> = sources.to_vec();
        let compute = Box::new(move || {
            let values: Vec<A::Value> = owned.iter().map(|s| s.get()).collect();
            map(&values)
        });
        Self::build(compute, |weak| {
            sources.iter().map(|s| watch(s, weak.clone())).collect()
        })
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn on_changed(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.inner.channel.on(CHANGED, callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.channel.remove_listener(CHANGED, id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.channel.listener_count(CHANGED)
    }

    /// Stop following the sources. The last value stays readable.
    pub fn detach(&self) {
        self.inner.detach_all();
    }
}

impl<T: Clone + 'static> Observable for ComputedProperty<T> {
    type Value = T;

    fn get(&self) -> T {
        ComputedProperty::get(self)
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.on_changed(callback)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.remove_listener(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
