//! Observable value cell.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::events::{CHANGED, EventChannel, ListenerId};

use super::Observable;

struct PropertyInner<T> {
    value: RefCell<T>,
    channel: EventChannel<T>,
}

/// A shared, observable value.
///
/// Cloning a `Property` creates a new handle to the **same** cell.
///
/// ```ignore
/// let query = Property::new(String::new());
/// query.on_changed(|value| println!("query is now {value}"));
/// query.set("flat".to_string()); // prints
/// query.set("flat".to_string()); // prints again, no equality check
/// ```
pub struct Property<T> {
    inner: Rc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.inner.value.borrow())
            .field("listeners", &self.inner.channel.listener_count(CHANGED))
            .finish()
    }
}

impl<T: Default + Clone + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                value: RefCell::new(value),
                channel: EventChannel::new(),
            }),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls `set` on the same property.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify every current listener.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value.clone();
        self.inner.channel.dispatch(CHANGED, &value);
    }

    /// Mutate the value in place, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let value = {
            let mut slot = self.inner.value.borrow_mut();
            f(&mut slot);
            slot.clone()
        };
        self.inner.channel.dispatch(CHANGED, &value);
    }

    pub fn on_changed(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.inner.channel.on(CHANGED, callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.channel.remove_listener(CHANGED, id)
    }

    /// Number of live `changed` listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.channel.listener_count(CHANGED)
    }

    /// Underlying channel, for listeners that need [`ListenerOptions`](crate::events::ListenerOptions).
    pub fn channel(&self) -> &EventChannel<T> {
        &self.inner.channel
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Observable for Property<T> {
    type Value = T;

    fn get(&self) -> T {
        Property::get(self)
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> ListenerId {
        self.on_changed(callback)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.remove_listener(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_get_set() {
        let prop = Property::new(1);
        assert_eq!(prop.get(), 1);
        prop.set(2);
        assert_eq!(prop.get(), 2);
    }

    #[test]
    fn test_every_set_notifies() {
        let prop = Property::new("a".to_string());
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        prop.on_changed(move |_| count_clone.set(count_clone.get() + 1));

        prop.set("a".to_string());
        prop.set("a".to_string());
        prop.set("b".to_string());
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_listener_sees_new_value() {
        let prop = Property::new(0);
        let seen = Rc::new(Cell::new(-1));
        let seen_clone = seen.clone();
        let prop_clone = prop.clone();
        prop.on_changed(move |v| {
            assert_eq!(prop_clone.get(), *v);
            seen_clone.set(*v);
        });

        prop.set(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_update_in_place() {
        let prop = Property::new(vec![1, 2]);
        let last = Rc::new(RefCell::new(Vec::new()));
        let last_clone = last.clone();
        prop.on_changed(move |v| *last_clone.borrow_mut() = v.clone());

        prop.update(|v| v.push(3));
        assert_eq!(prop.get(), vec![1, 2, 3]);
        assert_eq!(*last.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_listener() {
        let prop = Property::new(0);
        let id = prop.on_changed(|_| panic!("removed listener ran"));
        assert_eq!(prop.listener_count(), 1);
        assert!(prop.remove_listener(id));
        assert_eq!(prop.listener_count(), 0);
        prop.set(1);
    }

    #[test]
    fn test_clones_share_state() {
        let a = Property::new(1);
        let b = a.clone();
        b.set(5);
        assert_eq!(a.get(), 5);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Property::new(5)));
    }
}
