use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Payload handed to subscribers when a bindable's value changes.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueChanged<T> {
    pub old: T,
    pub new: T,
}

type Callback<T> = Box<dyn FnMut(&ValueChanged<T>)>;

struct Inner<T> {
    value: T,
    next_id: u64,
    subscribers: Vec<(u64, Callback<T>)>,
    notify_depth: u32,
    detached: Vec<u64>,
}

/// Observable value cell.
///
/// Clones share the same cell, so binding two owners together is just a
/// `clone()`. Subscribers run synchronously inside `set`, in subscription
/// order. A subscriber may set other bindables; setting the same bindable
/// from its own callback is applied but does not re-notify the callback
/// that is currently running.
pub struct Bindable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Bindable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Bindable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                next_id: 0,
                subscribers: Vec::new(),
                notify_depth: 0,
                detached: Vec::new(),
            })),
        }
    }

    #[inline(always)]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Stores `value` and notifies subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            std::mem::replace(&mut inner.value, value.clone())
        };
        self.notify(&ValueChanged { old, new: value });
    }

    /// Registers `callback`; it stays registered until the returned
    /// subscription is dropped or passed to [`Bindable::unsubscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&ValueChanged<T>) + 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Box::new(callback)));
            id
        };
        let weak: Weak<RefCell<Inner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            id,
            detach: Some(Box::new(move |id| {
                if let Some(inner) = weak.upgrade()
                    && let Ok(mut inner) = inner.try_borrow_mut()
                {
                    inner.subscribers.retain(|(sid, _)| *sid != id);
                    if inner.notify_depth > 0 {
                        inner.detached.push(id);
                    }
                }
            })),
        }
    }

    pub fn unsubscribe(&self, mut subscription: Subscription) {
        subscription.detach();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn notify(&self, change: &ValueChanged<T>) {
        // Callbacks are moved out while they run so they are free to read or
        // write this bindable without a RefCell double borrow.
        let mut running = {
            let mut inner = self.inner.borrow_mut();
            inner.notify_depth += 1;
            std::mem::take(&mut inner.subscribers)
        };
        for (_, callback) in &mut running {
            callback(change);
        }
        let mut inner = self.inner.borrow_mut();
        inner.notify_depth -= 1;
        let added = std::mem::take(&mut inner.subscribers);
        running.extend(added);
        if !inner.detached.is_empty() {
            let detached = std::mem::take(&mut inner.detached);
            running.retain(|(id, _)| !detached.contains(id));
            if inner.notify_depth > 0 {
                inner.detached = detached;
            }
        }
        inner.subscribers = running;
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Bindable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Bindable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f.debug_tuple("Bindable").field(&inner.value).finish(),
            Err(_) => f.write_str("Bindable(<borrowed>)"),
        }
    }
}

/// Handle returned by [`Bindable::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    detach: Option<Box<dyn FnOnce(u64)>>,
}

impl Subscription {
    fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
