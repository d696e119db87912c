//! Observable value cell with an explicit subscriber list.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ObservableInner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_id: AtomicU64,
}

/// A shared value that notifies subscribers after every update.
///
/// Subscribers run on the updating thread once the new value is stored and all
/// locks are released, so they may read the cell or subscribe again.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone + Send + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                value: Mutex::new(value),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    pub fn set(&self, value: T) {
        *lock(&self.inner.value) = value.clone();
        self.notify(&value);
    }

    /// Stores `value` only when `accept` approves the current one.
    ///
    /// The check and the store happen under the same lock. Returns whether the
    /// value was stored (and subscribers notified).
    pub fn set_if(&self, value: T, accept: impl FnOnce(&T) -> bool) -> bool {
        {
            let mut guard = lock(&self.inner.value);
            if !accept(&guard) {
                return false;
            }
            *guard = value.clone();
        }
        self.notify(&value);
        true
    }

    pub fn subscribe(&self, subscriber: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.subscribers).push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    fn notify(&self, value: &T) {
        let snapshot: Vec<Subscriber<T>> = lock(&self.inner.subscribers)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in snapshot {
            subscriber(value);
        }
    }
}
