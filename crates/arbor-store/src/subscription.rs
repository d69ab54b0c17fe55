//! # Subscription Plumbing
//!
//! Ordered subscriber lists with drop-based cleanup. A guard returned from
//! `subscribe`/`subscribe_action`/`watch` removes its entry when dropped;
//! long-lived consumers (plugins) call [`SubscriptionGuard::forget`] to pin
//! the subscription for the life of the store.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Read-lock with poison recovery. A poisoned lock means a subscriber
/// panicked mid-notification; the list itself is still structurally sound.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write-lock with poison recovery.
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Mutex lock with poison recovery.
pub(crate) fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned from subscription APIs.
///
/// Dropping the guard unsubscribes. Guards are inert after [`forget`]
/// (the subscription then lives as long as the store).
///
/// [`forget`]: SubscriptionGuard::forget
pub struct SubscriptionGuard {
    remover: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    pub(crate) fn new(remover: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remover: Some(Box::new(remover)),
        }
    }

    /// Keep the subscription alive without holding the guard.
    pub fn forget(mut self) {
        self.remover = None;
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(remover) = self.remover.take() {
            remover();
        }
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("active", &self.remover.is_some())
            .finish()
    }
}

/// An ordered list of subscribers with stable iteration order.
pub(crate) struct SubscriberList<T> {
    entries: Arc<RwLock<Vec<(u64, Arc<T>)>>>,
    next_id: AtomicU64,
}

impl<T: Send + Sync + 'static> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append a subscriber; the returned guard removes it on drop.
    pub(crate) fn add(&self, value: T) -> SubscriptionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        write_lock(&self.entries).push((id, Arc::new(value)));

        let weak = Arc::downgrade(&self.entries);
        SubscriptionGuard::new(move || {
            if let Some(entries) = weak.upgrade() {
                write_lock(&entries).retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Snapshot the current subscribers in registration order.
    ///
    /// Notification happens against the snapshot so a subscriber may
    /// subscribe/unsubscribe from inside its own callback.
    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        read_lock(&self.entries)
            .iter()
            .map(|(_, value)| Arc::clone(value))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        read_lock(&self.entries).len()
    }
}
