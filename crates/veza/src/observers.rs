use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tracing::warn;
use veza_quality::{MetricsSnapshot, QualityScore};

type ObserverFn = dyn Fn(&QualityScore, &MetricsSnapshot) + Send + Sync;

struct RegistryInner {
    next_id: u64,
    // Registration order is notification order.
    entries: Vec<(u64, Arc<ObserverFn>)>,
}

/// Per-tick quality observers.
///
/// Callbacks are invoked synchronously in registration order, once per
/// completed tick. A panicking observer is caught and logged; it never takes
/// the loop down.
#[derive(Clone)]
pub(crate) struct ObserverRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn register(
        &self,
        observer: impl Fn(&QualityScore, &MetricsSnapshot) + Send + Sync + 'static,
    ) -> ObserverHandle {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Arc::new(observer)));
        ObserverHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn notify(&self, score: &QualityScore, snapshot: &MetricsSnapshot) {
        // Snapshot the list so observers can (un)subscribe from inside the
        // callback without deadlocking.
        let observers: Vec<Arc<ObserverFn>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(score, snapshot))).is_err() {
                warn!("quality observer panicked");
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Unsubscribe handle returned by observer registration.
///
/// Dropping the handle keeps the observer alive; call
/// [`unsubscribe`](ObserverHandle::unsubscribe) to remove it.
pub struct ObserverHandle {
    id: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl ObserverHandle {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}
