use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Whether a listener runs before or after events are committed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    PreCommit,
    PostCommit,
}

/// Identifies a registered listener or observer, for unregistering it
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(u64);

impl ListenerKey {
    fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Registration-ordered list iterated on a snapshot, so entries can be
/// added or removed from inside a callback.
pub(crate) struct ListenerList<T: ?Sized> {
    entries: Mutex<Vec<(ListenerKey, Arc<T>)>>,
}

impl<T: ?Sized> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> ListenerList<T> {
    pub fn add(&self, listener: Arc<T>) -> ListenerKey {
        let key = ListenerKey::next();
        self.entries.lock().push((key, listener));
        key
    }

    pub fn remove(&self, key: ListenerKey) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_key, _)| *entry_key != key);
        entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
