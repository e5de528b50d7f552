use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Fixed-capacity, insertion-ordered history. When full, appending evicts the
/// single oldest entry. Cloning the handle shares the underlying buffer, so
/// one poller can write while any number of snapshot readers observe it.
///
/// Readers only ever see a fully copied sequence: `snapshot` clones the
/// buffer under the lock, so a concurrent append can never expose a
/// half-constructed record or a stale index.
#[derive(Clone)]
pub struct BoundedHistory<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends an item, evicting the oldest entry if the history is at
    /// capacity. Never fails.
    pub fn append(&self, item: T) {
        let mut buf = self.inner.lock().unwrap();
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(item);
    }

    /// Returns an isolated copy of the stored sequence, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        let buf = self.inner.lock().unwrap();
        buf.iter().cloned().collect()
    }

    /// The most recently appended item, if any.
    pub fn last(&self) -> Option<T> {
        let buf = self.inner.lock().unwrap();
        buf.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_last() {
        let history = BoundedHistory::new(3);
        assert!(history.last().is_none());
        assert!(history.is_empty());

        history.append(1);
        history.append(2);
        assert_eq!(history.last(), Some(2));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_bounded_retention() {
        let history = BoundedHistory::new(4);
        for i in 0..10 {
            history.append(i);
        }
        assert_eq!(history.len(), 4);
        // The stored sequence equals the last `capacity` appends in order.
        assert_eq!(history.snapshot(), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let history = BoundedHistory::new(2);
        history.append("a");
        history.append("b");
        history.append("c");
        assert_eq!(history.snapshot(), vec!["b", "c"]);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let history = BoundedHistory::new(3);
        history.append(1);
        let snap = history.snapshot();
        history.append(2);
        assert_eq!(snap, vec![1]);
        assert_eq!(history.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_append_and_snapshot() {
        let history = BoundedHistory::new(100);
        let writer_handle = history.clone();

        let writer = std::thread::spawn(move || {
            for i in 0..1000u64 {
                writer_handle.append(i);
            }
        });

        // Readers never observe a partially applied append: every snapshot is
        // a contiguous run of the written sequence.
        for _ in 0..200 {
            let snap = history.snapshot();
            assert!(snap.len() <= 100);
            for pair in snap.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
        }

        writer.join().unwrap();
        assert_eq!(history.len(), 100);
        assert_eq!(history.last(), Some(999));
    }
}
