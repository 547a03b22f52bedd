use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Single-slot cell holding the most recently published value.
///
/// One writer replaces the value wholesale; readers clone the `Arc` at
/// their own pace. The version counter lets a reader skip work when
/// nothing changed since its last look.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<Arc<T>>>,
    version: AtomicU64,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Replace the held value. The previous value is dropped once no reader holds it.
    pub fn publish(&self, value: T) {
        self.publish_arc(Arc::new(value));
    }

    /// Like [`publish`](Self::publish) for values that are already shared.
    pub fn publish_arc(&self, value: Arc<T>) {
        let mut guard = self.value.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(value);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.value
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of publishes so far; 0 means nothing was ever published.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Returns the value only if it was published after `seen`.
    pub fn latest_since(&self, seen: u64) -> Option<(u64, Arc<T>)> {
        let guard = self.value.lock().unwrap_or_else(|e| e.into_inner());
        let version = self.version.load(Ordering::Acquire);
        if version == seen {
            return None;
        }
        guard.clone().map(|v| (version, v))
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.version(), 0);
        assert!(slot.latest_since(0).is_none());
    }

    #[test]
    fn test_publish_replaces_previous_value() {
        let slot = LatestSlot::new();
        slot.publish(vec![1, 2]);
        slot.publish(vec![3]);
        assert_eq!(*slot.latest().unwrap(), vec![3]);
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn test_latest_since_skips_unchanged() {
        let slot = LatestSlot::new();
        slot.publish(10);
        let (seen, value) = slot.latest_since(0).unwrap();
        assert_eq!(*value, 10);
        assert!(slot.latest_since(seen).is_none());
        slot.publish(11);
        let (_, value) = slot.latest_since(seen).unwrap();
        assert_eq!(*value, 11);
    }

    #[test]
    fn test_reader_keeps_old_value_alive_after_replace() {
        let slot = LatestSlot::new();
        slot.publish(String::from("old"));
        let held = slot.latest().unwrap();
        slot.publish(String::from("new"));
        assert_eq!(held.as_str(), "old");
        assert_eq!(slot.latest().unwrap().as_str(), "new");
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn test_publish_from_another_thread() {
        let slot = Arc::new(LatestSlot::new());
        let writer = slot.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                writer.publish(i);
            }
        })
        .join()
        .unwrap();
        assert_eq!(*slot.latest().unwrap(), 99);
        assert_eq!(slot.version(), 100);
    }
}
