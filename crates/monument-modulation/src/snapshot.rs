//! Lock-free snapshot publication between the control and audio contexts.
//!
//! The control context publishes immutable values through an `ArcSwap`. The
//! audio context keeps the last `Arc` it saw and swaps it when the pointer
//! changes. Every published `Arc` is also parked in a control-side
//! graveyard, so the audio context never drops the last reference and never
//! frees memory. Each publication sweeps snapshots nobody else holds, so the
//! graveyard stays bounded by the number of snapshots readers still hold.
//! [`Publisher::collect_garbage`] runs the same sweep on demand.
//!
//! - **Reads**: `ArcSwap::load_full()` — wait-free, one refcount bump.
//! - **Graveyard**: `Mutex` — control context only.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

struct Shared<T> {
    current: ArcSwap<T>,
    graveyard: Mutex<Vec<Arc<T>>>,
}

/// Control-context side. Cheap to clone; clones publish to the same slot.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Publisher<T> {
    /// Publisher holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::from_arc(Arc::new(initial))
    }

    /// Publisher holding an existing `Arc`.
    pub fn from_arc(initial: Arc<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                current: ArcSwap::new(Arc::clone(&initial)),
                graveyard: Mutex::new(vec![initial]),
            }),
        }
    }

    /// Replace the current snapshot. Readers pick it up at their next
    /// [`Reader::refresh`].
    pub fn publish(&self, value: T) -> Arc<T> {
        self.publish_arc(Arc::new(value))
    }

    /// Replace the current snapshot with an existing `Arc`.
    pub fn publish_arc(&self, value: Arc<T>) -> Arc<T> {
        let mut graveyard = self.shared.graveyard.lock();
        graveyard.retain(|snapshot| Arc::strong_count(snapshot) > 1);
        graveyard.push(Arc::clone(&value));
        self.shared.current.store(Arc::clone(&value));
        value
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<T> {
        self.shared.current.load_full()
    }

    /// A reader for the audio context, starting at the current snapshot.
    pub fn reader(&self) -> Reader<T> {
        Reader { shared: Arc::clone(&self.shared), cached: self.current() }
    }

    /// Drop published snapshots that only the graveyard still holds.
    /// Returns how many were freed.
    pub fn collect_garbage(&self) -> usize {
        let mut graveyard = self.shared.graveyard.lock();
        let before = graveyard.len();
        graveyard.retain(|snapshot| Arc::strong_count(snapshot) > 1);
        before - graveyard.len()
    }

    /// Snapshots awaiting reclamation, including live ones.
    pub fn pending(&self) -> usize {
        self.shared.graveyard.lock().len()
    }
}

/// Audio-context side.
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
    cached: Arc<T>,
}

impl<T> Reader<T> {
    /// Pick up the latest snapshot. Returns `true` if it changed.
    #[inline]
    pub fn refresh(&mut self) -> bool {
        let latest = self.shared.current.load_full();
        if Arc::ptr_eq(&latest, &self.cached) {
            false
        } else {
            self.cached = latest;
            true
        }
    }

    /// The snapshot seen at the last refresh.
    #[inline]
    pub fn get(&self) -> &T {
        &self.cached
    }

    /// Shared handle to the snapshot seen at the last refresh.
    #[inline]
    pub fn get_arc(&self) -> &Arc<T> {
        &self.cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_publication_once() {
        let publisher = Publisher::new(1u32);
        let mut reader = publisher.reader();
        assert_eq!(*reader.get(), 1);
        assert!(!reader.refresh());

        publisher.publish(2);
        assert!(reader.refresh());
        assert_eq!(*reader.get(), 2);
        assert!(!reader.refresh());
    }

    #[test]
    fn garbage_is_kept_until_readers_move_on() {
        let publisher = Publisher::new(vec![0.0f32; 4]);
        let mut reader = publisher.reader();
        publisher.publish(vec![1.0; 4]);

        // The reader still holds the first snapshot.
        assert_eq!(publisher.collect_garbage(), 0);
        assert_eq!(publisher.pending(), 2);

        reader.refresh();
        assert_eq!(publisher.collect_garbage(), 1);
        assert_eq!(publisher.pending(), 1);
        assert_eq!(reader.get()[0], 1.0);
    }

    #[test]
    fn publishing_sweeps_released_snapshots() {
        let publisher = Publisher::new(0u64);
        let mut reader = publisher.reader();
        for i in 1..1000u64 {
            publisher.publish(i);
            reader.refresh();
            assert!(publisher.pending() <= 3, "{} pending after {i}", publisher.pending());
        }
        assert_eq!(*reader.get(), 999);
    }

    #[test]
    fn sweep_keeps_snapshots_a_reader_still_holds() {
        let publisher = Publisher::new(0u32);
        let reader = publisher.reader();
        for i in 1..50 {
            publisher.publish(i);
        }
        assert_eq!(*reader.get(), 0);
        assert!(publisher.pending() <= 3);
    }

    #[test]
    fn clones_share_the_slot() {
        let a = Publisher::new("a");
        let b = a.clone();
        b.publish("b");
        assert_eq!(*a.current(), "b");
    }
}
