use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::core::logging::ComponentLogger;

/// Bounded producer/consumer queue shared by every stage boundary in the
/// pipeline (spec.md §5, §6): `put` appends and wakes the worker without
/// blocking the caller beyond a brief mutex; the worker suspends on the
/// condition variable until enough items have accumulated. When the
/// high-water mark is exceeded the *oldest* entries are dropped, per the
/// back-pressure policy in spec.md §5.
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    cv: Condvar,
    high_water: usize,
    dropped: AtomicU64,
    interrupted: AtomicBool,
    name: String,
}

impl<T> WorkQueue<T> {
    pub fn new(name: impl Into<String>, high_water: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            high_water,
            dropped: AtomicU64::new(0),
            interrupted: AtomicBool::new(false),
            name: name.into(),
        }
    }

    /// Append one item and wake any waiter. Drops the oldest entries if
    /// the high-water mark is exceeded; never blocks beyond the mutex.
    pub fn push(&self, item: T) {
        {
            let mut items = self.items.lock().unwrap();
            items.push_back(item);
            while items.len() > self.high_water {
                items.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    self.warn(&format!(
                        "queue '{}' over high-water mark ({}), dropped {} total",
                        self.name, self.high_water, dropped
                    ));
                }
            }
        }
        self.cv.notify_one();
    }

    pub fn push_all(&self, iter: impl IntoIterator<Item = T>) {
        for item in iter {
            self.push(item);
        }
    }

    /// Block until at least `min_len` items are queued or interruption is
    /// requested. Returns `false` on interruption (the worker must check
    /// this both after every wake and before any extended computation).
    pub fn wait_until(&self, min_len: usize) -> bool {
        let mut items = self.items.lock().unwrap();
        loop {
            if self.interrupted.load(Ordering::Acquire) {
                return false;
            }
            if items.len() >= min_len {
                return true;
            }
            let (guard, timeout) = self
                .cv
                .wait_timeout(items, Duration::from_millis(200))
                .unwrap();
            items = guard;
            let _ = timeout;
        }
    }

    /// Remove and return exactly `n` items from the front. Panics if
    /// fewer than `n` are present; callers must check length first.
    pub fn drain_front(&self, n: usize) -> Vec<T> {
        let mut items = self.items.lock().unwrap();
        assert!(items.len() >= n, "drain_front: queue shorter than requested");
        items.drain(..n).collect()
    }

    /// Remove and return every currently queued item.
    pub fn drain_all(&self) -> Vec<T> {
        let mut items = self.items.lock().unwrap();
        items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Cooperative cancellation: set the interrupt flag and wake every
    /// waiter so it observes it at the next wake-up (spec.md §5).
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
        self.cv.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    pub fn reset_interrupt(&self) {
        self.interrupted.store(false, Ordering::Release);
    }
}

impl<T> ComponentLogger for WorkQueue<T> {
    fn log_context(&self) -> crate::core::logging::LogContext {
        crate::core::logging::LogContext::new("WorkQueue", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_wakes_waiting_consumer() {
        let q = Arc::new(WorkQueue::<i32>::new("test", 100));
        let q2 = q.clone();
        let handle = thread::spawn(move || {
            assert!(q2.wait_until(3));
            q2.drain_front(3)
        });
        for i in 0..3 {
            q.push(i);
        }
        let drained = handle.join().unwrap();
        assert_eq!(drained, vec![0, 1, 2]);
    }

    #[test]
    fn high_water_mark_drops_oldest() {
        let q = WorkQueue::<i32>::new("test", 4);
        for i in 0..10 {
            q.push(i);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.drain_all(), vec![6, 7, 8, 9]);
        assert_eq!(q.dropped(), 6);
    }

    #[test]
    fn interrupt_unblocks_waiter() {
        let q = Arc::new(WorkQueue::<i32>::new("test", 100));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.wait_until(1));
        thread::sleep(std::time::Duration::from_millis(20));
        q.interrupt();
        assert!(!handle.join().unwrap());
    }
}
