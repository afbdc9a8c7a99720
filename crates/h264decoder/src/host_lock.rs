//! Cooperation with a caller-side global lock (think of an interpreter lock
//! held by a scripting host).
//!
//! The decoder's heavy work runs with the [HostLock] released so other host
//! threads can make progress. [ReverseLockGuard] is the scoped form of that:
//! it releases the lock when created and takes it back when dropped, on every
//! exit path.

use std::sync::{Condvar, Mutex};

/// A lock owned by the caller's runtime that the decoder gives up while it
/// works. The caller holds it when calling into the decoder.
pub trait HostLock: Send + Sync {
    /// Give the lock up.
    fn release(&self);
    /// Take the lock back, blocking until it's available.
    fn acquire(&self);
}

/// A [HostLock] for callers that don't have one. Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHostLock;

impl HostLock for NoHostLock {
    fn release(&self) {}
    fn acquire(&self) {}
}

/// Keeps a [HostLock] released for as long as it lives (RAII style).
///
/// [Self::lock] and [Self::unlock] can be called any number of times in any
/// order. Redundant calls do nothing, so the lock is never released or taken
/// twice in a row.
pub struct ReverseLockGuard<'a> {
    lock: &'a dyn HostLock,
    released: bool,
}

impl<'a> ReverseLockGuard<'a> {
    /// Release `lock` until the guard is dropped.
    pub fn new(lock: &'a dyn HostLock) -> Self {
        lock.release();
        Self {
            lock,
            released: true,
        }
    }

    /// Take the lock back early (e.g. to touch host-owned memory).
    pub fn lock(&mut self) {
        if self.released {
            self.lock.acquire();
            self.released = false;
        }
    }

    /// Release the lock again after [Self::lock].
    pub fn unlock(&mut self) {
        if !self.released {
            self.lock.release();
            self.released = true;
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for ReverseLockGuard<'_> {
    fn drop(&mut self) {
        self.lock();
    }
}

/// A binary lock shared by threads that want to take turns, modelling a host
/// runtime's global lock. Use [Self::enter] to hold it and hand it (as a
/// [HostLock]) to the decoders those threads drive.
#[derive(Debug, Default)]
pub struct CoordinationLock {
    held: Mutex<bool>,
    available: Condvar,
}

impl CoordinationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is free, then hold it until the returned guard is
    /// dropped.
    pub fn enter(&self) -> CoordinationGuard<'_> {
        self.acquire();
        CoordinationGuard(self)
    }

    /// Whether some thread is currently holding the lock.
    pub fn is_held(&self) -> bool {
        *self.held.lock().expect(THREAD_PANIC_MSG)
    }
}

impl HostLock for CoordinationLock {
    fn release(&self) {
        *self.held.lock().expect(THREAD_PANIC_MSG) = false;
        self.available.notify_one();
    }

    fn acquire(&self) {
        let mut held = self.held.lock().expect(THREAD_PANIC_MSG);
        while *held {
            held = self.available.wait(held).expect(THREAD_PANIC_MSG);
        }
        *held = true;
    }
}

/// Holds a [CoordinationLock] until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct CoordinationGuard<'a>(&'a CoordinationLock);

impl Drop for CoordinationGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

const THREAD_PANIC_MSG: &str = "Another thread panicked while holding the coordination lock.";

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LockEvent {
        Released,
        Acquired,
    }

    /// A [HostLock] that records what was done to it.
    #[derive(Debug, Default)]
    pub struct RecordingLock(Mutex<Vec<LockEvent>>);

    impl RecordingLock {
        pub fn events(&self) -> Vec<LockEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl HostLock for RecordingLock {
        fn release(&self) {
            self.0.lock().unwrap().push(LockEvent::Released);
        }

        fn acquire(&self) {
            self.0.lock().unwrap().push(LockEvent::Acquired);
        }
    }

    #[test]
    fn redundant_toggles_do_nothing() {
        use LockEvent::*;

        let lock = RecordingLock::default();

        {
            let mut guard = ReverseLockGuard::new(&lock);
            guard.unlock();
            guard.lock();
            guard.lock();
            assert!(!guard.is_released());
            guard.unlock();
            guard.unlock();
        }

        assert_eq!(lock.events(), [Released, Acquired, Released, Acquired]);
    }

    #[test]
    fn dropping_a_locked_guard_does_nothing() {
        let lock = RecordingLock::default();

        let mut guard = ReverseLockGuard::new(&lock);
        guard.lock();
        drop(guard);

        assert_eq!(lock.events(), [LockEvent::Released, LockEvent::Acquired]);
    }

    #[test]
    fn early_returns_take_the_lock_back() {
        fn decode_step() -> Result<(), ()> {
            Err(())
        }

        fn fails(lock: &dyn HostLock) -> Result<(), ()> {
            let _guard = ReverseLockGuard::new(lock);
            decode_step()?;
            Ok(())
        }

        let lock = RecordingLock::default();
        assert!(fails(&lock).is_err());
        assert_eq!(lock.events(), [LockEvent::Released, LockEvent::Acquired]);
    }

    #[test]
    fn coordination_lock_lets_one_thread_in_at_a_time() {
        let lock = Arc::new(CoordinationLock::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let (lock, inside) = (lock.clone(), inside.clone());
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = lock.enter();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn a_reverse_guard_lets_others_in() {
        let lock = Arc::new(CoordinationLock::new());
        let _held = lock.enter();

        {
            let _released = ReverseLockGuard::new(&*lock);
            assert!(!lock.is_held());

            let other = lock.clone();
            thread::spawn(move || drop(other.enter())).join().unwrap();
        }

        assert!(lock.is_held());
    }
}
