//! This module contains the [DropJoinHandle] type, a thin wrapper type around
//! [JoinHandle] that joins the thread when the handle is dropped (RAII style).

use std::io;
use std::ops::Deref;
use std::thread::{self, JoinHandle};

/// A thin wrapper around [JoinHandle] that joins the thread when the handle is
/// dropped (RAII style).
///
/// Any error in joining the thread on drop will be ignored. Use [Self::join]
/// to observe the thread's result (or its panic).
#[derive(Debug)]
pub struct DropJoinHandle<T>(Option<JoinHandle<T>>);

impl<T> DropJoinHandle<T> {
    /// Create from an existing join handle.
    pub fn new(handle: JoinHandle<T>) -> Self {
        Self(Some(handle))
    }

    /// Join the thread now, returning whatever it returned.
    pub fn join(mut self) -> thread::Result<T> {
        self.0.take().expect(EXPECT_MSG).join()
    }
}

impl<T> Deref for DropJoinHandle<T> {
    type Target = JoinHandle<T>;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref().expect(EXPECT_MSG)
    }
}

impl<T> From<JoinHandle<T>> for DropJoinHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self::new(handle)
    }
}

impl<T> Drop for DropJoinHandle<T> {
    fn drop(&mut self) {
        // `join` takes the handle, so there's nothing left to do.
        if let Some(handle) = self.0.take() {
            _ = handle.join();
        }
    }
}

/// The same as [thread::spawn], but a [DropJoinHandle] is returned instead.
pub fn spawn<F, T>(f: F) -> DropJoinHandle<T>
where
    F: FnOnce() -> T,
    F: Send + 'static,
    T: Send + 'static,
{
    DropJoinHandle::new(thread::spawn(f))
}

/// Like [spawn], but the thread gets a name (shown in panics and debuggers)
/// and failing to create the thread is reported instead of panicking.
pub fn spawn_named<F, T>(name: impl Into<String>, f: F) -> io::Result<DropJoinHandle<T>>
where
    F: FnOnce() -> T,
    F: Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map(DropJoinHandle::new)
}

const EXPECT_MSG: &str = "The handle should be present.";

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn dropping_joins_the_thread() {
        let finished = Arc::new(AtomicBool::new(false));

        let handle = {
            let finished = finished.clone();
            spawn(move || {
                thread::sleep(std::time::Duration::from_millis(100));
                finished.store(true, Ordering::SeqCst);
            })
        };
        drop(handle);

        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn named_threads_keep_their_name() {
        let handle = spawn_named("drop-join-test", || {
            thread::current().name().map(str::to_owned)
        })
        .unwrap();

        assert_eq!(handle.thread().name(), Some("drop-join-test"));
        assert_eq!(handle.join().unwrap().as_deref(), Some("drop-join-test"));
    }
}
