use std::collections::VecDeque;
use std::sync::Mutex;

/// A thread-safe FIFO queue shared between a producer thread (recv/accept) and a
/// consumer (the server's public `read_message`/send threads). `VecDeque` already
/// amortizes its own front-popping, so this carries none of the manual pop-index/rebuild
/// bookkeeping the original hand-rolled queue needed.
pub struct SafeQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> Default for SafeQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> SafeQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&self, item: T) {
        self.inner.lock().unwrap().push_back(item);
    }

    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }
}
