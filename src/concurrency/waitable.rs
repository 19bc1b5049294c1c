use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Counting semaphore: [`Waitable::wait`] blocks until somebody [`Waitable::post`]s.
///
/// Posts are kept while nobody is waiting yet.
#[derive(Debug, Default)]
pub struct Waitable {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Waitable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets all pending posts.
    pub fn reset(&self) {
        *self.count.lock().expect("Waitable Lock") = 0;
    }

    pub fn post(&self) {
        let mut count = self.count.lock().expect("Waitable Lock");
        *count += 1;
        self.cond.notify_one();
    }

    pub fn wait(&self) {
        let mut count = self
            .cond
            .wait_while(self.count.lock().expect("Waitable Lock"), |count| *count == 0)
            .expect("Waitable Lock");
        *count -= 1;
    }

    /// Returns `false` if the timeout elapsed without a post.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (mut count, result) = self
            .cond
            .wait_timeout_while(self.count.lock().expect("Waitable Lock"), timeout, |count| {
                *count == 0
            })
            .expect("Waitable Lock");

        if result.timed_out() && *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn post_before_wait_is_kept() {
        let waitable = Waitable::new();
        waitable.post();
        assert!(waitable.wait_timeout(Duration::from_millis(10)));
        assert!(!waitable.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn reset_drops_posts() {
        let waitable = Waitable::new();
        waitable.post();
        waitable.post();
        waitable.reset();
        assert!(!waitable.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn wakes_other_thread() {
        let waitable = Arc::new(Waitable::new());
        let poster = waitable.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            poster.post();
        });
        waitable.wait();
        handle.join().unwrap();
    }
}
