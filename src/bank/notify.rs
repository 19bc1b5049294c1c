//! Status changes of items are raised on whatever thread performs the change (typically a
//! worker), but observers are only ever called from [`crate::bank::Bank::loop_iteration`],
//! i.e. the thread driving the application's main loop. The relay in between is a FIFO queue.

use crate::bank::CacheLevel;
use crate::path::DotPath;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Loaded(DotPath),
    CacheChanged(DotPath, CacheLevel),
}

pub trait LoadObserver: Send + Sync {
    fn bank_loaded(&self, path: &DotPath);
}

pub trait CacheLevelObserver: Send + Sync {
    fn bank_cache_level_changed(&self, path: &DotPath, level: CacheLevel);
}

/// The set of observers of one kind of notification.
pub struct Audience<T: ?Sized> {
    members: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> Audience<T> {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, observer: Arc<T>) {
        self.members.write().expect("Audience Write Lock").push(observer);
    }

    /// Removes by identity.
    pub fn remove(&self, observer: &Arc<T>) {
        self.members
            .write()
            .expect("Audience Write Lock")
            .retain(|member| !Arc::ptr_eq(member, observer));
    }

    pub fn len(&self) -> usize {
        self.members.read().expect("Audience Read Lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observers are called on a snapshot, so they may add or remove observers themselves.
    fn members(&self) -> Vec<Arc<T>> {
        self.members.read().expect("Audience Read Lock").clone()
    }
}

impl<T: ?Sized> Default for Audience<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct NotificationRelay {
    threaded: bool,
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    iteration_requested: AtomicBool,
    pub audience_for_load: Audience<dyn LoadObserver>,
    pub audience_for_cache_level: Audience<dyn CacheLevelObserver>,
}

impl NotificationRelay {
    pub fn new(threaded: bool) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            threaded,
            sender,
            receiver,
            iteration_requested: AtomicBool::new(false),
            audience_for_load: Audience::new(),
            audience_for_cache_level: Audience::new(),
        }
    }

    pub fn notify(&self, notification: Notification) {
        // The relay owns the receiver, so the channel can't be disconnected.
        let _ = self.sender.send(notification);
        if self.threaded {
            self.iteration_requested.store(true, Ordering::Release);
        }
    }

    /// Returns whether notifications were queued (by a threaded bank) since the last call.
    /// Multiple notifications between two calls only count once.
    pub fn take_iteration_request(&self) -> bool {
        self.iteration_requested.swap(false, Ordering::AcqRel)
    }

    /// Delivers everything that is queued, in the order it was queued.
    pub fn perform_notifications(&self) {
        while let Ok(notification) = self.receiver.try_recv() {
            self.perform_notification(&notification);
        }
    }

    fn perform_notification(&self, notification: &Notification) {
        match notification {
            Notification::Loaded(path) => {
                for observer in self.audience_for_load.members() {
                    observer.bank_loaded(path);
                }
            }
            Notification::CacheChanged(path, level) => {
                for observer in self.audience_for_cache_level.members() {
                    observer.bank_cache_level_changed(path, *level);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl LoadObserver for Recorder {
        fn bank_loaded(&self, path: &DotPath) {
            self.events.lock().unwrap().push(format!("loaded {}", path));
        }
    }

    impl CacheLevelObserver for Recorder {
        fn bank_cache_level_changed(&self, path: &DotPath, level: CacheLevel) {
            self.events.lock().unwrap().push(format!("{} -> {:?}", path, level));
        }
    }

    #[test]
    fn delivers_in_submission_order() {
        let relay = NotificationRelay::new(true);
        let recorder = Arc::new(Recorder::default());
        relay.audience_for_load.add(recorder.clone());
        relay.audience_for_cache_level.add(recorder.clone());

        relay.notify(Notification::CacheChanged(DotPath::new("a"), CacheLevel::InMemory));
        relay.notify(Notification::Loaded(DotPath::new("a")));
        relay.notify(Notification::CacheChanged(DotPath::new("b"), CacheLevel::InHotStorage));
        assert!(recorder.events.lock().unwrap().is_empty());

        assert!(relay.take_iteration_request());
        assert!(!relay.take_iteration_request());
        relay.perform_notifications();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["a -> InMemory", "loaded a", "b -> InHotStorage"]
        );
        relay.perform_notifications();
        assert_eq!(recorder.events.lock().unwrap().len(), 3);
    }

    #[test]
    fn removed_observers_are_not_called() {
        let relay = NotificationRelay::new(true);
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn LoadObserver> = recorder.clone();
        relay.audience_for_load.add(observer.clone());
        assert_eq!(relay.audience_for_load.len(), 1);
        relay.audience_for_load.remove(&observer);
        assert!(relay.audience_for_load.is_empty());

        relay.notify(Notification::Loaded(DotPath::new("a")));
        relay.perform_notifications();
        assert!(recorder.events.lock().unwrap().is_empty());
    }
}
