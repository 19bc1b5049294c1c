use crossbeam_channel::{Receiver, Sender, select_biased, unbounded};
use log::{error, trace};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Priority {
    /// Runs before any queued low priority task.
    High,
    Low,
}

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    all_done: Condvar,
}

impl Pending {
    fn begin(&self) {
        *self.count.lock().expect("Pending Lock") += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock().expect("Pending Lock");
        *count -= 1;
        if *count == 0 {
            self.all_done.notify_all();
        }
    }
}

/// Fixed set of worker threads fed by two queues. Workers always take from the high priority
/// queue first, so a task started with [`Priority::High`] overtakes low priority ones that
/// were queued earlier. Within one priority, tasks start in FIFO order.
pub struct TaskPool {
    high: Option<Sender<Task>>,
    low: Option<Sender<Task>>,
    pending: Arc<Pending>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    pub fn new(name: &str, thread_count: usize) -> Self {
        let (high_sender, high_receiver) = unbounded::<Task>();
        let (low_sender, low_receiver) = unbounded::<Task>();
        let pending = Arc::new(Pending::default());

        let workers = (0..thread_count.max(1))
            .map(|index| {
                let high = high_receiver.clone();
                let low = low_receiver.clone();
                let pending = pending.clone();
                std::thread::Builder::new()
                    .name(format!("{}-{}", name, index))
                    .spawn(move || Self::worker(high, low, pending))
                    .expect("Spawning a Task Pool Worker Thread succeeds")
            })
            .collect();

        Self {
            high: Some(high_sender),
            low: Some(low_sender),
            pending,
            workers,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    pub fn start<F>(&self, priority: Priority, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = match priority {
            Priority::High => &self.high,
            Priority::Low => &self.low,
        };

        self.pending.begin();
        let sent = sender
            .as_ref()
            .map(|sender| sender.send(Box::new(task)).is_ok())
            .unwrap_or(false);

        if !sent {
            // Only possible while the pool is being torn down.
            error!("Task Pool is shutting down, task dropped");
            self.pending.finish();
        }
    }

    /// Blocks until every task started so far (and every task those tasks started) finished.
    pub fn wait_for_done(&self) {
        let _count = self
            .pending
            .all_done
            .wait_while(self.pending.count.lock().expect("Pending Lock"), |count| *count > 0)
            .expect("Pending Lock");
    }

    pub fn is_done(&self) -> bool {
        *self.pending.count.lock().expect("Pending Lock") == 0
    }

    fn worker(high: Receiver<Task>, low: Receiver<Task>, pending: Arc<Pending>) {
        loop {
            let task = select_biased! {
                recv(high) -> task => task,
                recv(low) -> task => task,
            };

            let Ok(task) = task else {
                trace!("Task Pool Worker shutting down");
                return;
            };

            if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                error!("Task aborted due to a panic: {}", panic_message(&panic));
            }
            pending.finish();
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.wait_for_done();

        // Disconnecting the queues ends the worker loops.
        self.high.take();
        self.low.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Task Pool Worker terminated abnormally");
            }
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
