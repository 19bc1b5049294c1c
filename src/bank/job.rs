use crate::bank::DataLoader;
use crate::bank::cache::Format;
use crate::bank::error::BankError;
use crate::bank::instance::Instance;
use crate::concurrency::Waitable;
use crate::path::DotPath;
use log::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum JobTask {
    Load,
    Serialize,
    Unload,
}

/// One operation on an item, run either right away or by a worker of the bank's pool.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    task: JobTask,
    path: DotPath,
}

/// Posts on drop, so a blocking load is released on every way out of a job, panics included.
struct PostOnDrop<'a>(&'a Waitable);

impl Drop for PostOnDrop<'_> {
    fn drop(&mut self) {
        self.0.post();
    }
}

impl Job {
    pub fn new(task: JobTask, path: DotPath) -> Self {
        Self { task, path }
    }

    /// Failures are logged and leave the item in the cache it was in. Serialize and unload only
    /// move an item down, judged by where it is when the job runs.
    pub fn run<L: DataLoader>(&self, bank: &Instance<L>) {
        match self.task {
            JobTask::Load => self.do_load(bank),
            JobTask::Serialize => self.do_serialize(bank),
            JobTask::Unload => self.do_unload(bank),
        }
    }

    fn do_load<L: DataLoader>(&self, bank: &Instance<L>) {
        let Some(item) = bank.items().find(&self.path) else {
            warn!("Failed to load \"{}\": no such item", self.path);
            return;
        };

        // Ensure a blocking load completes.
        let _post = PostOnDrop(&item.waitable);

        if let Err(er) = bank.change_cache(&item, Format::Object) {
            warn!("Failed to load \"{}\" from source: {}", self.path, er);
        }
    }

    fn do_serialize<L: DataLoader>(&self, bank: &Instance<L>) {
        debug!("Serializing \"{}\"", self.path);
        let result = bank
            .items()
            .find(&self.path)
            .ok_or_else(|| BankError::NotFound {
                path: self.path.clone(),
            })
            .and_then(|item| bank.demote(&item, Format::Serialized));

        if let Err(er) = result {
            warn!("Failed to serialize \"{}\" to hot storage: {}", self.path, er);
        }
    }

    fn do_unload<L: DataLoader>(&self, bank: &Instance<L>) {
        debug!("Unloading \"{}\"", self.path);
        let result = bank
            .items()
            .find(&self.path)
            .ok_or_else(|| BankError::NotFound {
                path: self.path.clone(),
            })
            .and_then(|item| bank.demote(&item, Format::Source));

        if let Err(er) = result {
            warn!("Error when unloading \"{}\": {}", self.path, er);
        }
    }
}
