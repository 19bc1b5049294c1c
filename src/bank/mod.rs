//! The bank: a thread-safe index of named items whose data is expensive to produce, each kept
//! in one of three caches at a time.
//!
//! Every item is always available from its source ("cold storage"). Once loaded, the data is
//! kept in memory. Memory can be relieved by serializing the data into a folder of files
//! ("hot storage"), which is much faster to load back than going to the source. Moving items
//! between the caches is done by jobs, either on the calling thread or on the bank's worker
//! pool.

pub mod cache;
pub mod error;
pub mod index;
mod instance;
mod item;
mod job;
pub mod notify;


use crate::bank::cache::{CacheStats, Format};
use crate::bank::error::BankError;
use crate::bank::index::ItemIndex;
use crate::bank::instance::Instance;
use crate::bank::item::Item;
use crate::bank::job::{Job, JobTask};
use crate::bank::notify::{Audience, CacheLevelObserver, LoadObserver};
use crate::concurrency::{Priority, TaskPool};
use crate::fs::FileSystem;
use crate::fs::native::NativeFileSystem;
use crate::path::DotPath;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, info, trace};
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BankFlags: u32 {
        /// Jobs run on a pool of worker threads instead of the calling thread.
        const BACKGROUND_THREAD = 0x1;
        /// Hot storage is never used, whatever location is configured.
        const DISABLE_HOT_STORAGE = 0x2;
        /// Serialized files of the bank's items are deleted when hot storage is torn down.
        const CLEAR_HOT_STORAGE_WHEN_BANK_DESTROYED = 0x4;
    }
}

impl Default for BankFlags {
    fn default() -> Self {
        BankFlags::BACKGROUND_THREAD
    }
}

/// How readily an item's data is available. Ordered from least to most available.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheLevel {
    /// Only the source is available.
    InColdStorage,
    /// A serialized copy is in hot storage.
    InHotStorage,
    /// The data is in memory and ready to use.
    InMemory,
}

/// Where a job is queued.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Importance {
    /// Ahead of everything queued with [`Importance::AfterQueued`].
    Immediately,
    AfterQueued,
}

/// Information about where an item's data comes from.
pub trait Source: Send + Sync + 'static {
    /// Last modification of the source. A serialized copy is only used if it was made from a
    /// source with exactly this timestamp. `None` means unknown, in which case serialized
    /// copies are always considered fresh.
    fn modified_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// The in-memory form of an item.
pub trait BankData: Send + Sync + 'static {
    /// Approximate number of bytes the data occupies, for cache accounting.
    fn size_in_memory(&self) -> u64;

    /// Called right before the bank lets go of the data.
    fn about_to_unload(&self) {}

    fn serialize(&self, to: &mut dyn Write) -> anyhow::Result<()>;

    /// Restores the state written by [`BankData::serialize`] into a blank instance created
    /// with [`DataLoader::new_data`].
    fn deserialize(&mut self, from: &mut dyn Read) -> anyhow::Result<()>;
}

/// What makes a concrete bank: how data is produced from its sources.
pub trait DataLoader: Send + Sync + 'static {
    type Source: Source;
    type Data: BankData;

    /// May take an arbitrary amount of time. Returning `Ok(None)` counts as a failed load.
    fn load_from_source(&self, source: &Self::Source) -> anyhow::Result<Option<Self::Data>>;

    /// A blank instance to deserialize into.
    fn new_data(&self) -> Self::Data;
}

pub struct BankSettings {
    pub flags: BankFlags,
    /// Folder for serialized data, relative to the file system's root.
    pub hot_storage_location: Option<PathBuf>,
    pub file_system: Arc<dyn FileSystem>,
    pub worker_threads: usize,
    /// Soft limit, only enforced by [`Bank::purge`]. `None` for unlimited.
    pub memory_cache_size: Option<u64>,
    /// Soft limit, only enforced by [`Bank::purge`]. `None` for unlimited.
    pub hot_storage_size: Option<u64>,
}

impl Default for BankSettings {
    fn default() -> Self {
        Self {
            flags: BankFlags::default(),
            hot_storage_location: None,
            file_system: Arc::new(NativeFileSystem::default()),
            worker_threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            memory_cache_size: None,
            hot_storage_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankStats {
    pub items: usize,
    pub source: CacheStats,
    /// `None` while hot storage is disabled.
    pub hot_storage: Option<CacheStats>,
    pub memory: CacheStats,
}

pub struct Bank<L: DataLoader> {
    d: Arc<Instance<L>>,
    /// `None` for a bank that runs its jobs synchronously.
    jobs: Option<TaskPool>,
}

impl<L: DataLoader> Bank<L> {
    pub fn new(loader: L, settings: BankSettings) -> Result<Self, BankError> {
        let d = Arc::new(Instance::new(loader, settings.flags, settings.file_system));
        let jobs = settings
            .flags
            .contains(BankFlags::BACKGROUND_THREAD)
            .then(|| TaskPool::new("bank-worker", settings.worker_threads));

        let bank = Self { d, jobs };
        bank.set_memory_cache_size(settings.memory_cache_size);
        if let Some(location) = settings.hot_storage_location {
            bank.set_hot_storage_cache_location(location)?;
        }
        bank.set_hot_storage_size(settings.hot_storage_size);

        info!(
            "Bank created ({})",
            match &bank.jobs {
                Some(pool) => format!("{} worker threads", pool.thread_count()),
                None => "synchronous".to_string(),
            }
        );
        Ok(bank)
    }

    pub fn flags(&self) -> BankFlags {
        self.d.flags()
    }

    /// Moves hot storage to `location`. An empty path disables hot storage. Items serialized
    /// in the previous location fall back to the source cache; their files are only deleted
    /// with [`BankFlags::CLEAR_HOT_STORAGE_WHEN_BANK_DESTROYED`].
    pub fn set_hot_storage_cache_location(&self, location: impl Into<PathBuf>) -> Result<(), BankError> {
        let location = location.into();

        if location.as_os_str().is_empty() || self.flags().contains(BankFlags::DISABLE_HOT_STORAGE) {
            debug!("Hot storage disabled");
            self.destroy_serial_cache();
        } else {
            let current = self.d.serial_cache.load_full();
            if current
                .as_ref()
                .is_some_and(|serial_cache| serial_cache.folder.path() == location)
            {
                return Ok(());
            }

            let max_bytes = current.and_then(|serial_cache| serial_cache.cache.max_bytes());
            self.destroy_serial_cache();
            self.d.set_serial_location(location.clone(), max_bytes)?;
            debug!("Hot storage located at {:?}", location);
        }

        self.flush_if_synchronous();
        Ok(())
    }

    pub fn set_hot_storage_size(&self, max_bytes: Option<u64>) {
        if let Some(serial_cache) = self.d.serial_cache.load_full() {
            serial_cache.cache.set_max_bytes(max_bytes);
        }
    }

    pub fn set_memory_cache_size(&self, max_bytes: Option<u64>) {
        self.d.memory_cache.set_max_bytes(max_bytes);
    }

    /// Soft limit on the number of items in memory, only enforced by [`Bank::purge`].
    pub fn set_memory_cache_items(&self, max_items: Option<usize>) {
        self.d.memory_cache.set_max_items(max_items);
    }

    /// `None` while hot storage is disabled.
    pub fn hot_storage_cache_location(&self) -> Option<PathBuf> {
        self.d
            .serial_cache
            .load_full()
            .map(|serial_cache| serial_cache.folder.path().to_path_buf())
    }

    /// `None` if unlimited or hot storage is disabled.
    pub fn hot_storage_size(&self) -> Option<u64> {
        self.d
            .serial_cache
            .load_full()
            .and_then(|serial_cache| serial_cache.cache.max_bytes())
    }

    pub fn memory_cache_size(&self) -> Option<u64> {
        self.d.memory_cache.max_bytes()
    }

    /// Removes all items. Waits for running jobs first.
    pub fn clear(&self) {
        self.wait_until_idle();
        self.d.clear();
    }

    /// Adds an item, placed in hot storage if a fresh serialized copy of it is already there
    /// and in the source cache otherwise. Nothing is loaded.
    ///
    /// Panics if the path is empty or already taken.
    pub fn add(&self, path: impl Into<DotPath>, source: L::Source) {
        let path = path.into();
        assert!(!path.is_empty(), "Bank items need a non-empty path");

        let item = Arc::new(Item::<L>::new(path, source));
        let mut state = item.lock();
        assert!(
            self.d.items().insert(item.clone()),
            "Bank already has an item \"{}\"",
            item.path()
        );
        self.d.put_in_best_cache(&item, &mut state);
    }

    /// Removes an item and whatever data it holds. A thread blocked in [`Bank::data`] for it
    /// gets an error.
    pub fn remove(&self, path: impl Into<DotPath>) {
        let path = path.into();
        let Some(item) = self.d.items().remove(&path) else {
            return;
        };

        {
            let mut state = item.lock();
            if let Some(format) = state.cache.take() {
                self.d.cache_remove(format, &item, &mut state);
            }
        }
        item.waitable.post();
        trace!("Removed \"{}\"", path);
    }

    pub fn has(&self, path: impl Into<DotPath>) -> bool {
        self.d.items().has(&path.into())
    }

    /// Paths of all items.
    pub fn all_items(&self) -> BTreeSet<DotPath> {
        self.d.items().paths().into_iter().collect()
    }

    pub fn index(&self) -> &ItemIndex<L> {
        self.d.items()
    }

    /// `None` if there is no such item.
    pub fn cache_level(&self, path: impl Into<DotPath>) -> Option<CacheLevel> {
        let item = self.d.items().find(&path.into())?;
        let state = item.lock();
        state.cache.map(|format| format.level())
    }

    /// Requests the item to be brought into memory. Does nothing if it already is.
    pub fn load(&self, path: impl Into<DotPath>, importance: Importance) {
        self.begin_job(Job::new(JobTask::Load, path.into()), importance);
    }

    /// Requests every item to be brought into memory, behind anything already queued.
    pub fn load_all(&self) {
        for path in self.d.items().paths() {
            self.load(path, Importance::AfterQueued);
        }
    }

    /// The item's data, loading it first if necessary. Blocks until the load has finished.
    pub fn data(&self, path: impl Into<DotPath>) -> Result<Arc<L::Data>, BankError> {
        let path = path.into();
        let item = self
            .d
            .items()
            .find(&path)
            .ok_or_else(|| BankError::NotFound { path: path.clone() })?;

        {
            let mut state = item.lock();

            // Mark it used.
            state.accessed_at = Some(Utc::now());

            if let Some(data) = &state.data {
                return Ok(data.clone());
            }

            // Removed since it was found, nobody would post.
            if state.cache.is_none() {
                return Err(BankError::NotFound { path });
            }

            // We'll have to request and wait.
            item.waitable.reset();
        }

        trace!("Loading \"{}\"...", path);
        let requested_at = Instant::now();
        self.load(path.clone(), Importance::Immediately);
        item.waitable.wait();

        debug!(
            "\"{}\" is ready (waited {:.2} seconds)",
            path,
            requested_at.elapsed().as_secs_f32()
        );

        let state = item.lock();
        state.data.clone().ok_or(BankError::Load { path })
    }

    /// Requests the item to be moved down to `to_level`. Does nothing if it is already there
    /// or below.
    pub fn unload(&self, path: impl Into<DotPath>, to_level: CacheLevel) {
        self.unload_with(path.into(), to_level, Importance::Immediately);
    }

    /// Requests every item to be moved down to `max_level`.
    pub fn unload_all(&self, max_level: CacheLevel) {
        if max_level >= CacheLevel::InMemory {
            return;
        }

        for path in self.d.items().paths() {
            self.unload(path, max_level);
        }
    }

    /// Drops the item back to its source.
    pub fn clear_from_cache(&self, path: impl Into<DotPath>) {
        self.unload(path, CacheLevel::InColdStorage);
    }

    /// Moves the least recently used items out of each cache that is over its limit, until the
    /// limit would be met. Items leaving memory go to hot storage when it is enabled.
    pub fn purge(&self) {
        let memory_target = if self.d.serial_cache.load().is_some() {
            CacheLevel::InHotStorage
        } else {
            CacheLevel::InColdStorage
        };
        self.purge_cache(Format::Object, memory_target);
        self.purge_cache(Format::Serialized, CacheLevel::InColdStorage);
    }

    fn purge_cache(&self, format: Format, to_level: CacheLevel) {
        let Some(cache) = self.d.cache(format) else {
            return;
        };

        let stats = cache.stats();
        if !stats.is_over_limit() {
            return;
        }

        let mut excess_bytes = stats
            .max_bytes
            .map_or(0, |max| stats.byte_count.saturating_sub(max));
        let mut excess_items = stats
            .max_items
            .map_or(0, |max| stats.item_count.saturating_sub(max));

        // Never accessed sorts first.
        let candidates = cache
            .item_sizes()
            .into_iter()
            .map(|(path, bytes)| {
                let accessed_at = self.d.items().find(&path).and_then(|item| {
                    let state = item.lock();
                    state.accessed_at
                });
                (accessed_at, path, bytes)
            })
            .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .collect_vec();

        for (_, path, bytes) in candidates {
            if excess_bytes == 0 && excess_items == 0 {
                break;
            }

            debug!("Purging \"{}\" from the {} cache", path, format);
            excess_bytes = excess_bytes.saturating_sub(bytes);
            excess_items = excess_items.saturating_sub(1);
            self.unload_with(path, to_level, Importance::AfterQueued);
        }
    }

    pub fn stats(&self) -> BankStats {
        BankStats {
            items: self.d.items().len(),
            source: self.d.source_cache.stats(),
            hot_storage: self
                .d
                .serial_cache
                .load_full()
                .map(|serial_cache| serial_cache.cache.stats()),
            memory: self.d.memory_cache.stats(),
        }
    }

    pub fn audience_for_load(&self) -> &Audience<dyn LoadObserver> {
        &self.d.relay.audience_for_load
    }

    pub fn audience_for_cache_level(&self) -> &Audience<dyn CacheLevelObserver> {
        &self.d.relay.audience_for_cache_level
    }

    /// Delivers the notifications queued by the workers. To be called regularly from the
    /// thread that owns the observers.
    pub fn loop_iteration(&self) {
        if self.d.relay.take_iteration_request() {
            self.d.relay.perform_notifications();
        }
    }

    /// Whether no jobs are queued or running. Always true for a synchronous bank.
    pub fn is_idle(&self) -> bool {
        self.jobs.as_ref().is_none_or(TaskPool::is_done)
    }

    /// Blocks until all queued and running jobs have finished.
    pub fn wait_until_idle(&self) {
        if let Some(pool) = &self.jobs {
            pool.wait_for_done();
        }
    }

    fn unload_with(&self, path: DotPath, to_level: CacheLevel, importance: Importance) {
        if to_level >= CacheLevel::InMemory {
            return;
        }

        if !self.has(&path) {
            return;
        }

        // The job checks the level when it runs, after any pending load.
        let task = if to_level == CacheLevel::InHotStorage && self.d.serial_cache.load().is_some() {
            JobTask::Serialize
        } else {
            JobTask::Unload
        };
        self.begin_job(Job::new(task, path), importance);
    }

    fn begin_job(&self, job: Job, importance: Importance) {
        match &self.jobs {
            Some(pool) => {
                let priority = match importance {
                    Importance::Immediately => Priority::High,
                    Importance::AfterQueued => Priority::Low,
                };
                let d = self.d.clone();
                pool.start(priority, move || job.run(d.as_ref()));
            }
            None => {
                job.run(self.d.as_ref());
                self.flush_if_synchronous();
            }
        }
    }

    /// A synchronous bank delivers notifications right after the change that raised them.
    fn flush_if_synchronous(&self) {
        if self.jobs.is_none() {
            self.d.relay.perform_notifications();
        }
    }

    fn destroy_serial_cache(&self) {
        self.wait_until_idle();
        self.d.destroy_serial_cache();
    }
}

impl<L: DataLoader> Drop for Bank<L> {
    fn drop(&mut self) {
        self.wait_until_idle();
        self.d.destroy_serial_cache();
    }
}
