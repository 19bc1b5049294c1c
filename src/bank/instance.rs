use crate::bank::cache::{Cache, Format, SerializedCache};
use crate::bank::error::BankError;
use crate::bank::index::ItemIndex;
use crate::bank::item::{Item, ItemState};
use crate::bank::notify::{Notification, NotificationRelay};
use crate::bank::{BankData, BankFlags, DataLoader};
use crate::fs::{FileSystem, Folder};
use arc_swap::ArcSwapOption;
use log::{debug, trace, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Bank internals shared between the caller threads and the workers.
pub(crate) struct Instance<L: DataLoader> {
    flags: BankFlags,
    loader: L,
    file_system: Arc<dyn FileSystem>,
    pub source_cache: Cache,
    pub memory_cache: Cache,
    /// `None` while hot storage is disabled.
    pub serial_cache: ArcSwapOption<SerializedCache>,
    items: ItemIndex<L>,
    pub relay: NotificationRelay,
}

impl<L: DataLoader> Instance<L> {
    pub fn new(loader: L, flags: BankFlags, file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            flags,
            loader,
            file_system,
            source_cache: Cache::new(Format::Source),
            memory_cache: Cache::new(Format::Object),
            serial_cache: ArcSwapOption::empty(),
            items: ItemIndex::new(),
            relay: NotificationRelay::new(flags.contains(BankFlags::BACKGROUND_THREAD)),
        }
    }

    pub fn flags(&self) -> BankFlags {
        self.flags
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn items(&self) -> &ItemIndex<L> {
        &self.items
    }

    pub fn notify(&self, notification: Notification) {
        self.relay.notify(notification);
    }

    pub fn cache(&self, format: Format) -> Option<CacheRef<'_>> {
        match format {
            Format::Source => Some(CacheRef::Borrowed(&self.source_cache)),
            Format::Object => Some(CacheRef::Borrowed(&self.memory_cache)),
            Format::Serialized => self.serial_cache.load_full().map(CacheRef::Serialized),
        }
    }

    /// Moves the item into another cache: enters the new one (serializing or loading as
    /// needed), then leaves the old one (dropping what is no longer needed). If entering fails,
    /// nothing changes.
    pub fn change_cache(&self, item: &Item<L>, to: Format) -> Result<(), BankError> {
        let mut state = item.lock();
        self.move_item(item, &mut state, to)
    }

    /// Like [`Instance::change_cache`], but only ever moves the item down. An item already at
    /// or below `to` stays where it is.
    pub fn demote(&self, item: &Item<L>, to: Format) -> Result<(), BankError> {
        let mut state = item.lock();
        if state.cache.is_some_and(|from| from.level() <= to.level()) {
            return Ok(());
        }
        self.move_item(item, &mut state, to)
    }

    fn move_item(&self, item: &Item<L>, state: &mut ItemState<L::Data>, to: Format) -> Result<(), BankError> {
        let Some(from) = state.cache else {
            // Removed from the bank while this was pending.
            return Err(BankError::NotFound {
                path: item.path().clone(),
            });
        };

        if from == to {
            return Ok(());
        }

        self.cache_add(to, item, state)?;
        self.cache_remove(from, item, state);
        state.cache = Some(to);

        trace!("Item \"{}\" moved to {} cache", item.path(), to);
        self.notify(Notification::CacheChanged(item.path().clone(), to.level()));
        Ok(())
    }

    fn cache_add(&self, to: Format, item: &Item<L>, state: &mut ItemState<L::Data>) -> Result<(), BankError> {
        match to {
            Format::Source => self.source_cache.add(item.path(), 0),
            Format::Serialized => {
                let serial_cache = self
                    .serial_cache
                    .load_full()
                    .ok_or(BankError::HotStorageDisabled)?;

                item.serialize(state, &serial_cache.folder, self)?;
                let bytes = state.serial.as_ref().map_or(0, |serial| serial.size());
                serial_cache.cache.add(item.path(), bytes);
            }
            Format::Object => {
                // Acquire the object.
                item.load(state, self)?;
                let bytes = state
                    .data
                    .as_ref()
                    .map(|data| data.size_in_memory())
                    .ok_or_else(|| BankError::NothingLoaded {
                        path: item.path().clone(),
                    })?;
                self.memory_cache.add(item.path(), bytes);
            }
        }
        Ok(())
    }

    pub fn cache_remove(&self, from: Format, item: &Item<L>, state: &mut ItemState<L::Data>) {
        match from {
            Format::Source => self.source_cache.remove(item.path()),
            Format::Serialized => {
                state.serial = None;
                if let Some(serial_cache) = self.serial_cache.load_full() {
                    serial_cache.cache.remove(item.path());
                }
            }
            Format::Object => {
                item.clear_data(state);
                self.memory_cache.remove(item.path());
            }
        }
    }

    /// Places a newly added item: into hot storage if a fresh serialized copy is already
    /// there, otherwise into the source cache.
    pub fn put_in_best_cache(&self, item: &Item<L>, state: &mut ItemState<L::Data>) {
        assert!(state.cache.is_none(), "Item \"{}\" is already cached", item.path());

        if let Some(serial_cache) = self.serial_cache.load_full()
            && let Some(array) = serial_cache.folder.try_locate(&item.path().to_relative_path())
        {
            match Item::<L>::read_serial_time(array.as_ref()) {
                Ok(hot_time) if item.is_valid_serial_time(hot_time) => {
                    debug!("Found valid serialized copy of \"{}\"", item.path());
                    let bytes = array.size();
                    state.serial = Some(array);
                    state.cache = Some(Format::Serialized);
                    serial_cache.cache.add(item.path(), bytes);
                    return;
                }
                Ok(_) => debug!("Serialized copy of \"{}\" is stale", item.path()),
                Err(er) => warn!("Ignoring unreadable serialized copy of \"{}\": {}", item.path(), er),
            }
        }

        // The source cache is always good.
        state.cache = Some(Format::Source);
        self.source_cache.add(item.path(), 0);
    }

    /// Switches hot storage to `location`. Items in the previous hot storage have to be moved
    /// out before (see [`Instance::destroy_serial_cache`]).
    pub fn set_serial_location(&self, location: PathBuf, max_bytes: Option<u64>) -> Result<(), BankError> {
        // Serialized "hot" data is kept here.
        let folder = Folder::make(self.file_system.clone(), location)?;
        let serial_cache = SerializedCache::new(folder);
        serial_cache.cache.set_max_bytes(max_bytes);
        self.serial_cache.store(Some(Arc::new(serial_cache)));
        Ok(())
    }

    /// Disables hot storage. Items that were serialized fall back to the source cache. No jobs
    /// may be running.
    pub fn destroy_serial_cache(&self) {
        let Some(serial_cache) = self.serial_cache.swap(None) else {
            return;
        };

        // Should we delete the actual files where the data has been kept?
        if self.flags.contains(BankFlags::CLEAR_HOT_STORAGE_WHEN_BANK_DESTROYED) {
            for path in self.items.paths() {
                let relative = path.to_relative_path();
                if serial_cache.folder.has(&relative)
                    && let Err(er) = serial_cache.folder.remove_file(&relative)
                {
                    warn!("Failed to remove serialized \"{}\": {}", path, er);
                }
            }
        }

        for path in serial_cache.cache.items() {
            let Some(item) = self.items.find(&path) else {
                continue;
            };

            let mut state = item.lock();
            if state.cache == Some(Format::Serialized) {
                state.serial = None;
                state.cache = Some(Format::Source);
                self.source_cache.add(&path, 0);
                self.notify(Notification::CacheChanged(path, Format::Source.level()));
            }
        }
        serial_cache.cache.clear();
    }

    pub fn clear(&self) {
        self.items.clear();
        self.source_cache.clear();
        self.memory_cache.clear();
        if let Some(serial_cache) = self.serial_cache.load_full() {
            serial_cache.cache.clear();
        }
    }
}

/// A cache of the bank, keeping the hot storage alive while it is being looked at.
pub(crate) enum CacheRef<'a> {
    Borrowed(&'a Cache),
    Serialized(Arc<SerializedCache>),
}

impl std::ops::Deref for CacheRef<'_> {
    type Target = Cache;

    fn deref(&self) -> &Cache {
        match self {
            CacheRef::Borrowed(cache) => cache,
            CacheRef::Serialized(serial_cache) => &serial_cache.cache,
        }
    }
}
