use crate::bank::cache::Format;
use crate::bank::error::BankError;
use crate::bank::instance::Instance;
use crate::bank::notify::Notification;
use crate::bank::{BankData, DataLoader, Source};
use crate::concurrency::Waitable;
use crate::fs::{ByteArray, Folder};
use crate::path::DotPath;
use bank_files::hot::reader::HotStorageReader;
use bank_files::hot::writer::HotStorageWriter;
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Mutable part of an item. Only ever touched while holding the item's lock.
pub(crate) struct ItemState<D> {
    /// Present while the item is in memory.
    pub data: Option<Arc<D>>,
    /// Present while the item is in hot storage. The file system owns the file.
    pub serial: Option<Arc<dyn ByteArray>>,
    /// The cache the item is currently in. `None` before it has been placed and after removal.
    pub cache: Option<Format>,
    pub accessed_at: Option<DateTime<Utc>>,
}

/// One named entry of a bank. Owns the source information and, while loaded, the object.
pub(crate) struct Item<L: DataLoader> {
    path: DotPath,
    source: L::Source,
    state: Mutex<ItemState<L::Data>>,
    /// Posted whenever a load attempt of this item finished.
    pub waitable: Waitable,
}

impl<L: DataLoader> Item<L> {
    pub fn new(path: DotPath, source: L::Source) -> Self {
        Self {
            path,
            source,
            state: Mutex::new(ItemState {
                data: None,
                serial: None,
                cache: None,
                accessed_at: None,
            }),
            waitable: Waitable::new(),
        }
    }

    pub fn path(&self) -> &DotPath {
        &self.path
    }

    pub fn lock(&self) -> MutexGuard<'_, ItemState<L::Data>> {
        self.state.lock().expect("Item Lock")
    }

    pub fn clear_data(&self, state: &mut ItemState<L::Data>) {
        if let Some(data) = state.data.take() {
            debug!(
                "Item \"{}\" data cleared from memory ({} bytes)",
                self.path,
                data.size_in_memory()
            );
            data.about_to_unload();
        }
    }

    pub fn set_data(&self, state: &mut ItemState<L::Data>, data: L::Data, bank: &Instance<L>) {
        state.data = Some(Arc::new(data));
        state.accessed_at = Some(Utc::now());
        bank.notify(Notification::Loaded(self.path.clone()));
    }

    /// Loads the item into memory from the cache it is currently in.
    pub fn load(&self, state: &mut ItemState<L::Data>, bank: &Instance<L>) -> Result<(), BankError> {
        match state.cache.expect("Item has been placed in a cache") {
            Format::Source => self.load_from_source(state, bank),
            Format::Serialized => self.load_from_serialized(state, bank),
            // Already loaded.
            Format::Object => Ok(()),
        }
    }

    fn fetch_from_source(&self, bank: &Instance<L>) -> Result<L::Data, BankError> {
        let started_at = Instant::now();

        // This may take an unspecified amount of time.
        let loaded = bank.loader().load_from_source(&self.source)?;

        trace!(
            "Loaded \"{}\" from source in {:.2} seconds",
            self.path,
            started_at.elapsed().as_secs_f32()
        );

        loaded.ok_or_else(|| BankError::NothingLoaded {
            path: self.path.clone(),
        })
    }

    fn load_from_source(&self, state: &mut ItemState<L::Data>, bank: &Instance<L>) -> Result<(), BankError> {
        let data = self.fetch_from_source(bank)?;
        self.set_data(state, data, bank);
        Ok(())
    }

    /// A serialized copy is only usable if the source has not been modified since.
    pub fn is_valid_serial_time(&self, serial_time: Option<DateTime<Utc>>) -> bool {
        match self.source.modified_at() {
            None => true,
            Some(modified_at) => serial_time == Some(modified_at),
        }
    }

    fn load_from_serialized(&self, state: &mut ItemState<L::Data>, bank: &Instance<L>) -> Result<(), BankError> {
        match self.deserialize(state, bank) {
            Ok(Some(data)) => {
                self.set_data(state, data, bank);
                return Ok(());
            }
            Ok(None) => debug!("Serialized copy of \"{}\" is stale", self.path),
            Err(er) => warn!("Failed to deserialize \"{}\": {}", self.path, er),
        }

        // Fallback option.
        self.load_from_source(state, bank)
    }

    /// `Ok(None)` when the serialized copy is older than the source.
    fn deserialize(&self, state: &ItemState<L::Data>, bank: &Instance<L>) -> Result<Option<L::Data>, BankError> {
        let serial = state
            .serial
            .as_ref()
            .expect("Item in the Serialized cache has a serial");

        let started_at = Instant::now();
        let bytes = serial.read_all()?;
        let mut reader = Cursor::new(bytes);
        let header = HotStorageReader::parse_header(&mut reader)?;

        if !self.is_valid_serial_time(header_time(header.timestamp())) {
            return Ok(None);
        }

        let mut blank = bank.loader().new_data();
        blank.deserialize(&mut reader)?;

        trace!(
            "Deserialized \"{}\" in {:.2} seconds",
            self.path,
            started_at.elapsed().as_secs_f32()
        );
        Ok(Some(blank))
    }

    /// Writes the item into `folder`, mirroring the dotted path as subfolders. An object that
    /// had to be loaded just for this is dropped again afterwards.
    pub fn serialize(&self, state: &mut ItemState<L::Data>, folder: &Folder, bank: &Instance<L>) -> Result<(), BankError> {
        if state.serial.is_some() {
            // Already serialized.
            return Ok(());
        }

        let (data, transient) = match &state.data {
            Some(data) => (data.clone(), false),
            // We must have the object in memory first.
            None => (Arc::new(self.fetch_from_source(bank)?), true),
        };

        let written = self.write_serial(&data, folder);
        if transient {
            data.about_to_unload();
        }

        match written {
            Ok(serial) => {
                state.serial = Some(serial);
                Ok(())
            }
            Err(er) => {
                state.serial = None;
                Err(er)
            }
        }
    }

    fn write_serial(&self, data: &L::Data, folder: &Folder) -> Result<Arc<dyn ByteArray>, BankError> {
        let containing_folder = match self.path.parent() {
            Some(parent) => folder.make_subfolder(&parent.to_relative_path())?,
            None => folder.clone(),
        };

        // The source timestamp is included to check later whether the data is still fresh.
        let mut buf = Vec::new();
        HotStorageWriter::write_header(&mut buf, serial_time(self.source.modified_at()))?;
        data.serialize(&mut buf)?;

        let serial = containing_folder.new_file(&self.path.file_name())?;
        serial.write_all(&buf)?;
        trace!("Serialized \"{}\" ({} bytes)", self.path, buf.len());
        Ok(serial)
    }

    /// Timestamp recorded in the header of a serialized copy.
    pub fn read_serial_time(serial: &dyn ByteArray) -> Result<Option<DateTime<Utc>>, BankError> {
        let bytes = serial.read_all()?;
        let header = HotStorageReader::parse_header(&mut bytes.as_slice())?;
        Ok(header_time(header.timestamp()))
    }
}

fn serial_time(time: Option<DateTime<Utc>>) -> Option<(i64, u32)> {
    time.map(|time| (time.timestamp(), time.timestamp_subsec_nanos()))
}

fn header_time(timestamp: Option<(i64, u32)>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|(seconds, nanos)| DateTime::from_timestamp(seconds, nanos))
}
