use crate::bank::CacheLevel;
use crate::fs::Folder;
use crate::path::DotPath;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// The representation an item is kept in. Each format has exactly one cache per bank.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    /// Data is present only as source information.
    Source,
    /// Data is present as a block of serialized bytes in hot storage.
    Serialized,
    /// Data is present as a fully usable object in memory.
    Object,
}

impl Format {
    pub fn as_text(&self) -> &'static str {
        match self {
            Format::Source => "Source",
            Format::Serialized => "Serialized",
            Format::Object => "Object",
        }
    }

    pub fn level(&self) -> CacheLevel {
        match self {
            Format::Source => CacheLevel::InColdStorage,
            Format::Serialized => CacheLevel::InHotStorage,
            Format::Object => CacheLevel::InMemory,
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Snapshot of a cache's accounting.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub format: Format,
    pub item_count: usize,
    pub byte_count: u64,
    pub max_bytes: Option<u64>,
    pub max_items: Option<usize>,
}

impl CacheStats {
    pub fn is_over_limit(&self) -> bool {
        self.max_bytes.is_some_and(|max| self.byte_count > max)
            || self.max_items.is_some_and(|max| self.item_count > max)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    /// Members and the bytes each one was accounted with.
    items: HashMap<DotPath, u64>,
    current_bytes: u64,
    max_bytes: Option<u64>,
    max_items: Option<usize>,
}

/// Membership and accounting of the items currently kept in one [`Format`]. Does not own the
/// items or their data. The limits are soft: nothing is evicted unless the bank is purged.
#[derive(Debug)]
pub(crate) struct Cache {
    format: Format,
    state: Mutex<CacheState>,
}

impl Cache {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn set_max_bytes(&self, max_bytes: Option<u64>) {
        self.state.lock().expect("Cache Lock").max_bytes = max_bytes;
    }

    pub fn set_max_items(&self, max_items: Option<usize>) {
        self.state.lock().expect("Cache Lock").max_items = max_items;
    }

    pub fn max_bytes(&self) -> Option<u64> {
        self.state.lock().expect("Cache Lock").max_bytes
    }

    pub fn items(&self) -> Vec<DotPath> {
        self.state
            .lock()
            .expect("Cache Lock")
            .items
            .keys()
            .cloned()
            .collect_vec()
    }

    /// Size each member was accounted with.
    pub fn item_sizes(&self) -> Vec<(DotPath, u64)> {
        self.state
            .lock()
            .expect("Cache Lock")
            .items
            .iter()
            .map(|(path, bytes)| (path.clone(), *bytes))
            .collect_vec()
    }

    pub fn add(&self, path: &DotPath, bytes: u64) {
        let mut state = self.state.lock().expect("Cache Lock");
        if let Some(previous) = state.items.insert(path.clone(), bytes) {
            state.current_bytes = state.current_bytes.saturating_sub(previous);
        }
        state.current_bytes += bytes;
    }

    pub fn remove(&self, path: &DotPath) {
        let mut state = self.state.lock().expect("Cache Lock");
        if let Some(bytes) = state.items.remove(path) {
            state.current_bytes = state.current_bytes.saturating_sub(bytes);
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("Cache Lock");
        state.items.clear();
        state.current_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().expect("Cache Lock");
        CacheStats {
            format: self.format,
            item_count: state.items.len(),
            byte_count: state.current_bytes,
            max_bytes: state.max_bytes,
            max_items: state.max_items,
        }
    }
}

/// Hot storage: items serialized into files below a folder, so they can be brought back into
/// memory faster than from their source.
#[derive(Debug)]
pub(crate) struct SerializedCache {
    pub cache: Cache,
    pub folder: Folder,
}

impl SerializedCache {
    pub fn new(folder: Folder) -> Self {
        Self {
            cache: Cache::new(Format::Serialized),
            folder,
        }
    }
}
