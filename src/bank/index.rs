use crate::bank::DataLoader;
use crate::bank::item::Item;
use crate::path::DotPath;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use itertools::Itertools;
use std::sync::Arc;

/// All items of a bank, keyed by their dotted path.
///
/// Insertion, removal and lookup may happen concurrently from any thread. Lookups hand out
/// clones of the `Arc`s, so no map lock is held while an item is being worked on.
pub struct ItemIndex<L: DataLoader> {
    items: DashMap<DotPath, Arc<Item<L>>>,
}

impl<L: DataLoader> ItemIndex<L> {
    pub(crate) fn new() -> Self {
        Self {
            items: DashMap::with_capacity(100),
        }
    }

    /// Returns `false` (and leaves the index untouched) if the path is taken.
    pub(crate) fn insert(&self, item: Arc<Item<L>>) -> bool {
        match self.items.entry(item.path().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(item);
                true
            }
        }
    }

    pub(crate) fn find(&self, path: &DotPath) -> Option<Arc<Item<L>>> {
        self.items.get(path).map(|item| item.value().clone())
    }

    pub(crate) fn remove(&self, path: &DotPath) -> Option<Arc<Item<L>>> {
        self.items.remove(path).map(|(_, item)| item)
    }

    pub(crate) fn clear(&self) {
        self.items.clear();
    }

    pub fn has(&self, path: &DotPath) -> bool {
        self.items.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every item path, sorted.
    pub fn paths(&self) -> Vec<DotPath> {
        self.items
            .iter()
            .map(|entry| entry.key().clone())
            .sorted()
            .collect_vec()
    }

    /// Paths of `prefix` and every item below it, sorted.
    pub fn paths_under(&self, prefix: &DotPath) -> Vec<DotPath> {
        self.items
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .sorted()
            .collect_vec()
    }
}
