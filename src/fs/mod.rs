//! The file system the bank keeps its hot storage in.
//!
//! Paths handed to a [`FileSystem`] are relative to its root. Files are [`ByteArray`]s: the bank
//! only ever reads or (re)writes them as a whole.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod memory;
pub mod native;

pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;

pub trait ByteArray: Send + Sync + Debug {
    fn size(&self) -> u64;
    fn read_all(&self) -> io::Result<Vec<u8>>;
    /// Replaces the whole contents.
    fn write_all(&self, bytes: &[u8]) -> io::Result<()>;
}

pub trait FileSystem: Send + Sync {
    /// Creates the folder and all of its parents. Succeeds if it already exists.
    fn make_folder(&self, path: &Path) -> io::Result<()>;

    /// Creates an empty file, replacing an existing one. The containing folder must exist.
    fn new_file(&self, path: &Path) -> io::Result<Arc<dyn ByteArray>>;

    fn try_locate(&self, path: &Path) -> Option<Arc<dyn ByteArray>>;

    fn has(&self, path: &Path) -> bool {
        self.try_locate(path).is_some()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// A folder inside a [`FileSystem`], e.g. the hot storage root of a bank.
#[derive(Clone)]
pub struct Folder {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl Folder {
    pub fn make(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs.make_folder(&path)?;
        Ok(Self { fs, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn make_subfolder(&self, relative: &Path) -> io::Result<Folder> {
        Folder::make(self.fs.clone(), self.path.join(relative))
    }

    pub fn new_file(&self, name: &str) -> io::Result<Arc<dyn ByteArray>> {
        self.fs.new_file(&self.path.join(name))
    }

    pub fn try_locate(&self, relative: &Path) -> Option<Arc<dyn ByteArray>> {
        self.fs.try_locate(&self.path.join(relative))
    }

    pub fn has(&self, relative: &Path) -> bool {
        self.fs.has(&self.path.join(relative))
    }

    pub fn remove_file(&self, relative: &Path) -> io::Result<()> {
        self.fs.remove_file(&self.path.join(relative))
    }
}

impl Debug for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Folder").field("path", &self.path).finish()
    }
}
