use crate::fs::{ByteArray, FileSystem};
use log::trace;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File system backed by `std::fs`, rooted at a directory of the host.
#[derive(Debug, Clone)]
pub struct NativeFileSystem {
    root: PathBuf,
}

impl NativeFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn native_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Default for NativeFileSystem {
    /// Relative paths resolve against the working directory, absolute ones are used as is.
    fn default() -> Self {
        Self::new("")
    }
}

impl FileSystem for NativeFileSystem {
    fn make_folder(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(self.native_path(path))
    }

    fn new_file(&self, path: &Path) -> io::Result<Arc<dyn ByteArray>> {
        let native_path = self.native_path(path);
        std::fs::File::create(&native_path)?;
        trace!("Created {}", native_path.display());
        Ok(Arc::new(NativeFile { native_path }))
    }

    fn try_locate(&self, path: &Path) -> Option<Arc<dyn ByteArray>> {
        let native_path = self.native_path(path);
        native_path
            .is_file()
            .then(|| Arc::new(NativeFile { native_path }) as Arc<dyn ByteArray>)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(self.native_path(path))
    }
}

#[derive(Debug)]
pub struct NativeFile {
    native_path: PathBuf,
}

impl NativeFile {
    pub fn native_path(&self) -> &Path {
        &self.native_path
    }
}

impl ByteArray for NativeFile {
    fn size(&self) -> u64 {
        std::fs::metadata(&self.native_path)
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.native_path)
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        std::fs::write(&self.native_path, bytes)
    }
}
