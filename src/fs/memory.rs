use crate::fs::{ByteArray, FileSystem};
use dashmap::{DashMap, DashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// File system that lives entirely in memory. Useful for tools and tests, and for banks whose
/// hot storage should not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    folders: DashSet<PathBuf>,
    files: DashMap<PathBuf, Arc<MemoryFile>>,
    read_only: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// While read only, creating and removing files fails with `PermissionDenied`.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory file system is read only",
            ));
        }
        Ok(())
    }

    fn has_folder(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || self.folders.contains(path)
    }
}

impl FileSystem for MemoryFileSystem {
    fn make_folder(&self, path: &Path) -> io::Result<()> {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if self.files.contains_key(ancestor) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
            self.folders.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn new_file(&self, path: &Path) -> io::Result<Arc<dyn ByteArray>> {
        self.check_writable()?;
        let parent = path.parent().unwrap_or(Path::new(""));
        if !self.has_folder(parent) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("folder {} does not exist", parent.display()),
            ));
        }

        if self.folders.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a folder", path.display()),
            ));
        }

        let file = Arc::new(MemoryFile::default());
        self.files.insert(path.to_path_buf(), file.clone());
        Ok(file)
    }

    fn try_locate(&self, path: &Path) -> Option<Arc<dyn ByteArray>> {
        self.files
            .get(path)
            .map(|file| file.value().clone() as Arc<dyn ByteArray>)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check_writable()?;
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
    }
}

#[derive(Debug, Default)]
pub struct MemoryFile {
    contents: RwLock<Vec<u8>>,
}

impl ByteArray for MemoryFile {
    fn size(&self) -> u64 {
        self.contents.read().expect("Memory File Read Lock").len() as u64
    }

    fn read_all(&self) -> io::Result<Vec<u8>> {
        Ok(self.contents.read().expect("Memory File Read Lock").clone())
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        *self.contents.write().expect("Memory File Write Lock") = bytes.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_containing_folder() {
        let fs = MemoryFileSystem::new();
        assert!(fs.new_file(Path::new("a/b/c")).is_err());
        fs.make_folder(Path::new("a/b")).unwrap();
        assert!(fs.new_file(Path::new("a/b/c")).is_ok());
        assert!(fs.new_file(Path::new("top-level")).is_ok());
        assert_eq!(fs.file_count(), 2);
    }

    #[test]
    fn files_and_folders_do_not_share_names() {
        let fs = MemoryFileSystem::new();
        fs.make_folder(Path::new("a/b")).unwrap();
        assert!(fs.new_file(Path::new("a")).is_err());

        fs.new_file(Path::new("a/b/c")).unwrap();
        assert!(fs.make_folder(Path::new("a/b/c/d")).is_err());
    }

    #[test]
    fn read_only_rejects_writes() {
        let fs = MemoryFileSystem::new();
        let file = fs.new_file(Path::new("x")).unwrap();
        file.write_all(b"abc").unwrap();

        fs.set_read_only(true);
        assert!(fs.new_file(Path::new("y")).is_err());
        assert!(fs.remove_file(Path::new("x")).is_err());
        assert_eq!(fs.try_locate(Path::new("x")).unwrap().read_all().unwrap(), b"abc");
    }
}
