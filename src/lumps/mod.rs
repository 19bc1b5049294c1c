//! Plain files as bank items: the file is the source, its raw bytes ("lump") the data.

use crate::bank::{BankData, DataLoader, Source};
use crate::path::DotPath;
use anyhow::{Context, bail};
use bank_files::common::reader::{Parseable, read_sized_blob};
use bank_files::common::writer::{Writable, write_sized_blob};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{trace, warn};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LumpSource {
    path: PathBuf,
}

impl LumpSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for LumpSource {
    fn modified_at(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Lump {
    bytes: Vec<u8>,
    checksum: u32,
}

impl Lump {
    pub fn new(bytes: Vec<u8>) -> Self {
        let checksum = checksum(&bytes);
        Self { bytes, checksum }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }
}

impl BankData for Lump {
    fn size_in_memory(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn about_to_unload(&self) {
        trace!("Dropping lump of {} bytes", self.bytes.len());
    }

    fn serialize(&self, mut to: &mut dyn Write) -> anyhow::Result<()> {
        self.checksum.write(&mut to)?;
        write_sized_blob(&mut to, &self.bytes)?;
        Ok(())
    }

    fn deserialize(&mut self, mut from: &mut dyn Read) -> anyhow::Result<()> {
        let expected = u32::parse(&mut from)?;
        let bytes = read_sized_blob(&mut from)?;
        let actual = checksum(&bytes);
        if actual != expected {
            bail!("Lump checksum mismatch: {:#010x} != {:#010x}", actual, expected);
        }

        self.bytes = bytes;
        self.checksum = actual;
        Ok(())
    }
}

/// FNV-1a
fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, &byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

#[derive(Debug, Default)]
pub struct LumpLoader;

impl DataLoader for LumpLoader {
    type Source = LumpSource;
    type Data = Lump;

    fn load_from_source(&self, source: &LumpSource) -> anyhow::Result<Option<Lump>> {
        let bytes = fs::read(&source.path).with_context(|| format!("Reading {:?}", source.path))?;
        Ok(Some(Lump::new(bytes)))
    }

    fn new_data(&self) -> Lump {
        Lump::default()
    }
}

/// Item path of a file below `root`: the folders and the file name joined with dots. Dots
/// within a name become underscores, so `music/intro.ogg` is `music.intro_ogg`.
pub fn item_path(root: &Path, file: &Path) -> Option<DotPath> {
    let relative = file.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().replace('.', "_"))
        .collect_vec();

    let path = DotPath::new(segments.join("."));
    (!path.is_empty()).then_some(path)
}

/// Every file below `root`, recursively, sorted by item path.
pub fn scan_lumps(root: &Path) -> anyhow::Result<Vec<(DotPath, LumpSource)>> {
    let mut found = Vec::new();
    let mut folders = vec![root.to_path_buf()];

    while let Some(folder) = folders.pop() {
        let entries = fs::read_dir(&folder).with_context(|| format!("Failed to enumerate {:?}", folder))?;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.is_dir() {
                folders.push(path);
                continue;
            }

            match item_path(root, &path) {
                Some(item) => found.push((item, LumpSource::new(path))),
                None => warn!("Skipping {:?}: no usable item name", path),
            }
        }
    }

    Ok(found
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .dedup_by(|a, b| a.0 == b.0)
        .collect_vec())
}
