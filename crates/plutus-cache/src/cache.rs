//! The metadata cache arena.

use parking_lot::{Mutex, RwLock};
use plutus_format::{ReadStats, TickReader, read_footer};
use plutus_types::{
    CorruptPolicy, DatasetFile, DatasetRoot, Fingerprint, StorageFormat, TickFields,
};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{CacheError, MetadataCacheEntry, Result};

/// In-memory state of one file's entry.
#[derive(Debug, Default)]
struct Slot {
    loaded: bool,
    entry: Option<MetadataCacheEntry>,
}

/// Per-file statistics persisted under `<root>/.plutus/meta`.
///
/// Each file has its own slot behind its own lock, so work on one entry never
/// blocks another. Entries are loaded from disk on first access.
#[derive(Debug)]
pub struct MetadataCache {
    root: PathBuf,
    dir: PathBuf,
    policy: CorruptPolicy,
    slots: RwLock<HashMap<PathBuf, Arc<Mutex<Slot>>>>,
}

impl MetadataCache {
    /// Creates a cache for the dataset at `root`.
    ///
    /// `policy` applies to the scans run by [`MetadataCache::refresh`].
    #[must_use]
    pub fn new(root: &DatasetRoot, policy: CorruptPolicy) -> Self {
        Self {
            root: root.path().to_path_buf(),
            dir: root.meta_dir(),
            policy,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the directory holding the persisted entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the persisted entry for `file`, if the file lives
    /// under the dataset root.
    #[must_use]
    pub fn entry_path(&self, file: &DatasetFile) -> Option<PathBuf> {
        let rel = file.path.strip_prefix(&self.root).ok()?;
        let mut name = OsString::from(self.dir.join(rel));
        name.push(".json");
        Some(PathBuf::from(name))
    }

    fn slot(&self, path: &Path) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().get(path) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(path.to_path_buf()).or_default())
    }

    /// Returns the entry for `file` if it matches the file as it is on disk now.
    ///
    /// Missing, unreadable and stale entries all return `None`.
    #[must_use]
    pub fn lookup(&self, file: &DatasetFile) -> Option<MetadataCacheEntry> {
        let current = Fingerprint::of(&file.path).ok()?;
        let slot = self.slot(&file.path);
        let mut slot = slot.lock();

        if !slot.loaded {
            slot.entry = self.load(file);
            slot.loaded = true;
        }

        let entry = slot.entry.as_ref()?;
        if entry.is_current(&current) {
            debug!(path = %file.path.display(), "metadata cache hit");
            Some(entry.clone())
        } else {
            warn!(
                path = %file.path.display(),
                cached = %entry.fingerprint.encode(),
                current = %current.encode(),
                "stale metadata cache entry"
            );
            slot.entry = None;
            None
        }
    }

    /// Stores `entry` for `file`, persisting it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn put(&self, file: &DatasetFile, entry: MetadataCacheEntry) -> Result<()> {
        let slot = self.slot(&file.path);
        let mut slot = slot.lock();
        self.persist(file, &entry)?;
        slot.entry = Some(entry);
        slot.loaded = true;
        Ok(())
    }

    /// Recomputes the statistics of `file` and stores them.
    ///
    /// Optimized files use their footer statistics when every row group has
    /// them; otherwise the file is scanned for timestamps only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the entry cannot be written.
    pub fn refresh(&self, file: &DatasetFile) -> Result<MetadataCacheEntry> {
        let fingerprint = Fingerprint::of(&file.path).map_err(plutus_types::PlutusError::from)?;
        let entry = match file.format {
            StorageFormat::Optimized => {
                let footer = read_footer(&file.path)?;
                let entry = match footer.timestamp_bounds {
                    Some(bounds) => {
                        MetadataCacheEntry::new(fingerprint, Some(bounds), footer.num_rows)
                    }
                    None if footer.num_rows == 0 => {
                        MetadataCacheEntry::new(fingerprint, None, 0)
                    }
                    None => self.scan(file, fingerprint)?,
                };
                entry.with_source_fingerprint(footer.source_fingerprint)
            }
            StorageFormat::Raw => self.scan(file, fingerprint)?,
        };

        debug!(
            path = %file.path.display(),
            rows = entry.row_count,
            "refreshed metadata cache entry"
        );
        self.put(file, entry.clone())?;
        Ok(entry)
    }

    /// Stores the bounds observed by a read of `file`.
    ///
    /// Partial reads, and reads of a file that changed since it was catalogued,
    /// are ignored. Returns true if an entry was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    pub fn record(&self, file: &DatasetFile, stats: &ReadStats) -> Result<bool> {
        if !stats.exhausted {
            return Ok(false);
        }
        match Fingerprint::of(&file.path) {
            Ok(current) if current == file.fingerprint => {
                let entry = MetadataCacheEntry::from_stats(current, stats)
                    .with_source_fingerprint(file.source_fingerprint);
                self.put(file, entry)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Removes the entry for `file` from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted entry exists but cannot be deleted.
    pub fn invalidate(&self, file: &DatasetFile) -> Result<()> {
        let slot = self.slot(&file.path);
        let mut slot = slot.lock();
        slot.entry = None;
        slot.loaded = true;
        if let Some(path) = self.entry_path(file)
            && path.exists()
        {
            fs::remove_file(&path).map_err(|e| CacheError::DeleteFile { path, source: e })?;
        }
        Ok(())
    }

    fn scan(&self, file: &DatasetFile, fingerprint: Fingerprint) -> Result<MetadataCacheEntry> {
        let stats = TickReader::new(file.clone(), TickFields::core(), self.policy).scan()?;
        Ok(MetadataCacheEntry::from_stats(fingerprint, &stats))
    }

    fn load(&self, file: &DatasetFile) -> Option<MetadataCacheEntry> {
        let path = self.entry_path(file)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read metadata cache entry");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt metadata cache entry");
                None
            }
        }
    }

    fn persist(&self, file: &DatasetFile, entry: &MetadataCacheEntry) -> Result<()> {
        let Some(path) = self.entry_path(file) else {
            debug!(path = %file.path.display(), "file outside dataset root, entry kept in memory");
            return Ok(());
        };
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(parent).map_err(|e| CacheError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let json = serde_json::to_vec_pretty(entry)?;
        let write_err = |source| CacheError::WriteFile {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
