//! Single-file raw to optimized conversion.

use parking_lot::Mutex;
use parquet::basic::Compression;
use plutus_cache::{MetadataCache, MetadataCacheEntry};
use plutus_format::{
    OPTIMIZED_SCHEMA_VERSION, ParquetOptions, ReadStats, SCHEMA_VERSION_KEY, SOURCE_FINGERPRINT_KEY,
    SOURCE_PATH_KEY, TickParquetWriter, TickReader, read_footer,
};
use plutus_types::{
    CorruptPolicy, DatasetFile, DatasetRoot, Fingerprint, PlutusError, Result, StorageFormat,
    TickFields,
};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Settings for optimization.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Maximum concurrent conversions.
    pub concurrency: usize,
    /// Parquet writer settings.
    pub parquet: ParquetOptions,
    /// Handling of malformed rows in raw files.
    pub corrupt_policy: CorruptPolicy,
    /// Minimum interval between run checkpoints.
    pub checkpoint_interval: Duration,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism().map_or(4, |n| n.get()),
            parquet: ParquetOptions::default(),
            corrupt_policy: CorruptPolicy::default(),
            checkpoint_interval: Duration::from_secs(10),
        }
    }
}

impl OptimizeOptions {
    /// Sets the concurrency; zero is raised to one.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 { 1 } else { concurrency };
        self
    }

    /// Sets the Parquet row group size.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.parquet.row_group_size = size;
        self
    }

    /// Sets the Parquet compression codec.
    #[must_use]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.parquet.compression = compression;
        self
    }

    /// Sets the corrupt row policy.
    #[must_use]
    pub const fn with_corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.corrupt_policy = policy;
        self
    }

    /// Sets the checkpoint interval.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }
}

/// An optimized file and the raw file it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedFile {
    /// The optimized file as it is on disk.
    pub file: DatasetFile,
    /// Raw source path.
    pub source: PathBuf,
    /// Rows in the optimized file.
    pub rows: u64,
    /// Malformed source rows skipped by this conversion.
    pub rows_skipped: u64,
}

/// Result of optimizing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// A new optimized file was written.
    Converted(OptimizedFile),
    /// The existing optimized file was already built from the current raw file.
    Unchanged(OptimizedFile),
}

impl OptimizeOutcome {
    /// Returns the optimized file.
    #[must_use]
    pub const fn file(&self) -> &OptimizedFile {
        match self {
            Self::Converted(f) | Self::Unchanged(f) => f,
        }
    }

    /// Returns true if a new file was written.
    #[must_use]
    pub const fn is_converted(&self) -> bool {
        matches!(self, Self::Converted(_))
    }
}

/// Lock files older than this are left over from a crashed run.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30 * 60);

/// Cross-process lock file, removed on drop.
#[derive(Debug)]
struct LockFile(PathBuf);

impl LockFile {
    fn acquire(target: &Path) -> Result<Self> {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);
        let created = match Self::create(&path) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists && Self::is_stale(&path) => {
                warn!(path = %path.display(), "removing stale lock file");
                std::fs::remove_file(&path)?;
                Self::create(&path)
            }
            other => other,
        };
        match created {
            Ok(()) => Ok(Self(path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(PlutusError::Locked {
                path: target.to_path_buf(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{} {}", std::process::id(), chrono::Utc::now().timestamp())
    }

    fn is_stale(path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > STALE_LOCK_AGE)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Converts raw files into optimized files and keeps the cache current.
#[derive(Debug)]
pub struct FormatOptimizer {
    root: DatasetRoot,
    options: OptimizeOptions,
    cache: Arc<MetadataCache>,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FormatOptimizer {
    /// Creates an optimizer for the dataset at `root`.
    #[must_use]
    pub fn new(root: DatasetRoot, options: OptimizeOptions) -> Self {
        let cache = Arc::new(MetadataCache::new(&root, options.corrupt_policy));
        Self::with_cache(root, options, cache)
    }

    /// Creates an optimizer sharing an existing metadata cache.
    #[must_use]
    pub fn with_cache(
        root: DatasetRoot,
        options: OptimizeOptions,
        cache: Arc<MetadataCache>,
    ) -> Self {
        Self {
            root,
            options,
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &OptimizeOptions {
        &self.options
    }

    /// Returns the metadata cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    fn target_lock(&self, target: &Path) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(target.to_path_buf()).or_default())
    }

    /// Optimizes one raw file.
    ///
    /// The raw file is never modified. On failure no optimized file is left
    /// behind and any existing one is intact.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-raw file, [`PlutusError::Locked`]
    /// if another process is converting the same file, or the first read or
    /// write error of the conversion.
    pub fn optimize(&self, file: &DatasetFile) -> Result<OptimizeOutcome> {
        if file.format != StorageFormat::Raw {
            return Err(PlutusError::validation(format!(
                "'{}' is not a raw file",
                file.path.display()
            )));
        }

        let target = file.optimized_path();
        let lock = self.target_lock(&target);
        let _guard = lock.lock();

        let current = Fingerprint::of(&file.path)?;
        let source = file.clone().with_fingerprint(current);

        if let Some(existing) = self.current_optimized(&source, &target)? {
            if self.cache.lookup(&existing.file).is_none() {
                self.cache.refresh(&existing.file)?;
            }
            debug!(path = %target.display(), "optimized file is current");
            return Ok(OptimizeOutcome::Unchanged(existing));
        }

        let _lock_file = LockFile::acquire(&target)?;
        let (rows, stats) = self.convert(&source, &target)?;
        let rows_skipped = stats.rows_skipped;

        let optimized = self.describe(&target, &source)?.with_row_count(Some(rows));
        self.cache.refresh(&optimized)?;
        if stats.exhausted {
            self.cache
                .put(&source, MetadataCacheEntry::from_stats(current, &stats))?;
        }

        info!(
            source = %file.path.display(),
            target = %target.display(),
            rows,
            skipped = rows_skipped,
            "optimized file"
        );
        Ok(OptimizeOutcome::Converted(OptimizedFile {
            file: optimized,
            source: file.path.clone(),
            rows,
            rows_skipped,
        }))
    }

    /// Returns the existing optimized file if it was built from `source` as
    /// it is now.
    fn current_optimized(
        &self,
        source: &DatasetFile,
        target: &Path,
    ) -> Result<Option<OptimizedFile>> {
        if !target.exists() {
            return Ok(None);
        }
        let footer = match read_footer(target) {
            Ok(footer) => footer,
            Err(e) => {
                debug!(path = %target.display(), error = %e, "existing optimized file unreadable");
                return Ok(None);
            }
        };
        if footer.source_fingerprint != Some(source.fingerprint)
            || footer.schema_version != Some(OPTIMIZED_SCHEMA_VERSION)
        {
            return Ok(None);
        }

        let file = self
            .describe(target, source)?
            .with_row_count(Some(footer.num_rows));
        Ok(Some(OptimizedFile {
            file,
            source: source.path.clone(),
            rows: footer.num_rows,
            rows_skipped: 0,
        }))
    }

    /// Streams `source` into a temporary file and renames it onto `target`.
    fn convert(
        &self,
        source: &DatasetFile,
        target: &Path,
    ) -> Result<(u64, ReadStats)> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;

        let metadata = vec![
            (
                SCHEMA_VERSION_KEY.to_string(),
                OPTIMIZED_SCHEMA_VERSION.to_string(),
            ),
            (
                SOURCE_FINGERPRINT_KEY.to_string(),
                source.fingerprint.encode(),
            ),
            (SOURCE_PATH_KEY.to_string(), self.relative(&source.path)),
        ];

        let reader =
            TickReader::new(source.clone(), TickFields::all(), self.options.corrupt_policy);
        let mut stream = reader.open()?;
        let mut writer =
            TickParquetWriter::new(tmp.as_file_mut(), &self.options.parquet, metadata)?;
        for tick in stream.by_ref() {
            writer.write(tick?)?;
        }
        let stats = stream.close();
        let rows = writer.close()?;

        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| PlutusError::Io(e.error))?;
        Ok((rows, stats))
    }

    /// Builds the catalog record of a freshly written optimized file.
    fn describe(&self, target: &Path, source: &DatasetFile) -> Result<DatasetFile> {
        Ok(DatasetFile::new(
            target.to_path_buf(),
            source.ticker.clone(),
            StorageFormat::Optimized,
            source.coverage,
            Fingerprint::of(target)?,
        )
        .with_source_fingerprint(Some(source.fingerprint)))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.root.path())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}
