//! Dataset roots and the files discovered beneath them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::{Coverage, PlutusError, Ticker};

/// Directory, relative to the dataset root, holding plutus bookkeeping.
pub const STATE_DIR: &str = ".plutus";

/// Storage representation of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Row-oriented CSV as exported by the data vendor.
    Raw,
    /// Columnar Parquet produced by the optimizer.
    Optimized,
}

impl StorageFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "csv",
            Self::Optimized => "parquet",
        }
    }

    /// Detects the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Raw),
            "parquet" => Some(Self::Optimized),
            _ => None,
        }
    }

    /// Returns the format as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Optimized => "optimized",
        }
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and modification time of a file, used to detect changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File length in bytes.
    pub len: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: i128,
}

impl Fingerprint {
    /// Reads the fingerprint of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file metadata cannot be read.
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let modified_ns = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as i128);
        Ok(Self {
            len: meta.len(),
            modified_ns,
        })
    }

    /// Encodes the fingerprint as `len:modified_ns`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.len, self.modified_ns)
    }

    /// Decodes a fingerprint produced by [`Fingerprint::encode`].
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        let (len, modified) = s.split_once(':')?;
        Some(Self {
            len: len.parse().ok()?,
            modified_ns: modified.parse().ok()?,
        })
    }
}

/// A single data file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFile {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Ticker the file belongs to.
    pub ticker: Ticker,
    /// Storage representation.
    pub format: StorageFormat,
    /// Dates the file declares to cover.
    pub coverage: Coverage,
    /// Row count, when known.
    pub row_count: Option<u64>,
    /// Fingerprint at scan time.
    pub fingerprint: Fingerprint,
    /// For optimized files, the fingerprint of the raw file they were built from.
    pub source_fingerprint: Option<Fingerprint>,
}

impl DatasetFile {
    /// Creates a dataset file record.
    #[must_use]
    pub const fn new(
        path: PathBuf,
        ticker: Ticker,
        format: StorageFormat,
        coverage: Coverage,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            path,
            ticker,
            format,
            coverage,
            row_count: None,
            fingerprint,
            source_fingerprint: None,
        }
    }

    /// Sets the source fingerprint.
    #[must_use]
    pub const fn with_source_fingerprint(mut self, source: Option<Fingerprint>) -> Self {
        self.source_fingerprint = source;
        self
    }

    /// Replaces the fingerprint with a fresher one.
    #[must_use]
    pub const fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Sets the row count.
    #[must_use]
    pub const fn with_row_count(mut self, rows: Option<u64>) -> Self {
        self.row_count = rows;
        self
    }

    /// Returns the path of the optimized counterpart of this file.
    #[must_use]
    pub fn optimized_path(&self) -> PathBuf {
        self.path.with_extension(StorageFormat::Optimized.extension())
    }
}

/// A validated dataset root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRoot(PathBuf);

impl DatasetRoot {
    /// Validates `path` as a dataset root.
    ///
    /// The path must be absolute, an existing directory, and contain at least
    /// one ticker directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first failed check.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PlutusError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(PlutusError::Configuration(format!(
                "dataset root '{}' is not an absolute path",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(PlutusError::Configuration(format!(
                "dataset root '{}' does not exist",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(PlutusError::Configuration(format!(
                "dataset root '{}' is not a directory",
                path.display()
            )));
        }

        let entries = std::fs::read_dir(&path).map_err(|e| {
            PlutusError::Configuration(format!(
                "dataset root '{}' cannot be read: {e}",
                path.display()
            ))
        })?;
        let has_ticker_dir = entries.filter_map(|e| e.ok()).any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            entry.path().is_dir() && !name.starts_with('.') && Ticker::is_valid_symbol(&name)
        });
        if !has_ticker_dir {
            return Err(PlutusError::Configuration(format!(
                "dataset root '{}' contains no ticker directories",
                path.display()
            )));
        }

        Ok(Self(path))
    }

    /// Returns the root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory holding persisted metadata cache entries.
    #[must_use]
    pub fn meta_dir(&self) -> PathBuf {
        self.0.join(STATE_DIR).join("meta")
    }

    /// Directory holding optimizer run checkpoints.
    #[must_use]
    pub fn runs_dir(&self) -> PathBuf {
        self.0.join(STATE_DIR).join("runs")
    }
}

impl AsRef<Path> for DatasetRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for DatasetRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_format_extension() {
        assert_eq!(StorageFormat::from_extension("CSV"), Some(StorageFormat::Raw));
        assert_eq!(
            StorageFormat::from_extension("parquet"),
            Some(StorageFormat::Optimized)
        );
        assert_eq!(StorageFormat::from_extension("json"), None);
    }

    #[test]
    fn test_fingerprint_encode_decode() {
        let fp = Fingerprint {
            len: 1024,
            modified_ns: 1_609_459_200_000_000_000,
        };
        assert_eq!(Fingerprint::decode(&fp.encode()), Some(fp));
        assert_eq!(Fingerprint::decode("garbage"), None);
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "abc").unwrap();
        let first = Fingerprint::of(&path).unwrap();
        std::fs::write(&path, "abcdef").unwrap();
        let second = Fingerprint::of(&path).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_dataset_root_validation() {
        assert!(matches!(
            DatasetRoot::new("relative/path"),
            Err(PlutusError::Configuration(_))
        ));

        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DatasetRoot::new(dir.path().join("missing")),
            Err(PlutusError::Configuration(_))
        ));
        assert!(matches!(
            DatasetRoot::new(dir.path()),
            Err(PlutusError::Configuration(_))
        ));

        std::fs::create_dir(dir.path().join(".plutus")).unwrap();
        assert!(DatasetRoot::new(dir.path()).is_err());

        std::fs::create_dir(dir.path().join("FPT")).unwrap();
        let root = DatasetRoot::new(dir.path()).unwrap();
        assert_eq!(root.meta_dir(), dir.path().join(".plutus").join("meta"));
    }

    #[test]
    fn test_dataset_root_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.csv");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            DatasetRoot::new(file),
            Err(PlutusError::Configuration(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_dataset_root_is_configuration_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("FPT")).unwrap();
        let locked = std::fs::Permissions::from_mode(0o000);
        std::fs::set_permissions(dir.path(), locked).unwrap();

        // Privileged users read through the mode bits.
        let readable = std::fs::read_dir(dir.path()).is_ok();
        let result = DatasetRoot::new(dir.path());
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        if !readable {
            assert!(matches!(result, Err(PlutusError::Configuration(_))));
        }
    }
}
