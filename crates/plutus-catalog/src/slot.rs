//! Raw and optimized files sharing one declared coverage.

use plutus_types::{Coverage, DatasetFile, FormatPreference};
use std::path::{Path, PathBuf};

/// The files that hold one declared coverage of a ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSlot {
    stem_path: PathBuf,
    coverage: Coverage,
    raw: Option<DatasetFile>,
    optimized: Option<DatasetFile>,
}

impl CoverageSlot {
    pub(crate) const fn new(stem_path: PathBuf, coverage: Coverage) -> Self {
        Self {
            stem_path,
            coverage,
            raw: None,
            optimized: None,
        }
    }

    pub(crate) fn insert(&mut self, file: DatasetFile) {
        match file.format {
            plutus_types::StorageFormat::Raw => self.raw = Some(file),
            plutus_types::StorageFormat::Optimized => self.optimized = Some(file),
        }
    }

    /// Returns the file path without extension shared by both representations.
    #[must_use]
    pub fn stem_path(&self) -> &Path {
        &self.stem_path
    }

    /// Returns the declared coverage.
    #[must_use]
    pub const fn coverage(&self) -> Coverage {
        self.coverage
    }

    /// Returns the raw file, if present.
    #[must_use]
    pub const fn raw(&self) -> Option<&DatasetFile> {
        self.raw.as_ref()
    }

    /// Returns the optimized file, if present.
    #[must_use]
    pub const fn optimized(&self) -> Option<&DatasetFile> {
        self.optimized.as_ref()
    }

    /// Returns true if the optimized file was built from the current raw file,
    /// or stands alone.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        match (&self.raw, &self.optimized) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(raw), Some(opt)) => opt.source_fingerprint == Some(raw.fingerprint),
        }
    }

    /// Picks the file to read under `preference`.
    #[must_use]
    pub fn pick(&self, preference: FormatPreference) -> Option<&DatasetFile> {
        match preference {
            FormatPreference::Auto if self.is_fresh() => self.optimized(),
            FormatPreference::Auto | FormatPreference::Raw => self.raw().or(self.optimized()),
            FormatPreference::Optimized => self.optimized().or(self.raw()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plutus_types::{Fingerprint, StorageFormat, Ticker};

    fn file(format: StorageFormat, len: u64) -> DatasetFile {
        DatasetFile::new(
            PathBuf::from(format!("/data/FPT/2021-01-04.{}", format.extension())),
            Ticker::new("FPT"),
            format,
            Coverage::from_stem("2021-01-04").unwrap(),
            Fingerprint {
                len,
                modified_ns: 1,
            },
        )
    }

    fn slot(raw: Option<DatasetFile>, optimized: Option<DatasetFile>) -> CoverageSlot {
        let mut slot = CoverageSlot::new(
            PathBuf::from("/data/FPT/2021-01-04"),
            Coverage::from_stem("2021-01-04").unwrap(),
        );
        raw.into_iter().chain(optimized).for_each(|f| slot.insert(f));
        slot
    }

    #[test]
    fn test_auto_prefers_fresh_optimized() {
        let raw = file(StorageFormat::Raw, 100);
        let opt = file(StorageFormat::Optimized, 40).with_source_fingerprint(Some(raw.fingerprint));
        let slot = slot(Some(raw), Some(opt));
        assert!(slot.is_fresh());
        assert_eq!(
            slot.pick(FormatPreference::Auto).unwrap().format,
            StorageFormat::Optimized
        );
        assert_eq!(
            slot.pick(FormatPreference::Raw).unwrap().format,
            StorageFormat::Raw
        );
    }

    #[test]
    fn test_auto_falls_back_to_raw_when_stale() {
        let raw = file(StorageFormat::Raw, 100);
        let stale = Fingerprint {
            len: 99,
            modified_ns: 1,
        };
        let opt = file(StorageFormat::Optimized, 40).with_source_fingerprint(Some(stale));
        let slot = slot(Some(raw), Some(opt));
        assert!(!slot.is_fresh());
        assert_eq!(
            slot.pick(FormatPreference::Auto).unwrap().format,
            StorageFormat::Raw
        );
        assert_eq!(
            slot.pick(FormatPreference::Optimized).unwrap().format,
            StorageFormat::Optimized
        );
    }

    #[test]
    fn test_single_representation() {
        let only_opt = slot(None, Some(file(StorageFormat::Optimized, 40)));
        assert_eq!(
            only_opt.pick(FormatPreference::Raw).unwrap().format,
            StorageFormat::Optimized
        );
        let only_raw = slot(Some(file(StorageFormat::Raw, 100)), None);
        assert_eq!(
            only_raw.pick(FormatPreference::Optimized).unwrap().format,
            StorageFormat::Raw
        );
        assert!(!only_raw.is_fresh());
    }
}
