//! Dataset discovery and resolution.

use parking_lot::Mutex;
use plutus_format::read_footer;
use plutus_types::{
    Coverage, DatasetFile, DatasetRoot, Fingerprint, FormatPreference, PlutusError, Result,
    StorageFormat, Ticker, TimeRange,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::CoverageSlot;

/// Catalogs shared per canonical root.
static SHARED: OnceLock<Mutex<HashMap<PathBuf, Arc<DatasetCatalog>>>> = OnceLock::new();

/// Index of every dataset file under a root, grouped by ticker.
#[derive(Debug)]
pub struct DatasetCatalog {
    root: DatasetRoot,
    tickers: BTreeMap<Ticker, Vec<CoverageSlot>>,
}

impl DatasetCatalog {
    /// Scans `root` and builds a catalog.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a ticker directory cannot be listed.
    pub fn scan(root: &DatasetRoot) -> Result<Self> {
        let mut tickers = BTreeMap::new();

        for entry in std::fs::read_dir(root.path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&name) || !entry.file_type()?.is_dir() || !Ticker::is_valid_symbol(&name)
            {
                continue;
            }

            let ticker = Ticker::new(&name);
            let mut slots: BTreeMap<PathBuf, CoverageSlot> = BTreeMap::new();
            collect_files(&entry.path(), &ticker, &mut slots)?;

            let mut slots: Vec<CoverageSlot> = slots.into_values().collect();
            slots.sort_by(|a, b| {
                a.coverage()
                    .cmp(&b.coverage())
                    .then_with(|| a.stem_path().cmp(b.stem_path()))
            });
            debug!(ticker = %ticker, slots = slots.len(), "catalogued ticker");
            tickers.insert(ticker, slots);
        }

        if tickers.is_empty() {
            return Err(PlutusError::Configuration(format!(
                "no ticker directories under '{root}'"
            )));
        }

        Ok(Self {
            root: root.clone(),
            tickers,
        })
    }

    /// Returns the process-wide catalog for `root`, scanning it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the first scan fails.
    pub fn shared(root: &DatasetRoot) -> Result<Arc<Self>> {
        let key = std::fs::canonicalize(root.path())?;
        let registry = SHARED.get_or_init(|| Mutex::new(HashMap::new()));
        let mut registry = registry.lock();
        if let Some(catalog) = registry.get(&key) {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(Self::scan(root)?);
        registry.insert(key, Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Rebuilds the catalog from disk and replaces the shared instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn rescan(&self) -> Result<Arc<Self>> {
        let catalog = Arc::new(Self::scan(&self.root)?);
        let key = std::fs::canonicalize(self.root.path())?;
        if let Some(registry) = SHARED.get() {
            registry.lock().insert(key, Arc::clone(&catalog));
        }
        Ok(catalog)
    }

    /// Returns the dataset root.
    #[must_use]
    pub const fn root(&self) -> &DatasetRoot {
        &self.root
    }

    /// Returns all known tickers in sorted order.
    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.tickers.keys()
    }

    /// Returns the number of known tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// Returns true if the catalog has no tickers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Looks up a ticker (case-insensitive).
    #[must_use]
    pub fn ticker(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.get_key_value(&Ticker::new(symbol)).map(|(k, _)| k)
    }

    /// Searches tickers containing `pattern` (case-insensitive).
    pub fn search(&self, pattern: &str) -> Vec<&Ticker> {
        let pattern = pattern.to_uppercase();
        self.tickers
            .keys()
            .filter(|t| t.as_str().contains(&pattern))
            .collect()
    }

    /// Returns the coverage slots of a ticker in ascending coverage order.
    ///
    /// # Errors
    ///
    /// Returns [`PlutusError::NotFound`] for an unknown ticker.
    pub fn slots(&self, symbol: &str) -> Result<&[CoverageSlot]> {
        self.tickers
            .get(&Ticker::new(symbol))
            .map(Vec::as_slice)
            .ok_or_else(|| PlutusError::NotFound {
                ticker: symbol.to_string(),
            })
    }

    /// Returns every file of a ticker, raw and optimized.
    ///
    /// # Errors
    ///
    /// Returns [`PlutusError::NotFound`] for an unknown ticker.
    pub fn files(&self, symbol: &str) -> Result<Vec<&DatasetFile>> {
        Ok(self
            .slots(symbol)?
            .iter()
            .flat_map(|s| s.raw().into_iter().chain(s.optimized()))
            .collect())
    }

    /// Returns every file in the catalog.
    pub fn all_files(&self) -> impl Iterator<Item = &DatasetFile> {
        self.tickers
            .values()
            .flatten()
            .flat_map(|s| s.raw().into_iter().chain(s.optimized()))
    }

    /// Returns every raw file in the catalog.
    pub fn raw_files(&self) -> impl Iterator<Item = &DatasetFile> {
        self.tickers.values().flatten().filter_map(CoverageSlot::raw)
    }

    /// Resolves the files whose declared coverage overlaps `range`, in
    /// ascending coverage order, one per slot.
    ///
    /// A known ticker with no overlapping files resolves to an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`PlutusError::NotFound`] for an unknown ticker.
    pub fn resolve(
        &self,
        symbol: &str,
        range: &TimeRange,
        preference: FormatPreference,
    ) -> Result<Vec<DatasetFile>> {
        let files: Vec<DatasetFile> = self
            .slots(symbol)?
            .iter()
            .filter(|slot| slot.coverage().intersects(range))
            .filter_map(|slot| slot.pick(preference))
            .cloned()
            .collect();
        debug!(
            ticker = symbol,
            %range,
            %preference,
            files = files.len(),
            "resolved dataset files"
        );
        Ok(files)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Walks a ticker directory, adding every recognizable data file to `slots`.
fn collect_files(
    dir: &Path,
    ticker: &Ticker,
    slots: &mut BTreeMap<PathBuf, CoverageSlot>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) {
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect_files(&path, ticker, slots)?;
            continue;
        }

        let Some(format) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(StorageFormat::from_extension)
        else {
            continue;
        };
        let Some(coverage) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(Coverage::from_stem)
        else {
            debug!(path = %path.display(), "ignoring file without a date stem");
            continue;
        };

        let Some(file) = describe(path.clone(), ticker, format, coverage) else {
            continue;
        };
        let stem_path = path.with_extension("");
        slots
            .entry(stem_path.clone())
            .or_insert_with(|| CoverageSlot::new(stem_path, coverage))
            .insert(file);
    }
    Ok(())
}

/// Builds the catalog record for one file, reading the footer of optimized files.
fn describe(
    path: PathBuf,
    ticker: &Ticker,
    format: StorageFormat,
    coverage: Coverage,
) -> Option<DatasetFile> {
    let fingerprint = match Fingerprint::of(&path) {
        Ok(fp) => fp,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot stat dataset file");
            return None;
        }
    };
    let file = DatasetFile::new(path, ticker.clone(), format, coverage, fingerprint);

    match format {
        StorageFormat::Raw => Some(file),
        StorageFormat::Optimized => match read_footer(&file.path) {
            Ok(footer) => Some(
                file.with_source_fingerprint(footer.source_fingerprint)
                    .with_row_count(Some(footer.num_rows)),
            ),
            Err(e) => {
                warn!(
                    path = %file.path.display(),
                    error = %e,
                    "ignoring unreadable optimized file"
                );
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HEADER: &str = "datetime,tickersymbol,price,quantity\n";

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, HEADER).unwrap();
    }

    fn fixture() -> (TempDir, DatasetRoot) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "FPT/2021/2021-01-04.csv");
        write(dir.path(), "FPT/2021/2021-01-05.csv");
        write(dir.path(), "FPT/2020-12.csv");
        write(dir.path(), "FPT/notes.csv");
        write(dir.path(), "FPT/.hidden/2021-01-06.csv");
        write(dir.path(), "VIC/2019.csv");
        std::fs::create_dir_all(dir.path().join("HPG")).unwrap();
        std::fs::create_dir_all(dir.path().join(".plutus/meta")).unwrap();
        let root = DatasetRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    fn range(from: (i32, u32, u32), to: (i32, u32, u32)) -> TimeRange {
        TimeRange::days(
            NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_scan_tickers() {
        let (_dir, root) = fixture();
        let catalog = DatasetCatalog::scan(&root).unwrap();
        let tickers: Vec<&str> = catalog.tickers().map(Ticker::as_str).collect();
        assert_eq!(tickers, vec!["FPT", "HPG", "VIC"]);
        assert_eq!(catalog.slots("fpt").unwrap().len(), 3);
        assert!(catalog.slots("HPG").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_orders_by_coverage() {
        let (_dir, root) = fixture();
        let catalog = DatasetCatalog::scan(&root).unwrap();
        let files = catalog
            .resolve("FPT", &range((2020, 12, 31), (2021, 1, 5)), FormatPreference::Auto)
            .unwrap();
        let stems: Vec<String> = files
            .iter()
            .map(|f| f.path.file_stem().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(stems, vec!["2020-12", "2021-01-04"]);
    }

    #[test]
    fn test_resolve_known_ticker_without_overlap_is_empty() {
        let (_dir, root) = fixture();
        let catalog = DatasetCatalog::scan(&root).unwrap();
        let files = catalog
            .resolve("FPT", &range((2021, 2, 1), (2021, 2, 2)), FormatPreference::Auto)
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_resolve_unknown_ticker() {
        let (_dir, root) = fixture();
        let catalog = DatasetCatalog::scan(&root).unwrap();
        let err = catalog
            .resolve("ZZZZ", &range((2021, 1, 1), (2021, 1, 2)), FormatPreference::Auto)
            .unwrap_err();
        assert!(matches!(err, PlutusError::NotFound { ref ticker } if ticker == "ZZZZ"));
    }

    #[test]
    fn test_shared_is_memoized() {
        let (_dir, root) = fixture();
        let a = DatasetCatalog::shared(&root).unwrap();
        let b = DatasetCatalog::shared(&root).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        write(root.path(), "VIC/2020.csv");
        let rescanned = a.rescan().unwrap();
        assert_eq!(rescanned.slots("VIC").unwrap().len(), 2);
        assert!(Arc::ptr_eq(&rescanned, &DatasetCatalog::shared(&root).unwrap()));
    }

    #[test]
    fn test_unreadable_optimized_file_is_ignored() {
        let (dir, root) = fixture();
        std::fs::write(dir.path().join("FPT/2021/2021-01-04.parquet"), "junk").unwrap();
        let catalog = DatasetCatalog::scan(&root).unwrap();
        assert!(catalog.files("FPT").unwrap().iter().all(|f| f.format == StorageFormat::Raw));
    }
}
