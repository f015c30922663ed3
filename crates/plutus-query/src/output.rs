//! Lazy query results.

use plutus_aggregate::{Bar, OhlcAggregator};
use plutus_cache::MetadataCache;
use plutus_format::{ReadStats, TickReader, TickStream};
use plutus_types::{CorruptPolicy, DatasetFile, PlutusError, Result, Tick, TickFields, TimeRange};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::RangeFilter;

/// Counters for one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Files whose declared coverage overlaps the range.
    pub files_considered: u64,
    /// Files skipped on cached bounds.
    pub files_pruned: u64,
    /// Files opened.
    pub files_read: u64,
    /// Valid rows read from opened files.
    pub rows_read: u64,
    /// Malformed rows skipped.
    pub rows_skipped: u64,
    /// Ticks inside the range handed to the caller or the aggregator.
    pub rows_emitted: u64,
    /// Bars emitted.
    pub bars_emitted: u64,
    /// Files with a current cache entry.
    pub cache_hits: u64,
    /// Files without a current cache entry.
    pub cache_misses: u64,
}

impl QueryStats {
    fn add_read(&mut self, stats: &ReadStats) {
        self.rows_read += stats.rows_read;
        self.rows_skipped += stats.rows_skipped;
    }
}

impl std::fmt::Display for QueryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "files {}/{} read ({} pruned), rows {} read, {} skipped, {} emitted, cache {} hits / {} misses",
            self.files_read,
            self.files_considered,
            self.files_pruned,
            self.rows_read,
            self.rows_skipped,
            self.rows_emitted,
            self.cache_hits,
            self.cache_misses
        )
    }
}

/// The file currently being read.
#[derive(Debug)]
struct OpenFile {
    file: DatasetFile,
    stream: RangeFilter<TickStream>,
    cache_miss: bool,
}

/// Lazy sequence of ticks in a query range, across files in coverage order.
///
/// At most one file is open at a time. Dropping the query releases it.
#[derive(Debug)]
pub struct TickQuery {
    pending: VecDeque<DatasetFile>,
    range: TimeRange,
    fields: TickFields,
    policy: CorruptPolicy,
    batch_size: usize,
    cache: Option<Arc<MetadataCache>>,
    current: Option<OpenFile>,
    stats: QueryStats,
    done: bool,
}

impl TickQuery {
    pub(crate) fn new(
        files: Vec<DatasetFile>,
        range: TimeRange,
        fields: TickFields,
        policy: CorruptPolicy,
        batch_size: usize,
        cache: Option<Arc<MetadataCache>>,
    ) -> Self {
        let stats = QueryStats {
            files_considered: files.len() as u64,
            ..QueryStats::default()
        };
        Self {
            pending: files.into(),
            range,
            fields,
            policy,
            batch_size,
            cache,
            current: None,
            stats,
            done: false,
        }
    }

    /// Returns the counters so far, including the file currently open.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        let mut stats = self.stats;
        if let Some(open) = &self.current {
            stats.add_read(&open.stream.get_ref().stats());
        }
        stats
    }

    /// Releases any open file and returns the final counters.
    #[must_use]
    pub fn close(self) -> QueryStats {
        self.stats()
    }

    /// Returns the range being read.
    #[must_use]
    pub const fn range(&self) -> &TimeRange {
        &self.range
    }

    /// Opens the next file that may hold ticks in range.
    fn open_next(&mut self) -> Option<Result<()>> {
        while let Some(file) = self.pending.pop_front() {
            let mut cache_miss = false;
            if let Some(cache) = &self.cache {
                match cache.lookup(&file) {
                    Some(entry) => {
                        self.stats.cache_hits += 1;
                        if !entry.may_overlap(&self.range) {
                            debug!(
                                path = %file.path.display(),
                                rows = entry.row_count,
                                "pruned file on cached bounds"
                            );
                            self.stats.files_pruned += 1;
                            continue;
                        }
                    }
                    None => {
                        self.stats.cache_misses += 1;
                        cache_miss = true;
                    }
                }
            }

            let reader = TickReader::new(file.clone(), self.fields, self.policy)
                .with_batch_size(self.batch_size);
            return Some(match reader.open() {
                Ok(stream) => {
                    self.stats.files_read += 1;
                    self.current = Some(OpenFile {
                        file,
                        stream: RangeFilter::new(stream, self.range),
                        cache_miss,
                    });
                    Ok(())
                }
                Err(e) => {
                    self.forget_bounds(&file, &e);
                    Err(e)
                }
            });
        }
        None
    }

    /// Closes the current file, recording its bounds on a cache miss.
    fn finish_current(&mut self) {
        let Some(open) = self.current.take() else {
            return;
        };
        let stats = open.stream.into_inner().close();
        self.stats.add_read(&stats);

        if open.cache_miss
            && let Some(cache) = &self.cache
            && let Err(e) = cache.record(&open.file, &stats)
        {
            warn!(path = %open.file.path.display(), error = %e, "cannot record file bounds");
        }
    }

    /// Drops cached bounds of a file that failed as a whole.
    fn forget_bounds(&self, file: &DatasetFile, err: &PlutusError) {
        if err.is_recoverable() {
            return;
        }
        if let Some(cache) = &self.cache
            && let Err(e) = cache.invalidate(file)
        {
            warn!(path = %file.path.display(), error = %e, "cannot drop file bounds");
        }
    }

    fn fail(&mut self, err: PlutusError) -> Option<Result<Tick>> {
        self.done = true;
        if let Some(open) = self.current.take() {
            self.forget_bounds(&open.file, &err);
            self.stats.add_read(&open.stream.into_inner().close());
        }
        self.pending.clear();
        Some(Err(err))
    }
}

impl Iterator for TickQuery {
    type Item = Result<Tick>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(open) = &mut self.current {
                match open.stream.next() {
                    Some(Ok(tick)) => {
                        self.stats.rows_emitted += 1;
                        return Some(Ok(tick));
                    }
                    Some(Err(e)) => return self.fail(e),
                    None => {
                        self.finish_current();
                        continue;
                    }
                }
            }
            match self.open_next() {
                Some(Ok(())) => {}
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Lazy sequence of bars folded from a [`TickQuery`].
#[derive(Debug)]
pub struct BarQuery {
    ticks: TickQuery,
    aggregator: Option<OhlcAggregator>,
    bars_emitted: u64,
}

impl BarQuery {
    pub(crate) const fn new(ticks: TickQuery, aggregator: OhlcAggregator) -> Self {
        Self {
            ticks,
            aggregator: Some(aggregator),
            bars_emitted: 0,
        }
    }

    /// Returns the counters so far.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            bars_emitted: self.bars_emitted,
            ..self.ticks.stats()
        }
    }

    /// Releases any open file and returns the final counters.
    #[must_use]
    pub fn close(self) -> QueryStats {
        self.stats()
    }

    fn emit(&mut self, bar: Bar) -> Option<Result<Bar>> {
        self.bars_emitted += 1;
        Some(Ok(bar))
    }
}

impl Iterator for BarQuery {
    type Item = Result<Bar>;

    fn next(&mut self) -> Option<Self::Item> {
        let aggregator = self.aggregator.as_mut()?;
        loop {
            match self.ticks.next() {
                Some(Ok(tick)) => match aggregator.push(&tick) {
                    Ok(Some(bar)) => return self.emit(bar),
                    Ok(None) => {}
                    Err(e) => {
                        self.aggregator = None;
                        return Some(Err(e));
                    }
                },
                Some(Err(e)) => {
                    self.aggregator = None;
                    return Some(Err(e));
                }
                None => {
                    let bar = self.aggregator.take()?.finish()?;
                    return self.emit(bar);
                }
            }
        }
    }
}

/// Result of a query.
#[derive(Debug)]
pub enum QueryOutput {
    /// Raw ticks.
    Ticks(TickQuery),
    /// OHLC bars.
    Bars(BarQuery),
}

impl QueryOutput {
    /// Returns the counters so far.
    #[must_use]
    pub fn stats(&self) -> QueryStats {
        match self {
            Self::Ticks(q) => q.stats(),
            Self::Bars(q) => q.stats(),
        }
    }

    /// Returns the tick stream, if this is a tick query.
    #[must_use]
    pub fn into_ticks(self) -> Option<TickQuery> {
        match self {
            Self::Ticks(q) => Some(q),
            Self::Bars(_) => None,
        }
    }

    /// Returns the bar stream, if this is an OHLC query.
    #[must_use]
    pub fn into_bars(self) -> Option<BarQuery> {
        match self {
            Self::Bars(q) => Some(q),
            Self::Ticks(_) => None,
        }
    }
}
