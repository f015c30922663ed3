//! The query engine.

use plutus_aggregate::OhlcAggregator;
use plutus_cache::MetadataCache;
use plutus_catalog::DatasetCatalog;
use plutus_types::{PlutusError, QueryMode, QuerySpec, Result, TickFields};
use std::sync::Arc;
use tracing::debug;

use crate::{BarQuery, EngineConfig, QueryOutput, TickQuery};

/// Executes queries against one dataset root.
///
/// The engine is `Send + Sync`; every query gets its own independent stream.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    config: EngineConfig,
    catalog: Arc<DatasetCatalog>,
    cache: Arc<MetadataCache>,
}

impl QueryEngine {
    /// Creates an engine over the process-wide catalog of the configured root.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = DatasetCatalog::shared(&config.root)?;
        Ok(Self::with_catalog(config, catalog))
    }

    /// Creates an engine over an existing catalog.
    #[must_use]
    pub fn with_catalog(config: EngineConfig, catalog: Arc<DatasetCatalog>) -> Self {
        let cache = Arc::new(MetadataCache::new(&config.root, config.corrupt_policy));
        Self {
            config,
            catalog,
            cache,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &DatasetCatalog {
        &self.catalog
    }

    /// Returns the metadata cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Rebuilds the catalog, picking up files written since it was scanned.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn rescan(&mut self) -> Result<()> {
        self.catalog = self.catalog.rescan()?;
        Ok(())
    }

    /// Runs `spec`.
    ///
    /// The request is validated and the ticker resolved before anything is
    /// read; the returned output reads lazily.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an inconsistent request and
    /// [`PlutusError::NotFound`] for an unknown ticker.
    pub fn query(&self, spec: &QuerySpec) -> Result<QueryOutput> {
        match spec.mode {
            QueryMode::Tick => self.ticks(spec).map(QueryOutput::Ticks),
            QueryMode::Ohlc => self.bars(spec).map(QueryOutput::Bars),
        }
    }

    /// Runs a tick query.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::query`]; OHLC requests are rejected.
    pub fn ticks(&self, spec: &QuerySpec) -> Result<TickQuery> {
        spec.validate()?;
        let fields = spec.fields.tick_fields()?;
        self.open(spec, fields)
    }

    /// Runs an OHLC query.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::query`]; tick requests are rejected.
    pub fn bars(&self, spec: &QuerySpec) -> Result<BarQuery> {
        spec.validate()?;
        spec.fields.bar_fields()?;
        let interval = spec
            .interval
            .ok_or_else(|| PlutusError::validation("ohlc queries require an interval"))?;
        let ticks = self.open(spec, TickFields::core())?;
        let ticker = self
            .catalog
            .ticker(&spec.ticker)
            .cloned()
            .ok_or_else(|| PlutusError::NotFound {
                ticker: spec.ticker.clone(),
            })?;
        let aggregator = OhlcAggregator::new(ticker, interval, self.config.session_policy);
        Ok(BarQuery::new(ticks, aggregator))
    }

    fn open(&self, spec: &QuerySpec, fields: TickFields) -> Result<TickQuery> {
        let files = self
            .catalog
            .resolve(&spec.ticker, &spec.range, self.config.format_preference)?;
        debug!(
            ticker = %spec.ticker,
            mode = %spec.mode,
            range = %spec.range,
            files = files.len(),
            "starting query"
        );
        let cache = self.config.use_cache.then(|| Arc::clone(&self.cache));
        Ok(TickQuery::new(
            files,
            spec.range,
            fields,
            self.config.corrupt_policy,
            self.config.batch_size,
            cache,
        ))
    }
}
