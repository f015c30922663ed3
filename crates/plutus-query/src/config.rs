//! Engine configuration.

use plutus_format::DEFAULT_BATCH_SIZE;
use plutus_types::{CorruptPolicy, DatasetRoot, FormatPreference, SessionPolicy};

/// Configuration of a [`crate::QueryEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Validated dataset root.
    pub root: DatasetRoot,
    /// Handling of malformed rows.
    pub corrupt_policy: CorruptPolicy,
    /// Alignment of intraday bars.
    pub session_policy: SessionPolicy,
    /// Which representation to read when both exist.
    pub format_preference: FormatPreference,
    /// Rows per Parquet record batch.
    pub batch_size: usize,
    /// Whether to prune files with the metadata cache and record new bounds.
    pub use_cache: bool,
}

impl EngineConfig {
    /// Creates a configuration with default policies.
    #[must_use]
    pub fn new(root: DatasetRoot) -> Self {
        Self {
            root,
            corrupt_policy: CorruptPolicy::default(),
            session_policy: SessionPolicy::default(),
            format_preference: FormatPreference::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            use_cache: true,
        }
    }

    /// Sets the corrupt row policy.
    #[must_use]
    pub const fn with_corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.corrupt_policy = policy;
        self
    }

    /// Sets the session policy.
    #[must_use]
    pub const fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Sets the format preference.
    #[must_use]
    pub const fn with_format_preference(mut self, preference: FormatPreference) -> Self {
        self.format_preference = preference;
        self
    }

    /// Sets the Parquet batch size; zero is raised to one.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 { 1 } else { batch_size };
        self
    }

    /// Enables or disables the metadata cache.
    #[must_use]
    pub const fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }
}
