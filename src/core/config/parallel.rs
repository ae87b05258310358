//! Shared parallel processing configuration.

use serde::{Deserialize, Serialize};

/// Configuration for parallel per-cell recognition.
///
/// Recognition calls for different grid cells are independent of each other
/// and may run concurrently; the final grid is always reassembled in
/// row-major order, so results are deterministic regardless of completion
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of worker threads. If None, rayon's default pool size
    /// is used.
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Cell count at or below which recognition runs sequentially
    /// (default: 4). Parallel dispatch is not worth the coordination cost for
    /// tiny tables.
    #[serde(default = "ParallelPolicy::default_cell_threshold")]
    pub cell_threshold: usize,
}

impl ParallelPolicy {
    /// Creates a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of worker threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Sets the sequential-fallback cell threshold.
    pub fn with_cell_threshold(mut self, threshold: usize) -> Self {
        self.cell_threshold = threshold;
        self
    }

    /// Installs the global rayon thread pool with the configured size.
    ///
    /// Call once at application startup, before any pipeline run. Does
    /// nothing when `max_threads` is None.
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        if let Some(num_threads) = self.max_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn default_cell_threshold() -> usize {
        4
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            cell_threshold: Self::default_cell_threshold(),
        }
    }
}
