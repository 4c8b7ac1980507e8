//! Default constants for topn-extract configuration.
//!
//! All magic numbers are centralized here with documentation.

// =============================================================================
// Selection Defaults
// =============================================================================

/// Default number of items kept per source (the `N` of top-N)
pub const DEFAULT_TOP_N: usize = 100;

/// Default output base path; round `i` is written to `<base><i>`
pub const DEFAULT_OUTPUT_BASE: &str = "TestOutput";

// =============================================================================
// Execution Defaults
// =============================================================================

/// Default number of partitions a single input file is split into.
/// Uses the number of CPU cores for local-selection parallelism.
pub fn default_partition_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(8)
}

/// Bound of the shuffle channel feeding the merge stage.
/// Backpressures the shuffle when the merge falls behind.
pub const DEFAULT_MERGE_QUEUE_CAPACITY: usize = 10_000;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "TOPN_";
