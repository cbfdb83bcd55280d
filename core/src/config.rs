//! Defaults shared by the command-line front ends.

/// Worker threads used when threading is requested without a count.
pub const DEFAULT_THREADS: usize = 5;

/// Maximum number of pages a crawl may admit.
pub const DEFAULT_CRAWL_LIMIT: usize = 50;

pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_INDEX_PATH: &str = "index.json";
pub const DEFAULT_COUNTS_PATH: &str = "counts.json";
pub const DEFAULT_RESULTS_PATH: &str = "results.json";
