//! Built-in configuration defaults.

/// Bolt endpoint host.
pub const DEFAULT_GRAPH_HOST: &str = "127.0.0.1";

/// Bolt endpoint port.
pub const DEFAULT_GRAPH_PORT: u16 = 7687;

/// Rows per typed write batch.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Files larger than this are skipped outright.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Files at or above this size are read through a memory map.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Soft per-file parse timeout.
pub const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 60;

/// Per-batch graph client timeout.
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 30;

/// Write retries on transient transport errors.
pub const DEFAULT_WRITE_RETRIES: u32 = 5;

/// Base backoff before the first retry, in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 50;

/// Include-closure depth for macro expansion (0 = translation unit only).
pub const DEFAULT_MACRO_EXPANSION_DEPTH: u32 = 3;

/// Fraction of CPU cores used when `workers` is left at auto.
pub const DEFAULT_WORKER_FRACTION: f64 = 0.8;

/// Directories never descended into, regardless of ignore files.
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "venv",
    ".venv",
    "__pycache__",
    "node_modules",
    "target",
    "build",
    "dist",
    ".eggs",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".claude",
];
