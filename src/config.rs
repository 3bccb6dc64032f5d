// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed configuration constants (spec.md §3) and the runtime configuration
// `mount()` captures (SPEC_FULL.md §4.13).

/// File-table capacity.
pub const MAX_FILES: usize = 128;

/// Descriptor-table capacity (process-local).
pub const MAX_FILEDESCS: usize = 128;

/// Chunk-array capacity.
pub const MAX_CHUNKS: usize = 256;

/// log2(CHUNK_SIZE); 1 MiB chunks by default.
pub const CHUNK_BITS: u32 = 20;

/// Unit of storage allocation, in bytes.
pub const CHUNK_SIZE: usize = 1 << CHUNK_BITS;

/// Mask isolating the in-chunk offset of a byte address.
pub const CHUNK_MASK: usize = CHUNK_SIZE - 1;

/// Maximum bytes (including the NUL terminator) of a stored path.
pub const MAX_FILENAME: usize = 256;

/// Upper bound on a single file's chunk-index list. Sized so that one file
/// may claim the entire arena.
pub const MAX_CHUNKS_PER_FILE: usize = MAX_CHUNKS;

/// Floor applied to a queried `RLIMIT_NOFILE`, in case the host reports a
/// value too small to safely bias descriptors away from real ones.
pub const FD_BIAS_MIN: u64 = 1024;

/// Default mount prefix, matching the reference implementation.
pub const DEFAULT_PREFIX: &str = "/tmp";

/// Runtime configuration captured by `mount()`.
///
/// Distinct from the `const` capacity constants above: those are compiled
/// in (the superblock layout has no header or version field, per `spec.md`
/// §6), while this struct holds the few things a host legitimately chooses
/// at mount time.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path prefix this store shadows.
    pub prefix: String,
    /// Rank used to key the shared-memory segment in multi-process setups.
    pub rank: i32,
    bookkeeping_disabled: bool,
    timing_disabled: bool,
}

impl StoreConfig {
    /// Build a configuration for `mount(prefix, rank)`, reading the
    /// bookkeeping-collector environment variables the surrounding job
    /// infrastructure uses (opaque to the core; see `spec.md` §1/§6).
    pub fn new(prefix: impl Into<String>, rank: i32) -> Self {
        Self {
            prefix: prefix.into(),
            rank,
            bookkeeping_disabled: env_flag("SCRFS_DISABLE"),
            timing_disabled: env_flag("SCRFS_DISABLE_TIMING"),
        }
    }

    /// Shared-memory segment name for this config's rank.
    pub fn segment_name(&self) -> String {
        format!("scrfs_superblock_{}", self.rank)
    }

    /// Whether `SCRFS_DISABLE` asked the surrounding bookkeeping collector
    /// to stay out of the way. The core does not act on this itself.
    pub fn bookkeeping_disabled(&self) -> bool {
        self.bookkeeping_disabled
    }

    /// Whether `SCRFS_DISABLE_TIMING` asked the bookkeeping collector to
    /// skip timing instrumentation.
    pub fn timing_disabled(&self) -> bool {
        self.timing_disabled
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, 0)
    }
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => v != "0" && !v.is_empty(),
        Err(_) => false,
    }
}
