//! Persisted Bloom filter, used as a fast negative-check ahead of the exact
//! Redis/Mongo dedup layers. No counterpart in the original Python system
//! (which relies on Redis alone); added per `spec.md` §4.1/§9.
//!
//! Stable binary format via `bincode`; on load failure the filter is
//! rebuilt fresh rather than treated as a fatal error, since downstream
//! layers remain the source of truth.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use growable_bloom_filter::GrowableBloom;
use tracing::{info, warn};

const CAPACITY: usize = 10_000_000;
const FALSE_POSITIVE_RATE: f64 = 1e-4;
/// Persist the filter to disk every this-many insertions.
const FLUSH_EVERY: usize = 1_000;

pub struct BloomStore {
    filter: Mutex<GrowableBloom>,
    path: PathBuf,
    inserts_since_flush: Mutex<usize>,
}

impl BloomStore {
    /// Loads a persisted filter from `path`, or builds a fresh one if the
    /// file is absent or corrupt.
    pub fn load_or_create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let filter = std::fs::read(&path)
            .ok()
            .and_then(|bytes| bincode::deserialize::<GrowableBloom>(&bytes).ok())
            .unwrap_or_else(|| {
                warn!("bloom filter at {:?} missing or corrupt, rebuilding fresh", path);
                GrowableBloom::new(FALSE_POSITIVE_RATE, CAPACITY)
            });

        Self {
            filter: Mutex::new(filter),
            path,
            inserts_since_flush: Mutex::new(0),
        }
    }

    /// Returns `true` if `item` is *possibly* present (may be a false
    /// positive); `false` means definitely new.
    pub fn check(&self, item: &str) -> bool {
        self.filter.lock().unwrap().contains(item)
    }

    /// Inserts `item` and flushes to disk every `FLUSH_EVERY` insertions.
    /// Best-effort: a flush failure is logged, not propagated, per the
    /// dedup failure semantics (bloom is best-effort).
    pub fn insert(&self, item: &str) {
        let mut filter = self.filter.lock().unwrap();
        filter.insert(item);
        drop(filter);

        let mut count = self.inserts_since_flush.lock().unwrap();
        *count += 1;
        if *count >= FLUSH_EVERY {
            *count = 0;
            drop(count);
            if let Err(e) = self.flush() {
                warn!("bloom filter flush failed: {}", e);
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        let filter = self.filter.lock().unwrap();
        let bytes = bincode::serialize(&*filter)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, bytes)?;
        info!("bloom filter persisted to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_check_is_definitive() {
        let filter = GrowableBloom::new(FALSE_POSITIVE_RATE, 1000);
        assert!(!filter.contains("never-inserted"));
    }

    #[test]
    fn load_or_create_falls_back_on_missing_file() {
        let store = BloomStore::load_or_create("/tmp/marketpulse-test-bloom-does-not-exist.bin");
        assert!(!store.check("anything"));
        store.insert("anything");
        assert!(store.check("anything"));
    }
}
