//! Budgeted registry for derived image buffers.
//!
//! Every thumbnail and preview the pipeline retains is registered here. A
//! single lock guards the entry map together with the running byte total, so
//! the pair always mutates atomically; crossing the cleanup threshold evicts
//! the least valuable buffers synchronously inside `register`.

use crate::{BufferCategory, CacheConfig};
use carscan_core::{FrameBuffer, SharedFrameBuffer};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

struct Entry {
    buffer: SharedFrameBuffer,
    category: BufferCategory,
    frame_index: u32,
    last_accessed: Instant,
}

impl Entry {
    fn size(&self) -> usize {
        self.buffer.memory_size()
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    total_bytes: usize,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size());
        Some(entry)
    }
}

/// Snapshot of cache state for monitoring surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_buffers: usize,
    pub total_memory_mb: f64,
    pub max_memory_mb: f64,
    pub thumbnail_count: usize,
    pub preview_count: usize,
    pub original_count: usize,
}

/// Memory-budgeted buffer cache.
///
/// All operations are safe under concurrent use from in-flight frame
/// analyses. No operation panics or surfaces an error for caller-visible
/// control flow — every failure degrades to "no buffer available" plus a
/// log line.
pub struct BufferCache {
    inner: Mutex<Inner>,
    config: CacheConfig,
}

impl BufferCache {
    /// Create a cache with the given budget configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
        }
    }

    /// Create a cache with the default memory budget.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// The active budget configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Register a derived buffer under `key`.
    ///
    /// Invalid buffers and duplicate keys are logged no-ops: a key tracks at
    /// most one buffer. Crossing the cleanup threshold runs a synchronous
    /// cleanup pass before returning.
    pub fn register(
        &self,
        key: impl Into<String>,
        buffer: FrameBuffer,
        category: BufferCategory,
        frame_index: u32,
    ) {
        let key = key.into();
        if !buffer.is_valid() {
            tracing::warn!(key = %key, "ignoring registration of invalid buffer");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&key) {
            tracing::warn!(key = %key, "ignoring duplicate buffer registration");
            return;
        }

        let entry = Entry {
            buffer: Arc::new(buffer),
            category,
            frame_index,
            last_accessed: Instant::now(),
        };
        inner.total_bytes += entry.size();
        inner.entries.insert(key, entry);

        if inner.total_bytes > self.config.cleanup_threshold_bytes {
            self.cleanup_locked(&mut inner);
        }
    }

    /// Remove and release the buffer under `key`.
    ///
    /// Returns whether a buffer was found. Calling twice returns `true`
    /// then `false`; nothing is ever freed twice.
    pub fn unregister(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Look up a live buffer, refreshing its last-accessed time.
    ///
    /// An entry that turns out to be invalid is removed on the way and
    /// reported as absent.
    pub fn get(&self, key: &str) -> Option<SharedFrameBuffer> {
        let mut inner = self.inner.lock();
        let valid = match inner.entries.get_mut(key) {
            None => return None,
            Some(entry) => {
                if entry.buffer.is_valid() {
                    entry.last_accessed = Instant::now();
                    true
                } else {
                    false
                }
            }
        };
        if valid {
            inner.entries.get(key).map(|e| Arc::clone(&e.buffer))
        } else {
            tracing::warn!(key = %key, "removing invalid cache entry");
            inner.remove(key);
            None
        }
    }

    /// Evict least-valuable buffers until usage drops to the retain target.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock();
        self.cleanup_locked(&mut inner);
    }

    /// Evict every buffer of the given category, regardless of pressure.
    pub fn cleanup_category(&self, category: BufferCategory) {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.category == category)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
        tracing::debug!(category = ?category, evicted = keys.len(), "category cleanup");
    }

    /// Evict every buffer tagged with the given frame index.
    pub fn cleanup_frame(&self, frame_index: u32) {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.frame_index == frame_index)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
    }

    /// Evict everything.
    pub fn emergency_cleanup(&self) {
        let mut inner = self.inner.lock();
        let evicted = inner.entries.len();
        inner.entries.clear();
        inner.total_bytes = 0;
        tracing::warn!(evicted, "emergency cleanup released all buffers");
    }

    /// Current usage in bytes.
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    /// Usage above the critical fraction of the budget.
    pub fn is_critical(&self) -> bool {
        let usage = self.total_bytes() as f64;
        usage > self.config.max_bytes as f64 * self.config.critical_fraction
    }

    /// Snapshot for monitoring.
    pub fn stats(&self) -> CacheStats {
        const MB: f64 = 1024.0 * 1024.0;
        let inner = self.inner.lock();
        let count = |cat: BufferCategory| {
            inner
                .entries
                .values()
                .filter(|e| e.category == cat)
                .count()
        };
        CacheStats {
            total_buffers: inner.entries.len(),
            total_memory_mb: inner.total_bytes as f64 / MB,
            max_memory_mb: self.config.max_bytes as f64 / MB,
            thumbnail_count: count(BufferCategory::Thumbnail),
            preview_count: count(BufferCategory::Preview),
            original_count: count(BufferCategory::Original),
        }
    }

    fn cleanup_locked(&self, inner: &mut Inner) {
        let retain_target =
            (self.config.cleanup_threshold_bytes as f64 * self.config.retain_fraction) as usize;
        let target_reduction = inner.total_bytes.saturating_sub(retain_target);
        if target_reduction == 0 {
            return;
        }

        // Evict cheap-to-regenerate categories first; within a category the
        // stalest buffer goes first.
        let mut candidates: Vec<(String, Instant, u8, usize)> = inner
            .entries
            .iter()
            .map(|(k, e)| {
                (
                    k.clone(),
                    e.last_accessed,
                    e.category.eviction_priority(),
                    e.size(),
                )
            })
            .collect();
        candidates.sort_by(|a, b| a.2.cmp(&b.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

        let mut freed = 0usize;
        let mut evicted = 0usize;
        for (key, _, _, size) in candidates {
            if freed >= target_reduction {
                break;
            }
            inner.remove(&key);
            freed += size;
            evicted += 1;
        }

        tracing::debug!(
            evicted,
            freed_bytes = freed,
            remaining_bytes = inner.total_bytes,
            "cleanup pass complete"
        );

        let usage = inner.total_bytes as f64;
        if usage > self.config.max_bytes as f64 * self.config.critical_fraction {
            tracing::warn!(
                used_bytes = inner.total_bytes,
                max_bytes = self.config.max_bytes,
                "memory usage still critical after cleanup"
            );
        }
    }
}
