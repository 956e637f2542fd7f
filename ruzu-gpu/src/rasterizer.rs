// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Rasterizer-side hooks used by the GPU caches.
//!
//! The caches report which guest pages currently back a cached GPU resource,
//! so the CPU side can trap writes to exactly those pages.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use ruzu_common::{VAddr, PAGE_SHIFT};

/// Operations the GPU caches require from the rasterizer.
pub trait RasterizerInterface: Send + Sync {
    /// Add `delta` to the cached-resource count of every page overlapping
    /// `[addr, addr + size)`.
    fn update_pages_cached_count(&self, addr: VAddr, size: u64, delta: i32);
}

/// Per-page reference count of cached GPU resources.
#[derive(Default)]
pub struct CachedPageCounter {
    pages: Mutex<BTreeMap<u64, u32>>,
}

impl CachedPageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached resources overlapping the page containing `addr`.
    pub fn count(&self, addr: VAddr) -> u32 {
        self.pages
            .lock()
            .get(&(addr >> PAGE_SHIFT))
            .copied()
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_cached(&self, addr: VAddr) -> bool {
        self.count(addr) > 0
    }

    /// Number of distinct pages with a non-zero count.
    pub fn cached_pages(&self) -> usize {
        self.pages.lock().len()
    }
}

impl RasterizerInterface for CachedPageCounter {
    fn update_pages_cached_count(&self, addr: VAddr, size: u64, delta: i32) {
        if size == 0 || delta == 0 {
            return;
        }
        let first = addr >> PAGE_SHIFT;
        let last = (addr + size - 1) >> PAGE_SHIFT;
        let mut pages = self.pages.lock();
        for page in first..=last {
            let count = pages.entry(page).or_insert(0);
            let updated = i64::from(*count) + i64::from(delta);
            if updated < 0 {
                log::warn!(
                    "rasterizer: cached count underflow on page 0x{:X}",
                    page << PAGE_SHIFT
                );
            }
            *count = updated.max(0) as u32;
            if *count == 0 {
                pages.remove(&page);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_spans_pages() {
        let counter = CachedPageCounter::new();
        counter.update_pages_cached_count(0x1800, 0x1000, 1);
        assert_eq!(counter.count(0x1000), 1);
        assert_eq!(counter.count(0x2FFF), 1);
        assert_eq!(counter.count(0x3000), 0);
        assert_eq!(counter.cached_pages(), 2);
    }

    #[test]
    fn test_overlapping_resources_stack() {
        let counter = CachedPageCounter::new();
        counter.update_pages_cached_count(0x1000, 0x1000, 1);
        counter.update_pages_cached_count(0x1000, 0x2000, 1);
        assert_eq!(counter.count(0x1000), 2);
        assert_eq!(counter.count(0x2000), 1);

        counter.update_pages_cached_count(0x1000, 0x1000, -1);
        assert_eq!(counter.count(0x1000), 1);
        counter.update_pages_cached_count(0x1000, 0x2000, -1);
        assert!(!counter.is_cached(0x1000));
        assert_eq!(counter.cached_pages(), 0);
    }

    #[test]
    fn test_underflow_clamps_to_zero() {
        let counter = CachedPageCounter::new();
        counter.update_pages_cached_count(0x1000, 0x10, -1);
        assert_eq!(counter.count(0x1000), 0);
        assert_eq!(counter.cached_pages(), 0);
    }

    #[test]
    fn test_zero_size_is_noop() {
        let counter = CachedPageCounter::new();
        counter.update_pages_cached_count(0x1000, 0, 1);
        assert_eq!(counter.cached_pages(), 0);
    }
}
