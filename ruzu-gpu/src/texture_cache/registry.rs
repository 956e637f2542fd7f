// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Address indices over registered surfaces.
//!
//! Surfaces are bucketed by 1 MiB pages of cache address so an overlap query
//! only visits the buckets its range touches. The L1 map keys each surface
//! by its exact starting cache address.

use std::collections::HashMap;
use std::sync::Arc;

use ruzu_common::CacheAddr;

use super::surface::SurfaceRef;

pub const REGISTRY_PAGE_BITS: u32 = 20;
pub const REGISTRY_PAGE_SIZE: u64 = 1 << REGISTRY_PAGE_BITS;

fn page_range(cache_addr: CacheAddr, size: u64) -> std::ops::RangeInclusive<u64> {
    let start = cache_addr >> REGISTRY_PAGE_BITS;
    let end = (cache_addr + size.max(1) - 1) >> REGISTRY_PAGE_BITS;
    start..=end
}

pub struct SurfaceRegistry<S> {
    buckets: HashMap<u64, Vec<SurfaceRef<S>>>,
    l1_cache: HashMap<CacheAddr, SurfaceRef<S>>,
}

impl<S> SurfaceRegistry<S> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            l1_cache: HashMap::new(),
        }
    }

    /// Index `surface` under its current cache address range.
    pub fn insert(&mut self, surface: &SurfaceRef<S>) {
        let cache_addr = surface.cache_addr();
        self.l1_cache.insert(cache_addr, Arc::clone(surface));
        for page in page_range(cache_addr, surface.size_in_bytes()) {
            self.buckets
                .entry(page)
                .or_default()
                .push(Arc::clone(surface));
        }
    }

    pub fn remove(&mut self, surface: &SurfaceRef<S>) {
        let cache_addr = surface.cache_addr();
        if self
            .l1_cache
            .get(&cache_addr)
            .is_some_and(|entry| Arc::ptr_eq(entry, surface))
        {
            self.l1_cache.remove(&cache_addr);
        }
        for page in page_range(cache_addr, surface.size_in_bytes()) {
            if let Some(bucket) = self.buckets.get_mut(&page) {
                if let Some(pos) = bucket.iter().position(|s| Arc::ptr_eq(s, surface)) {
                    bucket.remove(pos);
                }
                if bucket.is_empty() {
                    self.buckets.remove(&page);
                }
            }
        }
    }

    /// Surface registered exactly at `cache_addr`.
    pub fn l1_lookup(&self, cache_addr: CacheAddr) -> Option<SurfaceRef<S>> {
        self.l1_cache.get(&cache_addr).cloned()
    }

    /// Every distinct surface intersecting `[cache_addr, cache_addr + size)`,
    /// in bucket order.
    pub fn surfaces_in_region(&self, cache_addr: CacheAddr, size: u64) -> Vec<SurfaceRef<S>> {
        if size == 0 {
            return Vec::new();
        }
        let cache_addr_end = cache_addr + size;
        let mut surfaces = Vec::new();
        for page in page_range(cache_addr, size) {
            let Some(bucket) = self.buckets.get(&page) else {
                continue;
            };
            for surface in bucket {
                if !surface.is_picked() && surface.overlaps(cache_addr, cache_addr_end) {
                    surface.mark_as_picked(true);
                    surfaces.push(Arc::clone(surface));
                }
            }
        }
        for surface in &surfaces {
            surface.mark_as_picked(false);
        }
        surfaces
    }

    /// Scan the bucket holding `cache_addr` for a surface starting there.
    pub fn find_in_bucket(&self, cache_addr: CacheAddr) -> Option<SurfaceRef<S>> {
        self.buckets
            .get(&(cache_addr >> REGISTRY_PAGE_BITS))?
            .iter()
            .find(|surface| surface.cache_addr() == cache_addr)
            .cloned()
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl<S> Default for SurfaceRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture_cache::surface::Surface;
    use crate::texture_cache::surface_params::{SurfaceParams, TextureInfo};

    fn registered_at(cache_addr: CacheAddr, width: u32, height: u32) -> SurfaceRef<()> {
        let params = SurfaceParams::for_texture(&TextureInfo {
            width,
            height,
            ..TextureInfo::default()
        });
        let surface = Arc::new(Surface::new(cache_addr, params, ()));
        surface.set_cache_addr(cache_addr);
        surface
    }

    #[test]
    fn test_spanning_surface_reported_once() {
        let mut registry = SurfaceRegistry::new();
        // 1024 * 1024 * 4 bytes spans four buckets.
        let big = registered_at(0x80_0000, 1024, 1024);
        registry.insert(&big);
        assert_eq!(registry.bucket_count(), 4);

        let found = registry.surfaces_in_region(0x80_0000, 4 * REGISTRY_PAGE_SIZE);
        assert_eq!(found.len(), 1);
        assert!(!big.is_picked());
    }

    #[test]
    fn test_region_query_filters_by_overlap() {
        let mut registry = SurfaceRegistry::new();
        let a = registered_at(0x10_0000, 64, 64);
        let b = registered_at(0x10_8000, 64, 64);
        registry.insert(&a);
        registry.insert(&b);

        let size = a.size_in_bytes();
        let found = registry.surfaces_in_region(0x10_0000, size);
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &a));
        assert_eq!(registry.surfaces_in_region(0x10_0000, 0x9000).len(), 2);
        assert!(registry.surfaces_in_region(0x10_0000, 0).is_empty());
    }

    #[test]
    fn test_remove_is_inverse_of_insert() {
        let mut registry = SurfaceRegistry::new();
        let a = registered_at(0x20_0000, 1024, 512);
        registry.insert(&a);
        assert!(registry.l1_lookup(0x20_0000).is_some());

        registry.remove(&a);
        assert!(registry.l1_lookup(0x20_0000).is_none());
        assert_eq!(registry.bucket_count(), 0);
        assert!(registry.surfaces_in_region(0x20_0000, a.size_in_bytes()).is_empty());
    }

    #[test]
    fn test_remove_keeps_newer_l1_entry() {
        let mut registry = SurfaceRegistry::new();
        let old = registered_at(0x30_0000, 64, 64);
        let new = registered_at(0x30_0000, 128, 128);
        registry.insert(&old);
        registry.insert(&new);
        registry.remove(&old);
        let hit = registry.l1_lookup(0x30_0000).expect("l1 entry");
        assert!(Arc::ptr_eq(&hit, &new));
    }

    #[test]
    fn test_find_in_bucket_needs_exact_start() {
        let mut registry = SurfaceRegistry::new();
        let a = registered_at(0x40_0000, 64, 64);
        registry.insert(&a);
        assert!(registry.find_in_bucket(0x40_0000).is_some());
        assert!(registry.find_in_bucket(0x40_0100).is_none());
    }
}
