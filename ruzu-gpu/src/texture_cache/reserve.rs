// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pool of evicted surfaces, keyed by shape, reused instead of allocating.

use std::collections::HashMap;
use std::sync::Arc;

use super::surface::SurfaceRef;
use super::surface_params::SurfaceParams;

pub struct SurfaceReserve<S> {
    reserve: HashMap<SurfaceParams, Vec<SurfaceRef<S>>>,
}

impl<S> SurfaceReserve<S> {
    pub fn new() -> Self {
        Self {
            reserve: HashMap::new(),
        }
    }

    pub fn reserve(&mut self, params: &SurfaceParams, surface: &SurfaceRef<S>) {
        let entries = self.reserve.entry(*params).or_default();
        if !entries.iter().any(|s| Arc::ptr_eq(s, surface)) {
            entries.push(Arc::clone(surface));
        }
    }

    /// First surface reserved under `params` that is not registered again.
    pub fn try_get(&self, params: &SurfaceParams) -> Option<SurfaceRef<S>> {
        self.reserve
            .get(params)?
            .iter()
            .find(|surface| !surface.is_registered())
            .cloned()
    }

    /// Number of surfaces held, registered or not.
    pub fn len(&self) -> usize {
        self.reserve.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for SurfaceReserve<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture_cache::surface::Surface;
    use crate::texture_cache::surface_params::TextureInfo;

    fn params(width: u32) -> SurfaceParams {
        SurfaceParams::for_texture(&TextureInfo {
            width,
            height: 64,
            ..TextureInfo::default()
        })
    }

    #[test]
    fn test_skips_registered_entries() {
        let mut reserve = SurfaceReserve::new();
        let p = params(64);
        let a = Arc::new(Surface::new(0x1000, p, ()));
        let b = Arc::new(Surface::new(0x2000, p, ()));
        reserve.reserve(&p, &a);
        reserve.reserve(&p, &b);

        a.mark_as_registered(true);
        let got = reserve.try_get(&p).expect("reserved surface");
        assert!(Arc::ptr_eq(&got, &b));

        b.mark_as_registered(true);
        assert!(reserve.try_get(&p).is_none());
    }

    #[test]
    fn test_keyed_by_shape() {
        let mut reserve = SurfaceReserve::new();
        let p = params(64);
        let a = Arc::new(Surface::new(0x1000, p, ()));
        reserve.reserve(&p, &a);
        assert!(reserve.try_get(&params(128)).is_none());
        assert!(reserve.try_get(&p).is_some());
    }

    #[test]
    fn test_reserving_twice_keeps_one_entry() {
        let mut reserve = SurfaceReserve::new();
        let p = params(64);
        let a = Arc::new(Surface::new(0x1000, p, ()));
        reserve.reserve(&p, &a);
        reserve.reserve(&p, &a);
        assert_eq!(reserve.len(), 1);
    }
}
