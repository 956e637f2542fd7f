// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! A cached host surface and its guest-side bookkeeping.
//!
//! The shape (`SurfaceParams`) and guest layout are fixed at creation. The
//! addresses change when a reserved surface is reused at another location,
//! and the flags change as the cache registers, modifies and flushes it.

use std::sync::Arc;

use parking_lot::Mutex;

use ruzu_common::{CacheAddr, GPUVAddr, VAddr};

use super::copy_params::CopyParams;
use super::format::{PixelFormat, SurfaceTarget};
use super::surface_params::{MatchStructureResult, MatchTopologyResult, SurfaceParams};
use super::view::{View, ViewParams};

pub type SurfaceRef<S> = Arc<Surface<S>>;

#[derive(Debug, Default)]
struct SurfaceState {
    gpu_addr: GPUVAddr,
    cpu_addr: VAddr,
    cache_addr: CacheAddr,
    is_registered: bool,
    is_picked: bool,
    is_modified: bool,
    modification_tick: u64,
    is_render_target: bool,
    is_protected: bool,
    is_continuous: bool,
}

pub struct Surface<S> {
    params: SurfaceParams,
    /// Guest offset of each mip level inside one layer.
    mipmap_offsets: Vec<u64>,
    /// Guest size of each mip level of one layer.
    mipmap_sizes: Vec<u64>,
    layer_size: u64,
    guest_memory_size: u64,
    host_memory_size: u64,
    state: Mutex<SurfaceState>,
    host: S,
}

impl<S> Surface<S> {
    pub fn new(gpu_addr: GPUVAddr, params: SurfaceParams, host: S) -> Self {
        let mut mipmap_offsets = Vec::with_capacity(params.num_levels as usize);
        let mut mipmap_sizes = Vec::with_capacity(params.num_levels as usize);
        let mut offset = 0u64;
        for level in 0..params.num_levels {
            let size = params.inner_mipmap_memory_size(level, false);
            mipmap_offsets.push(offset);
            mipmap_sizes.push(size);
            offset += size;
        }
        Self {
            layer_size: params.layer_size(false),
            guest_memory_size: params.guest_size_in_bytes(),
            host_memory_size: params.host_size_in_bytes(),
            params,
            mipmap_offsets,
            mipmap_sizes,
            state: Mutex::new(SurfaceState {
                gpu_addr,
                ..SurfaceState::default()
            }),
            host,
        }
    }

    pub fn params(&self) -> &SurfaceParams {
        &self.params
    }

    /// Backend handle of the host resource.
    pub fn host(&self) -> &S {
        &self.host
    }

    pub fn format(&self) -> PixelFormat {
        self.params.pixel_format
    }

    pub fn gpu_addr(&self) -> GPUVAddr {
        self.state.lock().gpu_addr
    }

    pub(crate) fn set_gpu_addr(&self, gpu_addr: GPUVAddr) {
        self.state.lock().gpu_addr = gpu_addr;
    }

    pub fn cpu_addr(&self) -> VAddr {
        self.state.lock().cpu_addr
    }

    pub(crate) fn set_cpu_addr(&self, cpu_addr: VAddr) {
        self.state.lock().cpu_addr = cpu_addr;
    }

    pub fn cache_addr(&self) -> CacheAddr {
        self.state.lock().cache_addr
    }

    pub fn cache_addr_end(&self) -> CacheAddr {
        self.cache_addr() + self.guest_memory_size
    }

    pub(crate) fn set_cache_addr(&self, cache_addr: CacheAddr) {
        self.state.lock().cache_addr = cache_addr;
    }

    /// Guest bytes covered by the surface.
    pub fn size_in_bytes(&self) -> u64 {
        self.guest_memory_size
    }

    /// Bytes of the linear host image of the surface.
    pub fn host_size_in_bytes(&self) -> u64 {
        self.host_memory_size
    }

    pub fn layer_size(&self) -> u64 {
        self.layer_size
    }

    pub fn mipmap_size(&self, level: u32) -> u64 {
        self.mipmap_sizes.get(level as usize).copied().unwrap_or(0)
    }

    pub fn mipmap_offset(&self, level: u32) -> u64 {
        self.mipmap_offsets.get(level as usize).copied().unwrap_or(0)
    }

    pub fn is_registered(&self) -> bool {
        self.state.lock().is_registered
    }

    pub(crate) fn mark_as_registered(&self, registered: bool) {
        self.state.lock().is_registered = registered;
    }

    pub fn is_picked(&self) -> bool {
        self.state.lock().is_picked
    }

    pub(crate) fn mark_as_picked(&self, picked: bool) {
        self.state.lock().is_picked = picked;
    }

    pub fn is_modified(&self) -> bool {
        self.state.lock().is_modified
    }

    pub fn modification_tick(&self) -> u64 {
        self.state.lock().modification_tick
    }

    pub fn mark_as_modified(&self, modified: bool, tick: u64) {
        let mut state = self.state.lock();
        state.is_modified = modified;
        state.modification_tick = tick;
    }

    pub fn is_render_target(&self) -> bool {
        self.state.lock().is_render_target
    }

    pub fn is_protected(&self) -> bool {
        self.state.lock().is_protected
    }

    /// Binding a surface as a render target also protects it from
    /// self-eviction while the render target guard is active.
    pub fn mark_as_render_target(&self, is_target: bool) {
        let mut state = self.state.lock();
        state.is_render_target = is_target;
        state.is_protected = is_target;
    }

    pub fn is_continuous(&self) -> bool {
        self.state.lock().is_continuous
    }

    pub(crate) fn mark_as_continuous(&self, continuous: bool) {
        self.state.lock().is_continuous = continuous;
    }

    pub fn match_format(&self, format: PixelFormat) -> bool {
        self.params.pixel_format == format
    }

    pub fn match_target(&self, target: SurfaceTarget) -> bool {
        self.params.target == target
    }

    pub fn matches_topology(&self, rhs: &SurfaceParams) -> MatchTopologyResult {
        self.params.matches_topology(rhs)
    }

    pub fn matches_structure(&self, rhs: &SurfaceParams) -> MatchStructureResult {
        self.params.matches_structure(rhs)
    }

    /// Whether this single-level 2D surface starts where a candidate of the
    /// same kind would.
    pub fn matches_sub_texture(&self, rhs: &SurfaceParams, gpu_addr: GPUVAddr) -> bool {
        (self.gpu_addr(), self.params.target, self.params.num_levels)
            == (gpu_addr, rhs.target, rhs.num_levels)
            && self.params.target == SurfaceTarget::Texture2D
            && self.params.num_levels == 1
    }

    /// Whether the GPU range `[start, end)` lies inside this surface.
    pub fn is_inside(&self, start: GPUVAddr, end: GPUVAddr) -> bool {
        let gpu_addr = self.gpu_addr();
        gpu_addr <= start && end <= gpu_addr + self.guest_memory_size
    }

    /// Whether the cache range `[start, end)` intersects this surface.
    pub fn overlaps(&self, start: CacheAddr, end: CacheAddr) -> bool {
        let cache_addr = self.cache_addr();
        cache_addr < end && cache_addr + self.guest_memory_size > start
    }

    /// Map a GPU address inside the surface to the (layer, level) whose
    /// storage starts exactly there.
    pub fn get_layer_mipmap(&self, candidate_gpu_addr: GPUVAddr) -> Option<(u32, u32)> {
        let gpu_addr = self.gpu_addr();
        if candidate_gpu_addr == gpu_addr {
            return Some((0, 0));
        }
        if candidate_gpu_addr < gpu_addr || self.layer_size == 0 {
            return None;
        }
        let relative = candidate_gpu_addr - gpu_addr;
        let layer = relative / self.layer_size;
        if layer >= u64::from(self.params.num_layers()) {
            return None;
        }
        let mipmap_address = relative - layer * self.layer_size;
        let level = self.mipmap_offsets.binary_search(&mipmap_address).ok()?;
        Some((layer as u32, level as u32))
    }

    /// Split this surface into copies onto a surface of shape `in_params`,
    /// one per level (and per layer when layered).
    pub fn break_down(&self, in_params: &SurfaceParams) -> Vec<CopyParams> {
        let params = &self.params;
        let levels = params.num_levels.min(in_params.num_levels);
        let mut result = Vec::new();
        if params.is_layered {
            let layers = params.depth.min(in_params.num_layers());
            result.reserve((layers * levels) as usize);
            for layer in 0..layers {
                for level in 0..levels {
                    let width = SurfaceParams::intersect_width(params, in_params, level, level);
                    let height = SurfaceParams::intersect_height(params, in_params, level, level);
                    result.push(CopyParams::layer_level(width, height, layer, level));
                }
            }
        } else {
            result.reserve(levels as usize);
            for level in 0..levels {
                let width = SurfaceParams::intersect_width(params, in_params, level, level);
                let height = SurfaceParams::intersect_height(params, in_params, level, level);
                let depth = params.mip_depth(level).min(in_params.mip_depth(level));
                result.push(CopyParams::level(width, height, depth, level));
            }
        }
        result
    }

    pub fn main_view(self: &Arc<Self>) -> View<S> {
        let params = &self.params;
        View::new(
            self,
            ViewParams::new(params.target, 0, params.num_layers(), 0, params.num_levels),
        )
    }

    /// A view of the whole surface under another target.
    pub fn emplace_overview(self: &Arc<Self>, overview_params: &SurfaceParams) -> View<S> {
        let params = &self.params;
        let num_layers = if params.is_layered && !overview_params.is_layered {
            1
        } else {
            params.depth
        };
        View::new(
            self,
            ViewParams::new(overview_params.target, 0, num_layers, 0, params.num_levels),
        )
    }

    /// Carve a single layer/level view for a candidate starting at
    /// `view_addr` inside this surface.
    pub fn emplace_view(
        self: &Arc<Self>,
        view_params: &SurfaceParams,
        view_addr: GPUVAddr,
        candidate_size: u64,
    ) -> Option<View<S>> {
        let params = &self.params;
        if params.target == SurfaceTarget::Texture3D
            || (params.num_levels == 1 && !params.is_layered)
            || view_params.target == SurfaceTarget::Texture3D
        {
            return None;
        }
        let (layer, level) = self.get_layer_mipmap(view_addr)?;
        if self.mipmap_size(level) != candidate_size {
            return None;
        }
        Some(View::new(
            self,
            ViewParams::new(view_params.target, layer, 1, level, 1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture_cache::surface_params::TextureInfo;

    const BASE: GPUVAddr = 0x10_0000;

    fn surface(info: TextureInfo) -> SurfaceRef<()> {
        Arc::new(Surface::new(BASE, SurfaceParams::for_texture(&info), ()))
    }

    fn mipped(width: u32, height: u32, levels: u32) -> SurfaceRef<()> {
        surface(TextureInfo {
            width,
            height,
            num_levels: levels,
            ..TextureInfo::default()
        })
    }

    #[test]
    fn test_layout_matches_params() {
        let s = mipped(256, 256, 3);
        assert_eq!(s.mipmap_offset(0), 0);
        assert_eq!(s.mipmap_offset(1), 0x40000);
        assert_eq!(s.mipmap_offset(2), 0x50000);
        assert_eq!(s.size_in_bytes(), s.params().guest_size_in_bytes());
        assert_eq!(s.mipmap_size(7), 0);
    }

    #[test]
    fn test_layer_mipmap_lookup() {
        let s = mipped(256, 256, 2);
        assert_eq!(s.get_layer_mipmap(BASE), Some((0, 0)));
        assert_eq!(s.get_layer_mipmap(BASE + 0x40000), Some((0, 1)));
        assert_eq!(s.get_layer_mipmap(BASE + 0x100), None);
        assert_eq!(s.get_layer_mipmap(BASE - 0x100), None);
        assert_eq!(s.get_layer_mipmap(BASE + 0x50000), None);
    }

    #[test]
    fn test_layer_mipmap_on_array() {
        let s = surface(TextureInfo {
            width: 64,
            height: 64,
            depth: 4,
            target: SurfaceTarget::Texture2DArray,
            ..TextureInfo::default()
        });
        let layer_size = s.layer_size();
        assert_eq!(s.get_layer_mipmap(BASE + 2 * layer_size), Some((2, 0)));
        assert_eq!(s.get_layer_mipmap(BASE + 4 * layer_size), None);
    }

    #[test]
    fn test_view_covers_exactly_one_mip() {
        let s = mipped(256, 256, 2);
        let mip1 = SurfaceParams::for_texture(&TextureInfo {
            width: 128,
            height: 128,
            ..TextureInfo::default()
        });
        let view = s
            .emplace_view(&mip1, BASE + s.mipmap_offset(1), s.mipmap_size(1))
            .expect("mip 1 view");
        let vp = *view.params();
        assert_eq!((vp.base_level, vp.num_levels), (1, 1));
        assert_eq!((vp.base_layer, vp.num_layers), (0, 1));
        assert_eq!(s.mipmap_offset(vp.base_level), 0x40000);
        assert_eq!(s.mipmap_size(vp.base_level), mip1.guest_size_in_bytes());
        assert!(view.is_of(&s));

        // Wrong size for that slot.
        assert!(s.emplace_view(&mip1, BASE + 0x40000, 0x8000).is_none());
    }

    #[test]
    fn test_no_view_into_flat_or_volume() {
        let flat = mipped(64, 64, 1);
        assert!(flat
            .emplace_view(flat.params(), BASE, flat.size_in_bytes())
            .is_none());

        let volume = surface(TextureInfo {
            width: 32,
            height: 32,
            depth: 8,
            num_levels: 2,
            target: SurfaceTarget::Texture3D,
            ..TextureInfo::default()
        });
        assert!(volume
            .emplace_view(volume.params(), BASE, volume.mipmap_size(0))
            .is_none());
    }

    #[test]
    fn test_overview_of_array_as_2d() {
        let array = surface(TextureInfo {
            width: 64,
            height: 64,
            depth: 6,
            target: SurfaceTarget::Texture2DArray,
            ..TextureInfo::default()
        });
        let flat = SurfaceParams::for_texture(&TextureInfo::default());
        let view = array.emplace_overview(&flat);
        assert_eq!(view.params().target, SurfaceTarget::Texture2D);
        assert_eq!(view.params().num_layers, 1);

        let main = array.main_view();
        assert_eq!(main.params().num_layers, 6);
    }

    #[test]
    fn test_break_down_per_layer_and_level() {
        let array = surface(TextureInfo {
            width: 64,
            height: 64,
            depth: 2,
            num_levels: 2,
            target: SurfaceTarget::Texture2DArray,
            ..TextureInfo::default()
        });
        let bricks = array.break_down(array.params());
        assert_eq!(bricks.len(), 4);
        assert_eq!(bricks[3], CopyParams::layer_level(32, 32, 1, 1));

        let s = mipped(256, 256, 2);
        let mut wider = *s.params();
        wider.width = 512;
        let bricks = s.break_down(&wider);
        assert_eq!(bricks.len(), 2);
        assert_eq!((bricks[0].width, bricks[0].height), (256, 256));
        assert_eq!((bricks[1].width, bricks[1].height), (128, 128));
    }

    #[test]
    fn test_ranges() {
        let s = mipped(64, 64, 1);
        s.set_cache_addr(0x1000);
        let size = s.size_in_bytes();
        assert!(s.is_inside(BASE, BASE + size));
        assert!(!s.is_inside(BASE, BASE + size + 1));
        assert!(s.overlaps(0x1000 + size - 1, 0x1000 + size + 0x100));
        assert!(!s.overlaps(0x1000 + size, 0x1000 + size + 0x100));
    }

    #[test]
    fn test_render_target_mark_protects() {
        let s = mipped(64, 64, 1);
        s.mark_as_render_target(true);
        assert!(s.is_render_target() && s.is_protected());
        s.mark_as_render_target(false);
        assert!(!s.is_protected());
    }

    #[test]
    fn test_sub_texture_requires_flat_2d() {
        let s = mipped(64, 64, 1);
        let bigger = SurfaceParams::for_texture(&TextureInfo {
            width: 128,
            height: 128,
            ..TextureInfo::default()
        });
        assert!(s.matches_sub_texture(&bigger, BASE));
        assert!(!s.matches_sub_texture(&bigger, BASE + 0x100));
        let mipped_request = SurfaceParams::for_texture(&TextureInfo {
            num_levels: 2,
            ..TextureInfo::default()
        });
        assert!(!s.matches_sub_texture(&mipped_request, BASE));
    }
}
