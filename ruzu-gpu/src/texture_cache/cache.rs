// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! The texture cache engine.
//!
//! Resolves (GPU address, shape) requests to cached host surfaces, keeping
//! them coherent with guest memory and with each other when the same memory
//! is viewed under different shapes and formats.
//!
//! Every public entry point takes the engine lock for its whole duration.
//! Page-count notifications for the rasterizer are queued while the lock is
//! held and delivered after it is released, so the rasterizer may call back
//! into the cache (e.g. to flush a region) without deadlocking.

use std::sync::Arc;

use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use ruzu_common::{CacheAddr, GPUVAddr, VAddr};

use super::copy_params::{BlitConfig, CopyParams};
use super::format::{PixelFormat, SiblingTable, SurfaceTarget};
use super::registry::SurfaceRegistry;
use super::render_targets::{RenderTargetDirty, RenderTargets, NUM_RENDER_TARGETS};
use super::reserve::SurfaceReserve;
use super::staging::StagingCache;
use super::surface::{Surface, SurfaceRef};
use super::surface_params::{
    DepthBufferInfo, FermiSurface, MatchStructureResult, MatchTopologyResult, RenderTargetInfo,
    SurfaceParams, TextureInfo,
};
use super::view::View;
use super::TextureCacheConfig;
use crate::backend::TextureBackend;
use crate::memory_manager::GpuMemory;
use crate::rasterizer::RasterizerInterface;

/// What to do with overlaps that cannot be reconciled with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecycleStrategy {
    /// Drop their contents.
    Ignore,
    /// Write their contents back to guest memory, oldest first.
    Flush,
    /// Raw byte copy from the first overlap.
    BufferCopy,
}

#[derive(Debug, Clone, Copy)]
struct PageUpdate {
    cpu_addr: VAddr,
    size: u64,
    delta: i32,
}

type SurfaceView<S> = (SurfaceRef<S>, View<S>);

pub struct TextureCache<B: TextureBackend> {
    state: Mutex<CacheState<B>>,
    rasterizer: Arc<dyn RasterizerInterface>,
}

struct CacheState<B: TextureBackend> {
    backend: B,
    memory: Arc<dyn GpuMemory>,
    accurate_gpu: bool,
    ticks: u64,
    guard_render_targets: bool,
    guard_samplers: bool,
    siblings: SiblingTable,
    registry: SurfaceRegistry<B::Surface>,
    reserve: SurfaceReserve<B::Surface>,
    render_targets: RenderTargets<B::Surface>,
    sampled_textures: Vec<SurfaceRef<B::Surface>>,
    staging: StagingCache,
    pending_pages: Vec<PageUpdate>,
}

impl<B: TextureBackend> TextureCache<B> {
    pub fn new(
        backend: B,
        memory: Arc<dyn GpuMemory>,
        rasterizer: Arc<dyn RasterizerInterface>,
        config: TextureCacheConfig,
    ) -> Self {
        debug!(
            "texture_cache: {} backend, accurate_gpu={}",
            backend.name(),
            config.accurate_gpu
        );
        Self {
            state: Mutex::new(CacheState {
                backend,
                memory,
                accurate_gpu: config.accurate_gpu,
                ticks: 0,
                guard_render_targets: false,
                guard_samplers: false,
                siblings: SiblingTable::new(),
                registry: SurfaceRegistry::new(),
                reserve: SurfaceReserve::new(),
                render_targets: RenderTargets::new(),
                sampled_textures: Vec::with_capacity(64),
                staging: StagingCache::new(config.staging_buffers),
                pending_pages: Vec::new(),
            }),
            rasterizer,
        }
    }

    /// Run `f` under the engine lock, then deliver the page-count changes it
    /// queued.
    fn with_state<R>(&self, f: impl FnOnce(&mut CacheState<B>) -> R) -> R {
        let (result, updates) = {
            let mut state = self.state.lock();
            let result = f(&mut state);
            (result, std::mem::take(&mut state.pending_pages))
        };
        for update in updates {
            self.rasterizer
                .update_pages_cached_count(update.cpu_addr, update.size, update.delta);
        }
        result
    }

    /// Access the backend, e.g. to present a surface.
    ///
    /// `f` runs with the engine lock held. It must not call back into this
    /// cache, or it deadlocks.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.state.lock().backend)
    }

    /// Advance and return the modification tick.
    pub fn tick(&self) -> u64 {
        self.state.lock().tick()
    }

    /// Drop every surface overlapping the cache range, e.g. after a guest
    /// CPU write.
    pub fn invalidate_region(&self, addr: CacheAddr, size: u64) {
        self.with_state(|state| {
            for surface in state.registry.surfaces_in_region(addr, size) {
                state.unregister(&surface);
            }
        });
    }

    /// Write every modified surface overlapping the cache range back to
    /// guest memory, oldest modification first.
    pub fn flush_region(&self, addr: CacheAddr, size: u64) {
        self.with_state(|state| {
            let mut surfaces = state.registry.surfaces_in_region(addr, size);
            surfaces.sort_by_key(|surface| surface.modification_tick());
            for surface in &surfaces {
                state.flush_surface(surface);
            }
        });
    }

    pub fn flush_and_invalidate_region(&self, addr: CacheAddr, size: u64) {
        self.with_state(|state| {
            let mut surfaces = state.registry.surfaces_in_region(addr, size);
            surfaces.sort_by_key(|surface| surface.modification_tick());
            for surface in &surfaces {
                state.flush_surface(surface);
            }
            for surface in &surfaces {
                state.unregister(surface);
            }
        });
    }

    /// While set, bound render targets are never evicted.
    pub fn guard_render_targets(&self, guard: bool) {
        self.state.lock().guard_render_targets = guard;
    }

    /// While set, every sampled surface is remembered for
    /// [`TextureCache::texture_barrier`].
    pub fn guard_samplers(&self, guard: bool) {
        self.state.lock().guard_samplers = guard;
    }

    pub fn get_surface(
        &self,
        gpu_addr: GPUVAddr,
        params: &SurfaceParams,
        preserve_contents: bool,
        is_render: bool,
    ) -> SurfaceView<B::Surface> {
        self.with_state(|state| state.get_surface(gpu_addr, params, preserve_contents, is_render))
    }

    pub fn get_texture_surface(&self, info: &TextureInfo) -> Option<View<B::Surface>> {
        if info.gpu_addr == 0 {
            return None;
        }
        let params = SurfaceParams::for_texture(info);
        self.with_state(|state| {
            let (surface, view) = state.get_surface(info.gpu_addr, &params, true, false);
            if state.guard_samplers {
                state.sampled_textures.push(surface);
            }
            Some(view)
        })
    }

    /// Whether any texture sampled since the last barrier is also a bound
    /// render target. Clears the sampled list.
    pub fn texture_barrier(&self) -> bool {
        let mut state = self.state.lock();
        let any_rt = state
            .sampled_textures
            .iter()
            .any(|surface| surface.is_render_target());
        state.sampled_textures.clear();
        any_rt
    }

    /// Resolve the depth buffer. `config` is `None` when the zeta buffer is
    /// disabled.
    pub fn get_depth_buffer_surface(
        &self,
        config: Option<&DepthBufferInfo>,
        preserve_contents: bool,
    ) -> Option<View<B::Surface>> {
        self.with_state(|state| {
            if !state.render_targets.take_dirty(RenderTargetDirty::ZETA) {
                return state.render_targets.depth.view.clone();
            }
            let Some(config) = config.filter(|c| c.gpu_addr != 0) else {
                state.render_targets.depth.unbind();
                return None;
            };
            let params = SurfaceParams::for_depth_buffer(config);
            let (surface, view) = state.get_surface(config.gpu_addr, &params, preserve_contents, true);
            state.render_targets.depth.bind(surface, view.clone());
            Some(view)
        })
    }

    /// Resolve color target `index`. `config` is `None` when the target is
    /// disabled.
    pub fn get_color_buffer_surface(
        &self,
        index: usize,
        config: Option<&RenderTargetInfo>,
        preserve_contents: bool,
    ) -> Option<View<B::Surface>> {
        if index >= NUM_RENDER_TARGETS {
            warn!("texture_cache: color buffer index {} out of range", index);
            return None;
        }
        self.with_state(|state| {
            if !state.render_targets.take_dirty(RenderTargetDirty::color(index)) {
                return state.render_targets.colors[index].view.clone();
            }
            let Some(config) =
                config.filter(|c| c.gpu_addr != 0 && c.pixel_format != PixelFormat::Invalid)
            else {
                state.render_targets.colors[index].unbind();
                return None;
            };
            let params = SurfaceParams::for_framebuffer(config);
            let (surface, view) = state.get_surface(config.gpu_addr, &params, preserve_contents, true);
            state.render_targets.colors[index].bind(surface, view.clone());
            Some(view)
        })
    }

    pub fn mark_color_buffer_in_use(&self, index: usize) {
        let mut state = self.state.lock();
        let target = state
            .render_targets
            .color(index)
            .and_then(|slot| slot.target.clone());
        if let Some(target) = target {
            let tick = state.tick();
            target.mark_as_modified(true, tick);
        }
    }

    pub fn mark_depth_buffer_in_use(&self) {
        let mut state = self.state.lock();
        if let Some(target) = state.render_targets.depth.target.clone() {
            let tick = state.tick();
            target.mark_as_modified(true, tick);
        }
    }

    pub fn set_empty_color_buffer(&self, index: usize) {
        if let Some(slot) = self.state.lock().render_targets.color_mut(index) {
            slot.unbind();
        }
    }

    pub fn set_empty_depth_buffer(&self) {
        self.state.lock().render_targets.depth.unbind();
    }

    pub fn mark_color_buffer_dirty(&self, index: usize) {
        self.state
            .lock()
            .render_targets
            .dirty
            .insert(RenderTargetDirty::color(index));
    }

    pub fn mark_depth_buffer_dirty(&self) {
        self.state
            .lock()
            .render_targets
            .dirty
            .insert(RenderTargetDirty::ZETA);
    }

    pub fn mark_all_dirty(&self) {
        self.state.lock().render_targets.dirty = RenderTargetDirty::all();
    }

    /// Fermi 2D blit from `src` into `dst`.
    pub fn do_fermi_copy(&self, src: &FermiSurface, dst: &FermiSurface, config: &BlitConfig) {
        self.with_state(|state| {
            let dst_params = SurfaceParams::for_fermi_copy(dst);
            let src_params = SurfaceParams::for_fermi_copy(src);
            let (dst_surface, dst_view) = state.get_surface(dst.gpu_addr, &dst_params, true, false);
            let (src_surface, src_view) = state.get_surface(src.gpu_addr, &src_params, true, false);
            trace!(
                "texture_cache: fermi copy 0x{:X} -> 0x{:X}",
                src.gpu_addr,
                dst.gpu_addr
            );
            state.backend.image_blit(
                src_surface.host(),
                src_view.params(),
                dst_surface.host(),
                dst_view.params(),
                config,
            );
            let tick = state.tick();
            dst_surface.mark_as_modified(true, tick);
        });
    }

    /// Registered surface starting exactly at `cache_addr`, used by the
    /// presentation path to find the guest framebuffer.
    pub fn try_find_framebuffer_surface(&self, cache_addr: CacheAddr) -> Option<SurfaceRef<B::Surface>> {
        self.state.lock().registry.find_in_bucket(cache_addr)
    }
}

impl<B: TextureBackend> CacheState<B> {
    fn tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    fn register(&mut self, surface: &SurfaceRef<B::Surface>) {
        let gpu_addr = surface.gpu_addr();
        let size = surface.size_in_bytes();
        let cache_addr = self.memory.get_pointer(gpu_addr);
        let cpu_addr = self.memory.gpu_to_cpu_address(gpu_addr);
        let (Some(cache_addr), Some(cpu_addr)) = (cache_addr, cpu_addr) else {
            error!(
                "texture_cache: failed to register surface with unmapped gpu_addr 0x{:016X}",
                gpu_addr
            );
            return;
        };
        surface.mark_as_continuous(self.memory.is_block_continuous(gpu_addr, size));
        surface.set_cache_addr(cache_addr);
        surface.set_cpu_addr(cpu_addr);
        self.registry.insert(surface);
        surface.mark_as_registered(true);
        self.pending_pages.push(PageUpdate {
            cpu_addr,
            size,
            delta: 1,
        });
        trace!(
            "texture_cache: register gpu=0x{:X} cache=0x{:X} size=0x{:X}",
            gpu_addr,
            cache_addr,
            size
        );
    }

    fn unregister(&mut self, surface: &SurfaceRef<B::Surface>) {
        if self.guard_render_targets && surface.is_protected() {
            trace!(
                "texture_cache: keeping protected render target at 0x{:X}",
                surface.gpu_addr()
            );
            return;
        }
        if !surface.is_registered() {
            return;
        }
        self.pending_pages.push(PageUpdate {
            cpu_addr: surface.cpu_addr(),
            size: surface.size_in_bytes(),
            delta: -1,
        });
        self.registry.remove(surface);
        surface.mark_as_registered(false);
        self.reserve.reserve(surface.params(), surface);
        trace!(
            "texture_cache: unregister gpu=0x{:X} cache=0x{:X}",
            surface.gpu_addr(),
            surface.cache_addr()
        );
    }

    /// A surface of shape `params` at `gpu_addr`, from the reserve when one
    /// is free.
    fn get_uncached_surface(
        &mut self,
        gpu_addr: GPUVAddr,
        params: &SurfaceParams,
    ) -> SurfaceRef<B::Surface> {
        if let Some(surface) = self.reserve.try_get(params) {
            surface.set_gpu_addr(gpu_addr);
            surface.mark_as_modified(false, 0);
            return surface;
        }
        let host = self.backend.create_surface(gpu_addr, params);
        Arc::new(Surface::new(gpu_addr, *params, host))
    }

    fn initialize_surface(
        &mut self,
        gpu_addr: GPUVAddr,
        params: &SurfaceParams,
        preserve_contents: bool,
    ) -> SurfaceView<B::Surface> {
        let surface = self.get_uncached_surface(gpu_addr, params);
        self.register(&surface);
        if preserve_contents {
            self.load_surface(&surface);
        }
        let view = surface.main_view();
        (surface, view)
    }

    fn load_surface(&mut self, surface: &SurfaceRef<B::Surface>) {
        let params = *surface.params();
        let host_size = surface.host_size_in_bytes() as usize;
        let guest_size = surface.size_in_bytes() as usize;
        let (host, guest) = self.staging.host_and_guest(host_size, guest_size);
        self.memory.read_block(surface.gpu_addr(), guest);
        self.backend.load_buffer(&params, guest, host);
        self.backend.upload_texture(surface.host(), &params, host);
        let tick = self.tick();
        surface.mark_as_modified(false, tick);
    }

    fn flush_surface(&mut self, surface: &SurfaceRef<B::Surface>) {
        if !surface.is_modified() {
            return;
        }
        let params = *surface.params();
        let gpu_addr = surface.gpu_addr();
        let host_size = surface.host_size_in_bytes() as usize;
        let guest_size = surface.size_in_bytes() as usize;
        let (host, guest) = self.staging.host_and_guest(host_size, guest_size);
        self.backend.download_texture(surface.host(), &params, host);
        // Padding the backend does not rewrite keeps its guest contents.
        self.memory.read_block(gpu_addr, guest);
        self.backend.flush_buffer(&params, host, guest);
        self.memory.write_block(gpu_addr, guest);
        let tick = self.tick();
        surface.mark_as_modified(false, tick);
        trace!("texture_cache: flushed surface at 0x{:X}", gpu_addr);
    }

    fn pick_strategy(
        &self,
        overlaps: &[SurfaceRef<B::Surface>],
        params: &SurfaceParams,
        untopological: MatchTopologyResult,
    ) -> RecycleStrategy {
        if self.accurate_gpu {
            return RecycleStrategy::Flush;
        }
        let is_volume =
            |p: &SurfaceParams| p.block_depth > 1 || p.target == SurfaceTarget::Texture3D;
        if is_volume(params) || overlaps.iter().any(|s| is_volume(s.params())) {
            return RecycleStrategy::Flush;
        }
        match untopological {
            MatchTopologyResult::CompressUnmatch => RecycleStrategy::Flush,
            MatchTopologyResult::FullMatch if !params.is_tiled => RecycleStrategy::Flush,
            _ => RecycleStrategy::Ignore,
        }
    }

    fn recycle_surface(
        &mut self,
        overlaps: Vec<SurfaceRef<B::Surface>>,
        params: &SurfaceParams,
        gpu_addr: GPUVAddr,
        preserve_contents: bool,
        untopological: MatchTopologyResult,
    ) -> SurfaceView<B::Surface> {
        let strategy = self.pick_strategy(&overlaps, params, untopological);
        self.recycle_with_strategy(overlaps, params, gpu_addr, preserve_contents, strategy)
    }

    fn recycle_with_strategy(
        &mut self,
        mut overlaps: Vec<SurfaceRef<B::Surface>>,
        params: &SurfaceParams,
        gpu_addr: GPUVAddr,
        preserve_contents: bool,
        strategy: RecycleStrategy,
    ) -> SurfaceView<B::Surface> {
        debug!(
            "texture_cache: recycling {} surface(s) at 0x{:X} with {:?}",
            overlaps.len(),
            gpu_addr,
            strategy
        );
        for surface in &overlaps {
            self.unregister(surface);
        }
        match strategy {
            RecycleStrategy::Ignore => {
                self.initialize_surface(gpu_addr, params, preserve_contents)
            }
            RecycleStrategy::Flush => {
                overlaps.sort_by_key(|surface| surface.modification_tick());
                for surface in &overlaps {
                    self.flush_surface(surface);
                }
                self.initialize_surface(gpu_addr, params, preserve_contents)
            }
            RecycleStrategy::BufferCopy => {
                let new_surface = self.get_uncached_surface(gpu_addr, params);
                if let Some(source) = overlaps.first() {
                    self.backend.buffer_copy(
                        source.host(),
                        source.params(),
                        new_surface.host(),
                        new_surface.params(),
                    );
                }
                let view = new_surface.main_view();
                (new_surface, view)
            }
        }
    }

    /// Recreate `current` under `params` at the same address, carrying its
    /// contents and modified state over.
    fn rebuild_surface(
        &mut self,
        current: &SurfaceRef<B::Surface>,
        params: &SurfaceParams,
        is_render: bool,
    ) -> SurfaceView<B::Surface> {
        let gpu_addr = current.gpu_addr();
        let cr_params = *current.params();
        let mut new_params = *params;
        if !is_render
            && self
                .siblings
                .are_siblings(cr_params.pixel_format, params.pixel_format)
        {
            new_params.pixel_format = cr_params.pixel_format;
            new_params.component_type = cr_params.component_type;
            new_params.surface_type = cr_params.surface_type;
        }
        debug!(
            "texture_cache: rebuilding 0x{:X} {:?} {}x{} -> {:?} {}x{}",
            gpu_addr,
            cr_params.pixel_format,
            cr_params.width,
            cr_params.height,
            new_params.pixel_format,
            new_params.width,
            new_params.height
        );
        let was_modified = current.is_modified();
        let new_surface = if cr_params.surface_type != new_params.surface_type
            || cr_params.component_type != new_params.component_type
        {
            let (surface, _) = self.recycle_with_strategy(
                vec![Arc::clone(current)],
                &new_params,
                gpu_addr,
                false,
                RecycleStrategy::BufferCopy,
            );
            surface
        } else {
            let surface = self.get_uncached_surface(gpu_addr, &new_params);
            for brick in current.break_down(&new_params) {
                self.backend.image_copy(current.host(), surface.host(), &brick);
            }
            self.unregister(current);
            surface
        };
        self.register(&new_surface);
        let tick = self.tick();
        new_surface.mark_as_modified(was_modified, tick);
        let view = new_surface.main_view();
        (new_surface, view)
    }

    /// Resolve an exact structural hit: same surface, possibly through a
    /// reinterpreting view, unless the formats are incompatible.
    fn manage_structural_match(
        &mut self,
        current: &SurfaceRef<B::Surface>,
        params: &SurfaceParams,
        is_render: bool,
    ) -> SurfaceView<B::Surface> {
        let is_mirage = !current.match_format(params.pixel_format);
        let is_sibling =
            !is_render && self.siblings.are_siblings(current.format(), params.pixel_format);
        if !is_mirage || is_sibling {
            let view = if current.match_target(params.target) {
                current.main_view()
            } else {
                current.emplace_overview(params)
            };
            return (Arc::clone(current), view);
        }
        self.rebuild_surface(current, params, is_render)
    }

    /// Build the candidate out of flat overlaps that sit exactly on its
    /// layer/mip slots.
    fn try_reconstruct_surface(
        &mut self,
        overlaps: &[SurfaceRef<B::Surface>],
        params: &SurfaceParams,
        gpu_addr: GPUVAddr,
    ) -> Option<SurfaceView<B::Surface>> {
        if params.target == SurfaceTarget::Texture3D {
            return None;
        }
        if overlaps
            .iter()
            .any(|s| s.params().is_layered || s.params().num_levels > 1)
        {
            return None;
        }
        let new_surface = self.get_uncached_surface(gpu_addr, params);
        let mut modified = false;
        let mut copies = Vec::with_capacity(overlaps.len());
        for surface in overlaps {
            let Some((layer, level)) = new_surface.get_layer_mipmap(surface.gpu_addr()) else {
                continue;
            };
            if new_surface.mipmap_size(level) != surface.size_in_bytes() {
                continue;
            }
            modified |= surface.is_modified();
            let src_params = surface.params();
            copies.push((
                Arc::clone(surface),
                CopyParams {
                    dest_z: layer,
                    dest_level: level,
                    width: SurfaceParams::intersect_width(src_params, params, 0, level),
                    height: SurfaceParams::intersect_height(src_params, params, 0, level),
                    depth: 1,
                    ..CopyParams::default()
                },
            ));
        }
        if copies.is_empty() || (self.accurate_gpu && copies.len() != overlaps.len()) {
            // Keep the allocation around for the recycle that follows.
            self.reserve.reserve(params, &new_surface);
            return None;
        }
        debug!(
            "texture_cache: reconstructing 0x{:X} from {}/{} overlaps",
            gpu_addr,
            copies.len(),
            overlaps.len()
        );
        for (source, copy) in &copies {
            self.backend.image_copy(source.host(), new_surface.host(), copy);
        }
        for surface in overlaps {
            self.unregister(surface);
        }
        let tick = self.tick();
        new_surface.mark_as_modified(modified, tick);
        self.register(&new_surface);
        let view = new_surface.main_view();
        Some((new_surface, view))
    }

    fn get_surface(
        &mut self,
        gpu_addr: GPUVAddr,
        params: &SurfaceParams,
        preserve_contents: bool,
        is_render: bool,
    ) -> SurfaceView<B::Surface> {
        let Some(cache_addr) = self.memory.get_pointer(gpu_addr) else {
            trace!("texture_cache: null surface for unmapped 0x{:X}", gpu_addr);
            let mut null_params = *params;
            null_params.width = 1;
            null_params.height = 1;
            null_params.depth = 1;
            null_params.block_height = 0;
            null_params.block_depth = 0;
            return self.initialize_surface(gpu_addr, &null_params, false);
        };

        // Exact address hit.
        if let Some(current) = self.registry.l1_lookup(cache_addr) {
            let topological = current.matches_topology(params);
            if topological != MatchTopologyResult::FullMatch {
                return self.recycle_surface(
                    vec![current],
                    params,
                    gpu_addr,
                    preserve_contents,
                    topological,
                );
            }
            let structural = current.matches_structure(params);
            if structural != MatchStructureResult::None
                && (params.target != SurfaceTarget::Texture3D
                    || current.match_target(params.target))
            {
                return if structural == MatchStructureResult::FullMatch {
                    self.manage_structural_match(&current, params, is_render)
                } else {
                    self.rebuild_surface(&current, params, is_render)
                };
            }
        }

        let candidate_size = params.guest_size_in_bytes();
        let overlaps = self.registry.surfaces_in_region(cache_addr, candidate_size);
        if overlaps.is_empty() {
            return self.initialize_surface(gpu_addr, params, preserve_contents);
        }

        if let Some(untopological) = overlaps
            .iter()
            .map(|surface| surface.matches_topology(params))
            .find(|result| *result != MatchTopologyResult::FullMatch)
        {
            return self.recycle_surface(
                overlaps,
                params,
                gpu_addr,
                preserve_contents,
                untopological,
            );
        }

        if let [current] = overlaps.as_slice() {
            let current = Arc::clone(current);
            if !current.is_inside(gpu_addr, gpu_addr + candidate_size) {
                // The candidate may be a superset with the overlap as its
                // first layer or level.
                if current.gpu_addr() == gpu_addr {
                    if let Some(pair) = self.try_reconstruct_surface(&overlaps, params, gpu_addr) {
                        return pair;
                    }
                }
                return self.recycle_surface(
                    overlaps,
                    params,
                    gpu_addr,
                    preserve_contents,
                    MatchTopologyResult::FullMatch,
                );
            }

            if let Some(view) = current.emplace_view(params, gpu_addr, candidate_size) {
                if current.match_format(params.pixel_format) {
                    return (current, view);
                }
                // Rebuild the whole overlap in the requested format, then
                // carve the view again.
                let mut mirage_params = *current.params();
                mirage_params.width = SurfaceParams::convert_width(
                    mirage_params.width,
                    mirage_params.pixel_format,
                    params.pixel_format,
                );
                mirage_params.height = SurfaceParams::convert_height(
                    mirage_params.height,
                    mirage_params.pixel_format,
                    params.pixel_format,
                );
                mirage_params.pixel_format = params.pixel_format;
                let (rebuilt, _) = self.rebuild_surface(&current, &mirage_params, is_render);
                if let Some(view) = rebuilt.emplace_view(params, gpu_addr, candidate_size) {
                    return (rebuilt, view);
                }
                return self.recycle_surface(
                    vec![rebuilt],
                    params,
                    gpu_addr,
                    preserve_contents,
                    MatchTopologyResult::FullMatch,
                );
            }

            // Fabricates the area outside the overlap, so only outside
            // accurate mode.
            if !self.accurate_gpu && current.matches_sub_texture(params, gpu_addr) {
                return self.rebuild_surface(&current, params, is_render);
            }
        } else if let Some(pair) = self.try_reconstruct_surface(&overlaps, params, gpu_addr) {
            return pair;
        }

        self.recycle_surface(
            overlaps,
            params,
            gpu_addr,
            preserve_contents,
            MatchTopologyResult::FullMatch,
        )
    }
}
