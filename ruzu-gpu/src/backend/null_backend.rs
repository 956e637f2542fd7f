// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Null rendering backend: hands out opaque surface handles and performs no
//! host work.
//!
//! Used for headless runs where the cache bookkeeping matters but nothing is
//! drawn.

use ruzu_common::GPUVAddr;

use super::TextureBackend;
use crate::texture_cache::{BlitConfig, CopyParams, SurfaceParams, ViewParams};

/// Handle of a surface that only exists on paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NullSurface {
    pub id: u64,
}

pub struct NullBackend {
    next_id: u64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Number of surfaces created so far.
    pub fn surfaces_created(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBackend for NullBackend {
    type Surface = NullSurface;

    fn name(&self) -> &str {
        "null"
    }

    fn create_surface(&mut self, gpu_addr: GPUVAddr, params: &SurfaceParams) -> NullSurface {
        let id = self.next_id;
        self.next_id += 1;
        log::trace!(
            "null backend: surface #{} at 0x{:X} {:?} {}x{}x{}",
            id,
            gpu_addr,
            params.pixel_format,
            params.width,
            params.height,
            params.depth
        );
        NullSurface { id }
    }

    fn image_copy(&mut self, _src: &NullSurface, _dst: &NullSurface, _copy: &CopyParams) {}

    fn image_blit(
        &mut self,
        _src: &NullSurface,
        _src_view: &ViewParams,
        _dst: &NullSurface,
        _dst_view: &ViewParams,
        _config: &BlitConfig,
    ) {
    }

    fn buffer_copy(
        &mut self,
        _src: &NullSurface,
        _src_params: &SurfaceParams,
        _dst: &NullSurface,
        _dst_params: &SurfaceParams,
    ) {
    }

    fn upload_texture(&mut self, _surface: &NullSurface, _params: &SurfaceParams, _data: &[u8]) {}

    fn download_texture(&mut self, _surface: &NullSurface, _params: &SurfaceParams, data: &mut [u8]) {
        data.fill(0);
    }
}
