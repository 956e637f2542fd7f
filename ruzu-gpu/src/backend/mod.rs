// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host rendering backend abstraction for the texture cache.
//!
//! The cache decides *what* to create, copy and upload; a backend owns the
//! host graphics objects and decides *how*. Only a null backend exists so
//! far; the Vulkan one will implement the same trait.

pub mod null_backend;

use ruzu_common::GPUVAddr;

use crate::texture_cache::{BlitConfig, CopyParams, SurfaceParams, ViewParams};

/// Operations the texture cache requires from a rendering backend.
///
/// Surface handles are immutable from the cache's point of view; a backend
/// that needs mutable host state keeps it behind the handle. `src` and `dst`
/// may be the same handle.
pub trait TextureBackend: Send {
    /// Host resource backing one cached surface.
    type Surface: Send + Sync;

    fn name(&self) -> &str;

    /// Allocate a host resource of shape `params`.
    fn create_surface(&mut self, gpu_addr: GPUVAddr, params: &SurfaceParams) -> Self::Surface;

    /// Copy a region between two surfaces of the same storage class.
    fn image_copy(&mut self, src: &Self::Surface, dst: &Self::Surface, copy: &CopyParams);

    /// Scaled and format-converting copy between two views.
    fn image_blit(
        &mut self,
        src: &Self::Surface,
        src_view: &ViewParams,
        dst: &Self::Surface,
        dst_view: &ViewParams,
        config: &BlitConfig,
    );

    /// Raw byte transfer between surfaces of different storage classes.
    fn buffer_copy(
        &mut self,
        src: &Self::Surface,
        src_params: &SurfaceParams,
        dst: &Self::Surface,
        dst_params: &SurfaceParams,
    );

    /// Convert guest bytes (possibly block-linear) into the linear host
    /// image. The default treats both as identical.
    fn load_buffer(&mut self, _params: &SurfaceParams, guest: &[u8], host: &mut [u8]) {
        let len = guest.len().min(host.len());
        host[..len].copy_from_slice(&guest[..len]);
    }

    /// Inverse of [`TextureBackend::load_buffer`].
    fn flush_buffer(&mut self, _params: &SurfaceParams, host: &[u8], guest: &mut [u8]) {
        let len = guest.len().min(host.len());
        guest[..len].copy_from_slice(&host[..len]);
    }

    fn upload_texture(&mut self, surface: &Self::Surface, params: &SurfaceParams, data: &[u8]);

    fn download_texture(&mut self, surface: &Self::Surface, params: &SurfaceParams, data: &mut [u8]);
}
