// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Surface shape descriptors and the Tegra X1 guest layout arithmetic.
//!
//! Block-linear ("tiled") surfaces are built from GOBs of 64 bytes × 8 rows.
//! `block_height`/`block_depth` are log2 counts of GOBs per block, so a tiled
//! level occupies
//! `align(width * bpp, 64) * align(height, 8 << bh) * align(depth, 1 << bd)`
//! bytes of guest memory.

use ruzu_common::{align_bits, align_up, log2_ceil, GPUVAddr};

use super::format::{ComponentType, PixelFormat, SurfaceTarget, SurfaceType};

/// GOB width in bytes.
const GOB_SIZE_X: u64 = 64;
/// GOB height in rows.
const GOB_SIZE_Y: u64 = 8;
/// log2 of the bytes in one GOB (64 × 8 = 512).
const GOB_SIZE_SHIFT: u32 = 9;

/// Result of comparing the tiling/storage class of two surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTopologyResult {
    FullMatch,
    /// Same layout except that one side is block-compressed.
    CompressUnmatch,
    None,
}

/// Result of comparing the full shape of two topologically equal surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStructureResult {
    FullMatch,
    /// Same memory footprint, different dimensions or format.
    SemiMatch,
    None,
}

/// Render target metadata carried along with framebuffer surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetMeta {
    pub index: u32,
    pub array_mode: u32,
    pub layer_stride: u32,
    pub base_layer: u32,
}

/// Shape of a candidate or cached surface.
///
/// For layered targets `depth` is the layer count, otherwise it is the volume
/// depth (1 for everything but 3D textures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceParams {
    pub is_tiled: bool,
    pub srgb_conversion: bool,
    pub is_layered: bool,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
    pub tile_width_spacing: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Row pitch in bytes, linear surfaces only.
    pub pitch: u32,
    pub num_levels: u32,
    pub pixel_format: PixelFormat,
    pub component_type: ComponentType,
    pub surface_type: SurfaceType,
    pub target: SurfaceTarget,
    pub rt: RenderTargetMeta,
}

/// Already-decoded texture image control entry.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfo {
    pub gpu_addr: GPUVAddr,
    pub pixel_format: PixelFormat,
    pub component_type: ComponentType,
    pub srgb_conversion: bool,
    pub is_tiled: bool,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
    /// log2 of the tile width spacing.
    pub tile_width_spacing: u32,
    pub width: u32,
    pub height: u32,
    /// Volume depth or array size, depending on `target`.
    pub depth: u32,
    pub pitch: u32,
    pub num_levels: u32,
    pub target: SurfaceTarget,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            gpu_addr: 0,
            pixel_format: PixelFormat::ABGR8U,
            component_type: ComponentType::UNorm,
            srgb_conversion: false,
            is_tiled: true,
            block_width: 0,
            block_height: 4,
            block_depth: 0,
            tile_width_spacing: 0,
            width: 1,
            height: 1,
            depth: 1,
            pitch: 0,
            num_levels: 1,
            target: SurfaceTarget::Texture2D,
        }
    }
}

/// Already-decoded color render target registers.
#[derive(Debug, Clone, Copy)]
pub struct RenderTargetInfo {
    pub gpu_addr: GPUVAddr,
    pub index: u32,
    pub pixel_format: PixelFormat,
    pub component_type: ComponentType,
    pub is_tiled: bool,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
    /// Width in pixels for tiled targets, row pitch in bytes for linear ones.
    pub width: u32,
    pub height: u32,
    pub array_mode: u32,
    pub layer_stride: u32,
    pub base_layer: u32,
}

/// Already-decoded zeta (depth) buffer registers.
#[derive(Debug, Clone, Copy)]
pub struct DepthBufferInfo {
    pub gpu_addr: GPUVAddr,
    pub pixel_format: PixelFormat,
    pub is_tiled: bool,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
    pub width: u32,
    pub height: u32,
}

/// Already-decoded Fermi 2D source/destination surface registers.
#[derive(Debug, Clone, Copy)]
pub struct FermiSurface {
    pub gpu_addr: GPUVAddr,
    pub pixel_format: PixelFormat,
    pub component_type: ComponentType,
    pub is_tiled: bool,
    pub block_width: u32,
    pub block_height: u32,
    pub block_depth: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
}

impl SurfaceParams {
    pub fn for_texture(info: &TextureInfo) -> Self {
        let target = info.target;
        let depth = match target {
            SurfaceTarget::TextureCubemap => 6,
            SurfaceTarget::TextureCubeArray => info.depth.max(1) * 6,
            SurfaceTarget::Texture1D | SurfaceTarget::Texture2D | SurfaceTarget::TextureBuffer => 1,
            _ => info.depth.max(1),
        };
        let bpp = info.pixel_format.bytes_per_block();
        let (block_width, block_height, block_depth) = if info.is_tiled {
            (info.block_width, info.block_height, info.block_depth)
        } else {
            (0, 0, 0)
        };
        let pitch = if info.is_tiled {
            0
        } else if info.pitch != 0 {
            info.pitch
        } else {
            info.width * bpp
        };
        Self {
            is_tiled: info.is_tiled,
            srgb_conversion: info.srgb_conversion,
            is_layered: target.is_layered(),
            block_width,
            block_height,
            block_depth,
            tile_width_spacing: if info.is_tiled {
                1 << info.tile_width_spacing
            } else {
                0
            },
            width: info.width.max(1),
            height: info.height.max(1),
            depth,
            pitch,
            num_levels: if info.is_tiled { info.num_levels.max(1) } else { 1 },
            pixel_format: info.pixel_format,
            component_type: info.component_type,
            surface_type: info.pixel_format.surface_type(),
            target,
            rt: RenderTargetMeta::default(),
        }
    }

    pub fn for_framebuffer(info: &RenderTargetInfo) -> Self {
        let bpp = info.pixel_format.bytes_per_block().max(1);
        let (width, pitch) = if info.is_tiled {
            (info.width, 0)
        } else {
            (info.width / bpp, info.width)
        };
        Self {
            is_tiled: info.is_tiled,
            srgb_conversion: info.pixel_format == PixelFormat::RGBA8Srgb,
            is_layered: false,
            block_width: info.block_width,
            block_height: info.block_height,
            block_depth: info.block_depth,
            tile_width_spacing: 1,
            width: width.max(1),
            height: info.height.max(1),
            depth: 1,
            pitch,
            num_levels: 1,
            pixel_format: info.pixel_format,
            component_type: info.component_type,
            surface_type: info.pixel_format.surface_type(),
            target: SurfaceTarget::Texture2D,
            rt: RenderTargetMeta {
                index: info.index,
                array_mode: info.array_mode,
                layer_stride: info.layer_stride,
                base_layer: info.base_layer,
            },
        }
    }

    pub fn for_depth_buffer(info: &DepthBufferInfo) -> Self {
        let component_type = match info.pixel_format {
            PixelFormat::Z32F | PixelFormat::Z32FS8 => ComponentType::Float,
            _ => ComponentType::UNorm,
        };
        let bpp = info.pixel_format.bytes_per_block();
        Self {
            is_tiled: info.is_tiled,
            srgb_conversion: false,
            is_layered: false,
            block_width: info.block_width,
            block_height: info.block_height,
            block_depth: info.block_depth,
            tile_width_spacing: 1,
            width: info.width.max(1),
            height: info.height.max(1),
            depth: 1,
            pitch: if info.is_tiled { 0 } else { info.width * bpp },
            num_levels: 1,
            pixel_format: info.pixel_format,
            component_type,
            surface_type: info.pixel_format.surface_type(),
            target: SurfaceTarget::Texture2D,
            rt: RenderTargetMeta::default(),
        }
    }

    pub fn for_fermi_copy(info: &FermiSurface) -> Self {
        let (block_width, block_height, block_depth) = if info.is_tiled {
            (info.block_width, info.block_height, info.block_depth)
        } else {
            (0, 0, 0)
        };
        Self {
            is_tiled: info.is_tiled,
            srgb_conversion: false,
            is_layered: false,
            block_width,
            block_height,
            block_depth,
            tile_width_spacing: 1,
            width: info.width.max(1),
            height: info.height.max(1),
            depth: 1,
            pitch: info.pitch,
            num_levels: 1,
            pixel_format: info.pixel_format,
            component_type: info.component_type,
            surface_type: info.pixel_format.surface_type(),
            target: SurfaceTarget::Texture2D,
            rt: RenderTargetMeta::default(),
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.pixel_format.bytes_per_block()
    }

    pub fn default_block_width(&self) -> u32 {
        self.pixel_format.block_width()
    }

    pub fn default_block_height(&self) -> u32 {
        self.pixel_format.block_height()
    }

    pub fn is_buffer(&self) -> bool {
        self.target == SurfaceTarget::TextureBuffer
    }

    pub fn is_compressed(&self) -> bool {
        self.pixel_format.is_compressed()
    }

    pub fn num_layers(&self) -> u32 {
        if self.is_layered {
            self.depth
        } else {
            1
        }
    }

    pub fn mip_width(&self, level: u32) -> u32 {
        (self.width >> level).max(1)
    }

    pub fn mip_height(&self, level: u32) -> u32 {
        (self.height >> level).max(1)
    }

    pub fn mip_depth(&self, level: u32) -> u32 {
        if self.is_layered {
            self.depth
        } else {
            (self.depth >> level).max(1)
        }
    }

    /// Block height (log2 GOBs) the hardware uses for `level`: it shrinks
    /// with the mip so small levels are not padded to the base block height.
    pub fn mip_block_height(&self, level: u32) -> u32 {
        if level == 0 {
            return self.block_height;
        }
        let default_block_height = self.default_block_height();
        let blocks_in_y = self.mip_height(level).div_ceil(default_block_height);
        log2_ceil(blocks_in_y).clamp(3, 8) - 3
    }

    pub fn mip_block_depth(&self, level: u32) -> u32 {
        if level == 0 {
            return self.block_depth;
        }
        if self.is_layered {
            return 0;
        }
        let block_depth = log2_ceil(self.mip_depth(level));
        if block_depth > 4 {
            return 5 - u32::from(self.mip_block_height(level) >= 2);
        }
        block_depth
    }

    /// Width rounded up to the tiled block width, in pixels.
    pub fn block_aligned_width(&self) -> u32 {
        if self.is_buffer() || !self.is_tiled {
            return self.width;
        }
        let gob_width = (GOB_SIZE_X as u32 / self.bytes_per_pixel().max(1)).max(1);
        align_up(u64::from(self.width), u64::from(gob_width << self.block_width)) as u32
    }

    /// Bytes one mip level of one layer occupies.
    pub fn inner_mipmap_memory_size(&self, level: u32, as_host_size: bool) -> u64 {
        let bpp = u64::from(self.bytes_per_pixel());
        let width = u64::from(self.mip_width(level).div_ceil(self.default_block_width()));
        let height = u64::from(self.mip_height(level).div_ceil(self.default_block_height()));
        let depth = if self.is_layered {
            1
        } else {
            u64::from(self.mip_depth(level))
        };
        if self.is_tiled && !as_host_size {
            let aligned_width = align_up(width * bpp, GOB_SIZE_X);
            let aligned_height = align_up(height, GOB_SIZE_Y << self.mip_block_height(level));
            let aligned_depth = align_up(depth, 1 << self.mip_block_depth(level));
            aligned_width * aligned_height * aligned_depth
        } else if as_host_size || self.is_buffer() || self.pitch == 0 {
            bpp * width * height * depth
        } else {
            u64::from(self.pitch) * height * depth
        }
    }

    /// Bytes a full mip chain of one layer occupies.
    pub fn layer_size(&self, as_host_size: bool) -> u64 {
        let size = (0..self.num_levels)
            .map(|level| self.inner_mipmap_memory_size(level, as_host_size))
            .sum();
        if self.is_tiled && self.is_layered && !as_host_size {
            return align_bits(size, GOB_SIZE_SHIFT + self.block_height + self.block_depth);
        }
        size
    }

    pub fn guest_mipmap_level_offset(&self, level: u32) -> u64 {
        (0..level)
            .map(|i| self.inner_mipmap_memory_size(i, false))
            .sum()
    }

    pub fn guest_size_in_bytes(&self) -> u64 {
        self.layer_size(false) * u64::from(self.num_layers())
    }

    pub fn host_size_in_bytes(&self) -> u64 {
        self.layer_size(true) * u64::from(self.num_layers())
    }

    /// Convert a width in `from`'s block units into `to`'s.
    pub fn convert_width(width: u32, from: PixelFormat, to: PixelFormat) -> u32 {
        (width * to.block_width()).div_ceil(from.block_width())
    }

    pub fn convert_height(height: u32, from: PixelFormat, to: PixelFormat) -> u32 {
        (height * to.block_height()).div_ceil(from.block_height())
    }

    /// Width of `src` at `src_level` expressed in `dst` blocks, clipped to
    /// `dst` at `dst_level`.
    pub fn intersect_width(src: &Self, dst: &Self, src_level: u32, dst_level: u32) -> u32 {
        let bw1 = src.default_block_width();
        let bw2 = dst.default_block_width();
        let src_width = (src.mip_width(src_level) * bw2).div_ceil(bw1);
        src_width.min(dst.mip_width(dst_level))
    }

    pub fn intersect_height(src: &Self, dst: &Self, src_level: u32, dst_level: u32) -> u32 {
        let bh1 = src.default_block_height();
        let bh2 = dst.default_block_height();
        let src_height = (src.mip_height(src_level) * bh2).div_ceil(bh1);
        src_height.min(dst.mip_height(dst_level))
    }

    /// Compare the byte-layout class: bytes per block, tiling, buffer-ness
    /// and compression.
    pub fn matches_topology(&self, rhs: &Self) -> MatchTopologyResult {
        if (self.bytes_per_pixel(), self.is_tiled, self.is_buffer())
            != (rhs.bytes_per_pixel(), rhs.is_tiled, rhs.is_buffer())
        {
            return MatchTopologyResult::None;
        }
        if self.is_compressed() == rhs.is_compressed() {
            MatchTopologyResult::FullMatch
        } else {
            MatchTopologyResult::CompressUnmatch
        }
    }

    /// Compare the full shape. Only meaningful after a topology full match.
    pub fn matches_structure(&self, rhs: &Self) -> MatchStructureResult {
        if self.is_buffer() {
            let row = u64::from(self.width) * u64::from(self.bytes_per_pixel());
            let rhs_row = u64::from(rhs.width) * u64::from(rhs.bytes_per_pixel());
            return if row == rhs_row {
                MatchStructureResult::FullMatch
            } else {
                MatchStructureResult::None
            };
        }

        if !self.is_tiled {
            if (self.height, self.pitch) != (rhs.height, rhs.pitch) {
                return MatchStructureResult::None;
            }
            return if self.width == rhs.width {
                MatchStructureResult::FullMatch
            } else {
                MatchStructureResult::SemiMatch
            };
        }

        let layout = (
            self.depth,
            self.block_width,
            self.block_height,
            self.block_depth,
            self.tile_width_spacing,
            self.num_levels,
        );
        let rhs_layout = (
            rhs.depth,
            rhs.block_width,
            rhs.block_height,
            rhs.block_depth,
            rhs.tile_width_spacing,
            rhs.num_levels,
        );
        if layout != rhs_layout {
            return MatchStructureResult::None;
        }
        if (self.width, self.height) == (rhs.width, rhs.height) {
            return MatchStructureResult::FullMatch;
        }
        let ws = Self::convert_width(rhs.block_aligned_width(), self.pixel_format, rhs.pixel_format);
        let hs = Self::convert_height(rhs.height, self.pixel_format, rhs.pixel_format);
        if (self.block_aligned_width(), self.height) == (ws, hs) {
            return MatchStructureResult::SemiMatch;
        }
        MatchStructureResult::None
    }
}
