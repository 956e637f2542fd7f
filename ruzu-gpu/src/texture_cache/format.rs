// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host pixel formats and the layout facts the cache needs about them.
//!
//! Only sizes and block shapes live here. Converting between formats is the
//! backend's business.

/// Pixel format of a cached surface, after decoding the guest format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PixelFormat {
    ABGR8U = 0,
    ABGR8S,
    ABGR8UI,
    B5G6R5U,
    A2B10G10R10U,
    A1B5G5R5U,
    R8U,
    R8UI,
    RGBA16F,
    RGBA16U,
    RGBA16UI,
    R11FG11FB10F,
    RGBA32UI,
    DXT1,
    DXT23,
    DXT45,
    DXN1,
    DXN2UNORM,
    BC7U,
    BC6HUF16,
    Astc2D4X4,
    Astc2D8X8,
    Astc2D8X5,
    BGRA8,
    RGBA32F,
    RG32F,
    R32F,
    R16F,
    R16U,
    R16S,
    R16UI,
    RG16,
    RG16F,
    RG8U,
    R32UI,
    RGBA8Srgb,
    // Depth formats
    Z32F,
    Z16,
    // DepthStencil formats
    Z24S8,
    S8Z24,
    Z32FS8,
    Invalid,
}

/// Coarse class of a pixel format's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceType {
    ColorTexture,
    Depth,
    DepthStencil,
    Invalid,
}

/// Numeric interpretation of a format's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[default]
    Invalid,
    SNorm,
    UNorm,
    SInt,
    UInt,
    Float,
}

/// Resource dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceTarget {
    Texture1D,
    TextureBuffer,
    Texture2D,
    Texture3D,
    Texture1DArray,
    Texture2DArray,
    TextureCubemap,
    TextureCubeArray,
}

impl SurfaceTarget {
    /// Whether `depth` counts array layers rather than volume slices.
    pub fn is_layered(self) -> bool {
        matches!(
            self,
            Self::Texture1DArray | Self::Texture2DArray | Self::TextureCubemap | Self::TextureCubeArray
        )
    }
}

struct FormatInfo {
    bits_per_block: u32,
    block_width: u32,
    block_height: u32,
    surface_type: SurfaceType,
}

const fn color(bits_per_block: u32) -> FormatInfo {
    FormatInfo {
        bits_per_block,
        block_width: 1,
        block_height: 1,
        surface_type: SurfaceType::ColorTexture,
    }
}

const fn compressed(bits_per_block: u32, block_width: u32, block_height: u32) -> FormatInfo {
    FormatInfo {
        bits_per_block,
        block_width,
        block_height,
        surface_type: SurfaceType::ColorTexture,
    }
}

const fn depth(bits_per_block: u32, surface_type: SurfaceType) -> FormatInfo {
    FormatInfo {
        bits_per_block,
        block_width: 1,
        block_height: 1,
        surface_type,
    }
}

impl PixelFormat {
    pub const COUNT: usize = PixelFormat::Invalid as usize + 1;

    fn info(self) -> FormatInfo {
        use PixelFormat::*;
        match self {
            ABGR8U | ABGR8S | ABGR8UI | A2B10G10R10U | R11FG11FB10F | BGRA8 | RG16 | RG16F
            | R32F | R32UI | RGBA8Srgb => color(32),
            B5G6R5U | A1B5G5R5U | R16F | R16U | R16S | R16UI | RG8U => color(16),
            R8U | R8UI => color(8),
            RGBA16F | RGBA16U | RGBA16UI | RG32F => color(64),
            RGBA32UI | RGBA32F => color(128),
            DXT1 | DXN1 => compressed(64, 4, 4),
            DXT23 | DXT45 | DXN2UNORM | BC7U | BC6HUF16 | Astc2D4X4 => compressed(128, 4, 4),
            Astc2D8X8 => compressed(128, 8, 8),
            Astc2D8X5 => compressed(128, 8, 5),
            Z32F => depth(32, SurfaceType::Depth),
            Z16 => depth(16, SurfaceType::Depth),
            Z24S8 | S8Z24 => depth(32, SurfaceType::DepthStencil),
            Z32FS8 => depth(64, SurfaceType::DepthStencil),
            Invalid => FormatInfo {
                bits_per_block: 0,
                block_width: 1,
                block_height: 1,
                surface_type: SurfaceType::Invalid,
            },
        }
    }

    /// Bytes per texel block (per pixel for uncompressed formats).
    pub fn bytes_per_block(self) -> u32 {
        self.info().bits_per_block / 8
    }

    pub fn block_width(self) -> u32 {
        self.info().block_width
    }

    pub fn block_height(self) -> u32 {
        self.info().block_height
    }

    pub fn is_compressed(self) -> bool {
        let info = self.info();
        info.block_width > 1 || info.block_height > 1
    }

    pub fn surface_type(self) -> SurfaceType {
        self.info().surface_type
    }

    fn from_index(index: usize) -> Self {
        use PixelFormat::*;
        const ALL: [PixelFormat; PixelFormat::COUNT] = [
            ABGR8U, ABGR8S, ABGR8UI, B5G6R5U, A2B10G10R10U, A1B5G5R5U, R8U, R8UI, RGBA16F,
            RGBA16U, RGBA16UI, R11FG11FB10F, RGBA32UI, DXT1, DXT23, DXT45, DXN1, DXN2UNORM, BC7U,
            BC6HUF16, Astc2D4X4, Astc2D8X8, Astc2D8X5, BGRA8, RGBA32F, RG32F, R32F, R16F, R16U,
            R16S, R16UI, RG16, RG16F, RG8U, R32UI, RGBA8Srgb, Z32F, Z16, Z24S8, S8Z24, Z32FS8,
            Invalid,
        ];
        ALL.get(index).copied().unwrap_or(Invalid)
    }
}

/// Symmetric table of depth/color formats with bit-identical storage.
///
/// Formats without a declared sibling map to themselves.
pub struct SiblingTable {
    table: [PixelFormat; PixelFormat::COUNT],
}

impl SiblingTable {
    pub fn new() -> Self {
        let mut table = [PixelFormat::Invalid; PixelFormat::COUNT];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = PixelFormat::from_index(i);
        }
        let mut siblings = Self { table };
        siblings.make_siblings(PixelFormat::Z16, PixelFormat::R16U);
        siblings.make_siblings(PixelFormat::Z32F, PixelFormat::R32F);
        siblings.make_siblings(PixelFormat::Z32FS8, PixelFormat::RG32F);
        siblings
    }

    fn make_siblings(&mut self, a: PixelFormat, b: PixelFormat) {
        self.table[a as usize] = b;
        self.table[b as usize] = a;
    }

    pub fn get(&self, format: PixelFormat) -> PixelFormat {
        self.table[format as usize]
    }

    /// Whether `a` and `b` are distinct formats declared as siblings.
    pub fn are_siblings(&self, a: PixelFormat, b: PixelFormat) -> bool {
        a != b && self.get(a) == b
    }
}

impl Default for SiblingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index_matches_discriminant() {
        for i in 0..PixelFormat::COUNT {
            assert_eq!(PixelFormat::from_index(i) as usize, i);
        }
    }

    #[test]
    fn test_sizes() {
        assert_eq!(PixelFormat::ABGR8U.bytes_per_block(), 4);
        assert_eq!(PixelFormat::R8U.bytes_per_block(), 1);
        assert_eq!(PixelFormat::RGBA32F.bytes_per_block(), 16);
        assert_eq!(PixelFormat::DXT1.bytes_per_block(), 8);
        assert_eq!(PixelFormat::Z32FS8.bytes_per_block(), 8);
    }

    #[test]
    fn test_compressed_blocks() {
        assert!(PixelFormat::DXT1.is_compressed());
        assert_eq!(PixelFormat::Astc2D8X5.block_width(), 8);
        assert_eq!(PixelFormat::Astc2D8X5.block_height(), 5);
        assert!(!PixelFormat::ABGR8U.is_compressed());
    }

    #[test]
    fn test_siblings_are_symmetric_and_bit_identical() {
        let siblings = SiblingTable::new();
        for i in 0..PixelFormat::COUNT {
            let format = PixelFormat::from_index(i);
            let sibling = siblings.get(format);
            assert_eq!(siblings.get(sibling), format);
            assert_eq!(sibling.bytes_per_block(), format.bytes_per_block());
        }
        assert!(siblings.are_siblings(PixelFormat::Z16, PixelFormat::R16U));
        assert!(siblings.are_siblings(PixelFormat::RG32F, PixelFormat::Z32FS8));
        assert!(!siblings.are_siblings(PixelFormat::ABGR8U, PixelFormat::ABGR8U));
        assert_eq!(siblings.get(PixelFormat::BGRA8), PixelFormat::BGRA8);
    }

    #[test]
    fn test_surface_types() {
        assert_eq!(PixelFormat::Z16.surface_type(), SurfaceType::Depth);
        assert_eq!(PixelFormat::Z24S8.surface_type(), SurfaceType::DepthStencil);
        assert_eq!(PixelFormat::R16U.surface_type(), SurfaceType::ColorTexture);
    }

    #[test]
    fn test_layered_targets() {
        assert!(SurfaceTarget::Texture2DArray.is_layered());
        assert!(SurfaceTarget::TextureCubemap.is_layered());
        assert!(!SurfaceTarget::Texture3D.is_layered());
        assert!(!SurfaceTarget::Texture2D.is_layered());
    }
}
