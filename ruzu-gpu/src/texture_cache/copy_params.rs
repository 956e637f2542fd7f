// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Parameters handed to the backend for surface-to-surface transfers.

/// One rectangular region copied between two surfaces of the same class.
///
/// `*_z` is the array layer for layered surfaces and the volume slice
/// otherwise. Dimensions are in destination texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyParams {
    pub source_x: u32,
    pub source_y: u32,
    pub source_z: u32,
    pub dest_x: u32,
    pub dest_y: u32,
    pub dest_z: u32,
    pub source_level: u32,
    pub dest_level: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl CopyParams {
    /// Copy `depth` slices of `level` from the origin of both surfaces.
    pub fn level(width: u32, height: u32, depth: u32, level: u32) -> Self {
        Self {
            source_level: level,
            dest_level: level,
            width,
            height,
            depth,
            ..Self::default()
        }
    }

    /// Copy one layer of `level` onto the same layer of the destination.
    pub fn layer_level(width: u32, height: u32, layer: u32, level: u32) -> Self {
        Self {
            source_z: layer,
            dest_z: layer,
            source_level: level,
            dest_level: level,
            width,
            height,
            depth: 1,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlitFilter {
    #[default]
    Point,
    Linear,
}

/// Fermi 2D raster operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlitOperation {
    SrcCopyAnd,
    RopAnd,
    Blend,
    #[default]
    SrcCopy,
    Rop,
    SrcCopyPremult,
    BlendPremult,
}

/// Half-open texel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// A Fermi 2D blit request between two views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlitConfig {
    pub filter: BlitFilter,
    pub operation: BlitOperation,
    pub src_rect: Rect,
    pub dst_rect: Rect,
}
