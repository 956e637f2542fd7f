// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Texture cache: guest GPU surfaces mirrored as host surfaces.
//!
//! ## Modules
//!
//! - `format` - pixel formats, targets and the sibling table
//! - `surface_params` - surface shape, guest layout math and shape matching
//! - `surface` / `view` - cached surfaces and sub-range views of them
//! - `registry` / `reserve` - address lookup and reuse of dropped surfaces
//! - `render_targets` - bound color/depth slots and their dirty flags
//! - `cache` - the engine tying it together

pub mod cache;
pub mod copy_params;
pub mod format;
pub mod registry;
pub mod render_targets;
pub mod reserve;
pub mod staging;
pub mod surface;
pub mod surface_params;
pub mod view;

use ruzu_common::settings::Settings;

pub use cache::TextureCache;
pub use copy_params::{BlitConfig, BlitFilter, BlitOperation, CopyParams, Rect};
pub use format::{ComponentType, PixelFormat, SiblingTable, SurfaceTarget, SurfaceType};
pub use render_targets::{RenderTargetDirty, NUM_RENDER_TARGETS};
pub use surface::{Surface, SurfaceRef};
pub use surface_params::{
    DepthBufferInfo, FermiSurface, MatchStructureResult, MatchTopologyResult, RenderTargetInfo,
    SurfaceParams, TextureInfo,
};
pub use view::{View, ViewParams};

/// Construction options of a [`TextureCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCacheConfig {
    /// Disable heuristics that may fabricate surface contents.
    pub accurate_gpu: bool,
    /// Staging buffers to allocate; at least two are always kept.
    pub staging_buffers: usize,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            accurate_gpu: false,
            staging_buffers: 2,
        }
    }
}

impl From<&Settings> for TextureCacheConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            accurate_gpu: settings.use_accurate_gpu_emulation,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let mut settings = Settings::default();
        assert_eq!(TextureCacheConfig::from(&settings), TextureCacheConfig::default());

        settings.use_accurate_gpu_emulation = true;
        let config = TextureCacheConfig::from(&settings);
        assert!(config.accurate_gpu);
        assert_eq!(config.staging_buffers, 2);
    }
}
