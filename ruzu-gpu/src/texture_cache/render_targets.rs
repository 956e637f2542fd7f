// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bound color and depth render targets.

use bitflags::bitflags;

use super::surface::SurfaceRef;
use super::view::View;

/// Color render targets of the 3D engine.
pub const NUM_RENDER_TARGETS: usize = 8;

bitflags! {
    /// Render target slots whose registers changed since they were resolved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderTargetDirty: u32 {
        const COLOR0 = 1 << 0;
        const COLOR1 = 1 << 1;
        const COLOR2 = 1 << 2;
        const COLOR3 = 1 << 3;
        const COLOR4 = 1 << 4;
        const COLOR5 = 1 << 5;
        const COLOR6 = 1 << 6;
        const COLOR7 = 1 << 7;
        const ZETA   = 1 << 8;

        const COLORS = 0xFF;
    }
}

impl RenderTargetDirty {
    /// Flag of color slot `index`, empty if out of range.
    pub fn color(index: usize) -> Self {
        if index < NUM_RENDER_TARGETS {
            Self::from_bits_truncate(1 << index)
        } else {
            Self::empty()
        }
    }
}

/// Surface bound to a slot and the view handed out for it.
pub struct FramebufferTarget<S> {
    pub target: Option<SurfaceRef<S>>,
    pub view: Option<View<S>>,
}

impl<S> FramebufferTarget<S> {
    pub fn empty() -> Self {
        Self {
            target: None,
            view: None,
        }
    }

    /// Bind a new surface, moving the render target mark from the previous
    /// one.
    pub fn bind(&mut self, target: SurfaceRef<S>, view: View<S>) {
        if let Some(previous) = &self.target {
            previous.mark_as_render_target(false);
        }
        target.mark_as_render_target(true);
        self.target = Some(target);
        self.view = Some(view);
    }

    pub fn unbind(&mut self) {
        if let Some(previous) = self.target.take() {
            previous.mark_as_render_target(false);
        }
        self.view = None;
    }
}

impl<S> Default for FramebufferTarget<S> {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct RenderTargets<S> {
    pub colors: [FramebufferTarget<S>; NUM_RENDER_TARGETS],
    pub depth: FramebufferTarget<S>,
    pub dirty: RenderTargetDirty,
}

impl<S> RenderTargets<S> {
    /// All slots empty and dirty, so the first request resolves them.
    pub fn new() -> Self {
        Self {
            colors: std::array::from_fn(|_| FramebufferTarget::empty()),
            depth: FramebufferTarget::empty(),
            dirty: RenderTargetDirty::all(),
        }
    }

    pub fn color(&self, index: usize) -> Option<&FramebufferTarget<S>> {
        self.colors.get(index)
    }

    pub fn color_mut(&mut self, index: usize) -> Option<&mut FramebufferTarget<S>> {
        self.colors.get_mut(index)
    }

    /// Clear `flag` and report whether it was set.
    pub fn take_dirty(&mut self, flag: RenderTargetDirty) -> bool {
        let was_dirty = self.dirty.intersects(flag);
        self.dirty.remove(flag);
        was_dirty
    }
}

impl<S> Default for RenderTargets<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture_cache::surface::Surface;
    use crate::texture_cache::surface_params::{SurfaceParams, TextureInfo};
    use std::sync::Arc;

    fn surface() -> SurfaceRef<()> {
        let params = SurfaceParams::for_texture(&TextureInfo::default());
        Arc::new(Surface::new(0x1000, params, ()))
    }

    #[test]
    fn test_color_flags() {
        assert_eq!(RenderTargetDirty::color(0), RenderTargetDirty::COLOR0);
        assert_eq!(RenderTargetDirty::color(7), RenderTargetDirty::COLOR7);
        assert!(RenderTargetDirty::color(8).is_empty());
        assert!(RenderTargetDirty::COLORS.contains(RenderTargetDirty::COLOR5));
        assert!(!RenderTargetDirty::COLORS.contains(RenderTargetDirty::ZETA));
    }

    #[test]
    fn test_take_dirty_clears_once() {
        let mut slots: RenderTargets<()> = RenderTargets::new();
        assert!(slots.take_dirty(RenderTargetDirty::COLOR3));
        assert!(!slots.take_dirty(RenderTargetDirty::COLOR3));
        assert!(slots.take_dirty(RenderTargetDirty::ZETA));
    }

    #[test]
    fn test_rebind_moves_render_target_mark() {
        let mut slot = FramebufferTarget::empty();
        let a = surface();
        let b = surface();
        slot.bind(Arc::clone(&a), a.main_view());
        assert!(a.is_render_target());

        slot.bind(Arc::clone(&b), b.main_view());
        assert!(!a.is_render_target());
        assert!(b.is_render_target() && b.is_protected());

        slot.unbind();
        assert!(!b.is_render_target());
        assert!(slot.view.is_none());
    }
}
