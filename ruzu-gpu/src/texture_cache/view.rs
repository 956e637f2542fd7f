// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::sync::{Arc, Weak};

use super::format::SurfaceTarget;
use super::surface::Surface;

/// Layer/level window and target reinterpretation of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewParams {
    pub target: SurfaceTarget,
    pub base_layer: u32,
    pub num_layers: u32,
    pub base_level: u32,
    pub num_levels: u32,
}

impl ViewParams {
    pub fn new(
        target: SurfaceTarget,
        base_layer: u32,
        num_layers: u32,
        base_level: u32,
        num_levels: u32,
    ) -> Self {
        Self {
            target,
            base_layer,
            num_layers,
            base_level,
            num_levels,
        }
    }

    pub fn is_layered(&self) -> bool {
        self.target.is_layered()
    }
}

/// Non-owning handle to a window of a cached surface.
///
/// A view is only meaningful until the next call that mutates the cache:
/// once its surface is unregistered it may be recycled under another
/// address, and once the surface is dropped [`View::surface`] returns `None`.
pub struct View<S> {
    surface: Weak<Surface<S>>,
    params: ViewParams,
}

impl<S> View<S> {
    pub(crate) fn new(surface: &Arc<Surface<S>>, params: ViewParams) -> Self {
        Self {
            surface: Arc::downgrade(surface),
            params,
        }
    }

    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn surface(&self) -> Option<Arc<Surface<S>>> {
        self.surface.upgrade()
    }

    /// Whether this view looks into `surface`.
    pub fn is_of(&self, surface: &Arc<Surface<S>>) -> bool {
        Weak::ptr_eq(&self.surface, &Arc::downgrade(surface))
    }
}

impl<S> Clone for View<S> {
    fn clone(&self) -> Self {
        Self {
            surface: Weak::clone(&self.surface),
            params: self.params,
        }
    }
}

impl<S> fmt::Debug for View<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("params", &self.params)
            .field("alive", &(self.surface.strong_count() > 0))
            .finish()
    }
}
