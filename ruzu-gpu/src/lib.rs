// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU-side memory management for ruzu.
//!
//! Holds the GPU virtual address space and the texture cache that mirrors
//! guest surfaces onto host ones, along with the backend and rasterizer
//! interfaces the cache reports to.

pub mod backend;
pub mod memory_manager;
pub mod rasterizer;
pub mod texture_cache;
