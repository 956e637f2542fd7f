// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod config;
pub mod settings;
pub mod types;

pub use types::*;
