// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// Global emulator settings, populated from config INI.
#[derive(Debug, Clone)]
pub struct Settings {
    // Renderer
    pub renderer_backend: RendererBackend,
    pub resolution_factor: u32,
    /// Trade speed for correctness in the GPU caches: no heuristic rebuilds,
    /// no partial reconstruction, always flush before recycling.
    pub use_accurate_gpu_emulation: bool,

    // Debug
    pub use_debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            renderer_backend: RendererBackend::Vulkan,
            resolution_factor: 1,
            use_accurate_gpu_emulation: false,
            use_debug_logging: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererBackend {
    Vulkan,
    OpenGl,
    Null,
}

impl RendererBackend {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "0" | "opengl" => Self::OpenGl,
            "1" | "vulkan" => Self::Vulkan,
            "2" | "null" => Self::Null,
            _ => Self::Vulkan,
        }
    }
}

/// Parse an INI boolean the way yuzu writes them (`true`/`false`/`1`/`0`).
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(RendererBackend::from_str_or_default("0"), RendererBackend::OpenGl);
        assert_eq!(RendererBackend::from_str_or_default(" Null "), RendererBackend::Null);
        assert_eq!(RendererBackend::from_str_or_default("bogus"), RendererBackend::Vulkan);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_defaults_are_fast_path() {
        let settings = Settings::default();
        assert!(!settings.use_accurate_gpu_emulation);
        assert_eq!(settings.resolution_factor, 1);
    }
}
