// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! INI configuration loading.
//!
//! Reads the subset of yuzu's `sdl2-config.ini` keys that the GPU side cares
//! about into [`Settings`].

use std::path::{Path, PathBuf};

use ini::Ini;
use log::{debug, info, warn};
use thiserror::Error;

use crate::settings::{parse_bool, RendererBackend, Settings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },
    #[error("invalid value {value:?} for [{section}] {key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Locate the yuzu sdl2-config.ini file.
pub fn find_config_path() -> Option<PathBuf> {
    // Windows: %APPDATA%\yuzu\sdl2-config.ini
    if let Ok(appdata) = std::env::var("APPDATA") {
        let path = PathBuf::from(&appdata).join("yuzu").join("sdl2-config.ini");
        if path.exists() {
            return Some(path);
        }
    }

    // XDG_CONFIG_HOME
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(&xdg).join("yuzu").join("sdl2-config.ini");
        if path.exists() {
            return Some(path);
        }
    }

    // Linux: ~/.config/yuzu/sdl2-config.ini
    if let Ok(home) = std::env::var("HOME") {
        let path = PathBuf::from(&home)
            .join(".config")
            .join("yuzu")
            .join("sdl2-config.ini");
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load settings, falling back to defaults on any problem.
pub fn load_config(path: Option<&Path>) -> Settings {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => match find_config_path() {
            Some(p) => p,
            None => {
                info!("No yuzu config found, using defaults");
                return Settings::default();
            }
        },
    };

    match load_config_file(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{}, using defaults", e);
            Settings::default()
        }
    }
}

/// Load settings from a specific INI file.
pub fn load_config_file(path: &Path) -> Result<Settings, ConfigError> {
    info!("Loading config from: {}", path.display());
    let conf = Ini::load_from_file(path).map_err(|source| ConfigError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    settings_from_ini(&conf)
}

/// Apply the recognised keys of an already-parsed INI document.
pub fn settings_from_ini(conf: &Ini) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    // [Renderer]
    if let Some(section) = conf.section(Some("Renderer")) {
        if let Some(backend) = section.get("backend") {
            settings.renderer_backend = RendererBackend::from_str_or_default(backend);
            debug!("Renderer backend: {:?}", settings.renderer_backend);
        }
        if let Some(res) = section.get("resolution_factor") {
            settings.resolution_factor =
                res.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        section: "Renderer",
                        key: "resolution_factor",
                        value: res.to_string(),
                    })?;
        }
        if let Some(accurate) = section.get("use_accurate_gpu_emulation") {
            settings.use_accurate_gpu_emulation =
                parse_bool(accurate).ok_or_else(|| ConfigError::InvalidValue {
                    section: "Renderer",
                    key: "use_accurate_gpu_emulation",
                    value: accurate.to_string(),
                })?;
            debug!("Accurate GPU emulation: {}", settings.use_accurate_gpu_emulation);
        }
    }

    // [Debugging]
    if let Some(section) = conf.section(Some("Debugging")) {
        if let Some(debug_log) = section.get("use_debug_logging") {
            settings.use_debug_logging = parse_bool(debug_log).unwrap_or(true);
        }
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_section() {
        let conf = Ini::load_from_str(
            "[Renderer]\nbackend = 2\nresolution_factor = 3\nuse_accurate_gpu_emulation = true\n",
        )
        .unwrap();
        let settings = settings_from_ini(&conf).unwrap();
        assert_eq!(settings.renderer_backend, RendererBackend::Null);
        assert_eq!(settings.resolution_factor, 3);
        assert!(settings.use_accurate_gpu_emulation);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let conf = Ini::load_from_str("[System]\nlanguage_index = 1\n").unwrap();
        let settings = settings_from_ini(&conf).unwrap();
        assert!(!settings.use_accurate_gpu_emulation);
        assert_eq!(settings.renderer_backend, RendererBackend::Vulkan);
    }

    #[test]
    fn test_invalid_accuracy_value() {
        let conf = Ini::load_from_str("[Renderer]\nuse_accurate_gpu_emulation = sometimes\n").unwrap();
        let err = settings_from_ini(&conf).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "use_accurate_gpu_emulation",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_config_file(Path::new("/nonexistent/ruzu/sdl2-config.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn test_load_config_falls_back() {
        let settings = load_config(Some(Path::new("/nonexistent/ruzu/sdl2-config.ini")));
        assert_eq!(settings.resolution_factor, 1);
    }
}
