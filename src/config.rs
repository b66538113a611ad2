// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Configuration management.
//!
//! Config values are loaded with the following priority (highest to lowest):
//! 1. Environment variables (BARKS_*)
//! 2. Config file (~/.config/barks/config.toml)
//! 3. Default values

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog_path: Option<PathBuf>,
    pub fallback_image: Option<PathBuf>,
    pub fallback_title: String,
    pub recent_capacity: usize,
    pub resize_filter: String,
    pub log_file: Option<PathBuf>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            fallback_image: None,
            fallback_title: "lost-in-the-andes".to_string(),
            recent_capacity: 100,
            resize_filter: "triangle".to_string(),
            log_file: None,
            debug: false,
        }
    }
}

/// Parse filter type string to image::imageops::FilterType.
/// Returns Triangle as fallback for invalid values.
pub fn parse_filter_type(s: &str) -> image::imageops::FilterType {
    let s = s.trim();
    if s.eq_ignore_ascii_case("nearest") {
        image::imageops::FilterType::Nearest
    } else if s.eq_ignore_ascii_case("triangle") {
        image::imageops::FilterType::Triangle
    } else if s.eq_ignore_ascii_case("catmullrom") || s.eq_ignore_ascii_case("catmull-rom") {
        image::imageops::FilterType::CatmullRom
    } else if s.eq_ignore_ascii_case("gaussian") {
        image::imageops::FilterType::Gaussian
    } else if s.eq_ignore_ascii_case("lanczos3") || s.eq_ignore_ascii_case("lanczos") {
        image::imageops::FilterType::Lanczos3
    } else {
        image::imageops::FilterType::Triangle
    }
}

impl Config {
    /// Load config with priority: env vars > config file > defaults
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config.clamp_values();
        config
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("barks").join("config.toml"))
    }

    fn load_from_file() -> Option<Self> {
        let path = Self::config_path()?;
        let content = std::fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BARKS_CATALOG") {
            self.catalog_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("BARKS_FALLBACK_IMAGE") {
            self.fallback_image = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("BARKS_FALLBACK_TITLE") {
            self.fallback_title = v;
        }
        if let Some(v) = Self::parse_env::<usize>("BARKS_RECENT_CAPACITY") {
            self.recent_capacity = v;
        }
        if let Ok(v) = std::env::var("BARKS_RESIZE_FILTER") {
            self.resize_filter = v;
        }
        if let Ok(v) = std::env::var("BARKS_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if std::env::var_os("BARKS_DEBUG").is_some() {
            self.debug = true;
        }
    }

    fn clamp_values(&mut self) {
        const MAX_RECENT_CAPACITY: usize = 500;

        self.recent_capacity = self.recent_capacity.clamp(1, MAX_RECENT_CAPACITY);
    }

    fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok()?.parse().ok()
    }
}
