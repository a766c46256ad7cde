use std::fs;

use serde::Deserialize;

/// Settings read from `ember.toml` next to the executable's working
/// directory. Every field has a default so a missing or partial file
/// still yields a usable configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Ask for the validation layer; silently skipped when not installed.
    #[serde(default = "default_true")]
    pub validation: bool,
    /// Fixed-function toggles handed to pipeline creation.
    #[serde(default)]
    pub depth_test: bool,
    #[serde(default)]
    pub blend: bool,
    /// Root directory for desktop resource loading.
    #[serde(default = "default_resource_dir")]
    pub resource_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            width: default_width(),
            height: default_height(),
            validation: true,
            depth_test: false,
            blend: false,
            resource_dir: default_resource_dir(),
        }
    }
}

fn default_width() -> u32 {
    1024
}
fn default_height() -> u32 {
    768
}
fn default_true() -> bool {
    true
}
fn default_resource_dir() -> String {
    "resources".into()
}

pub fn load() -> AppConfig {
    match fs::read_to_string("ember.toml") {
        Ok(s) => toml::from_str::<AppConfig>(&s).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str("width = 640\nblend = true\n").unwrap();
        assert_eq!(cfg.width, 640);
        assert_eq!(cfg.height, 768);
        assert!(cfg.validation);
        assert!(!cfg.depth_test);
        assert!(cfg.blend);
        assert_eq!(cfg.resource_dir, "resources");
    }

    #[test]
    fn empty_file_is_the_default_config() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.width, AppConfig::default().width);
        assert_eq!(cfg.resource_dir, AppConfig::default().resource_dir);
    }
}
