use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facemark_core::camera::domain::camera_config::ResizeMethod;
use facemark_core::detection::infrastructure::backend::Backend;
use facemark_core::detection::infrastructure::onnx_blazeface_detector::{DEFAULT_CONFIDENCE, DEFAULT_MAX_FACES};
use facemark_core::shared::constants::APP_DIR_NAME;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device_index: u32,
    pub confidence: f64,
    pub max_faces: usize,
    pub backend: Backend,
    pub resize_method: ResizeMethod,
    /// Overrides the platform mirroring convention when set.
    pub mirror: Option<bool>,
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_index: 0,
            confidence: DEFAULT_CONFIDENCE,
            max_faces: DEFAULT_MAX_FACES,
            backend: Backend::Auto,
            resize_method: ResizeMethod::Filtered,
            mirror: None,
            model_path: None,
            model_url: None,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_or_init(&path))
            .unwrap_or_default()
    }

    /// Like [`Settings::load_from`], but writes the defaults on first launch
    /// so there is a file to edit.
    fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save_to(path);
            return defaults;
        }
        Self::load_from(path)
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not serialize settings: {e}"),
        }
    }
}
