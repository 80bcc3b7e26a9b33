use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Plutonium ImGui".to_string(),
            x: 50,
            y: 50,
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// -1 picks automatically; 0 Vulkan, 1 Metal, 2 OpenGL, 3 Direct3D.
    pub backend: i32,
    pub clear_color: [f32; 3],
    pub vsync: bool,
    /// Multi-viewport support. Unset means on for Vulkan only.
    pub viewports: Option<bool>,
    pub docking: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: -1,
            clear_color: [0.45, 0.55, 0.6],
            vsync: true,
            viewports: None,
            docking: true,
        }
    }
}

impl RendererConfig {
    pub fn clear_rgba(&self) -> [f32; 4] {
        let [r, g, b] = self.clear_color;
        [r, g, b, 1.0]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    /// Window icon; defaults to `Icon.png` next to the executable.
    pub icon_path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                info!("loaded config from {}", path.display());
                Self::from_json_str(&json)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} not found, using default config", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn resolved_icon_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.icon_path {
            return Some(path.clone());
        }
        let exe = std::env::current_exe().ok()?;
        Some(exe.parent()?.join("Icon.png"))
    }
}
