//! Engine settings
//!
//! Where saves live and how they are written. Can be read from a JSON file
//! next to the application; anything missing falls back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::SAVES_DIR;

/// Settings consumed by [`crate::SaveEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // === Storage ===
    /// Application data directory; saves go in a subdirectory of it
    pub storage_base: PathBuf,
    /// Name of the saves subdirectory
    pub saves_dir: String,

    // === Stamping ===
    /// Written into every slot save as `ApplicationVersion`
    pub application_version: String,

    // === Encoding ===
    /// Pretty-print save files
    pub pretty: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::for_app(env!("CARGO_PKG_NAME"))
    }
}

impl EngineSettings {
    /// Defaults rooted in the platform data directory for `app_name`
    ///
    /// Falls back to the working directory on platforms without one.
    pub fn for_app(app_name: &str) -> Self {
        let base = dirs::data_dir()
            .map(|dir| dir.join(app_name))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            storage_base: base,
            saves_dir: SAVES_DIR.to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            pretty: true,
        }
    }

    pub fn with_storage_base(mut self, storage_base: impl Into<PathBuf>) -> Self {
        self.storage_base = storage_base.into();
        self
    }

    pub fn with_application_version(mut self, version: impl Into<String>) -> Self {
        self.application_version = version.into();
        self
    }

    /// Directory slot files are written to
    pub fn saves_root(&self) -> PathBuf {
        self.storage_base.join(&self.saves_dir)
    }

    /// Load settings from a JSON file
    ///
    /// A missing or unreadable file yields defaults; so does invalid JSON,
    /// with a warning.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    log::info!("Loaded engine settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring invalid settings file {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Using default engine settings");
                Self::default()
            }
        }
    }

    /// Write settings as JSON
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Engine settings saved to {}", path.display());
        Ok(())
    }
}
