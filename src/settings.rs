use crate::atlas::PackerConfig;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasSettings {
    #[serde(default)]
    pub packer: PackerConfig,
    #[serde(default = "AtlasSettings::default_settle_frames")]
    pub settle_frames: u32,
    #[serde(default = "AtlasSettings::default_clear_color")]
    pub clear_color: [u8; 4],
}

impl Default for AtlasSettings {
    fn default() -> Self {
        Self {
            packer: PackerConfig::default(),
            settle_frames: Self::default_settle_frames(),
            clear_color: Self::default_clear_color(),
        }
    }
}

impl AtlasSettings {
    pub fn load() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            info!("Using default atlas settings for WebAssembly build");
            return Self::default();
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::load_from_path("atlas_settings.json")
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    "Failed to parse {:?} ({}). Falling back to default atlas settings.",
                    path, err
                );
                AtlasSettings::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Atlas settings file {:?} not found. Using default settings.",
                    path
                );
                AtlasSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default atlas settings.",
                    path, err
                );
                AtlasSettings::default()
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<AtlasSettings>(contents).map(Self::validate)
    }

    fn validate(mut self) -> Self {
        let defaults = PackerConfig::default();

        if self.packer.max_width == 0 || self.packer.max_height == 0 {
            warn!("Atlas bound must be greater than zero. Using default bound.");
            self.packer.max_width = defaults.max_width;
            self.packer.max_height = defaults.max_height;
        }

        if self.packer.padding >= self.packer.max_width.min(self.packer.max_height) {
            warn!(
                "Atlas padding {} leaves no room for sprites. Using default padding.",
                self.packer.padding
            );
            self.packer.padding = defaults.padding;
        }

        self
    }

    const fn default_settle_frames() -> u32 {
        3
    }

    const fn default_clear_color() -> [u8; 4] {
        [0, 0, 0, 0]
    }
}
