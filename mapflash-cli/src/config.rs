//! Configuration file support for mapflash.
//!
//! Configuration is loaded with the following priority (highest first):
//! 1. `--config <PATH>` on the command line
//! 2. Local config file (`./mapflash.toml`)
//! 3. Global config file (`~/.config/mapflash/config.toml`)
//!
//! The configuration names the device's sections, timeouts, and erase
//! parameters:
//!
//! ```toml
//! read_timeout_ms = 1000
//! write_timeout_ms = 1000
//!
//! [erase]
//! virtual_trigger = 0x0000_FFF0
//! physical_trigger = 0x0000_FFF4
//! timeout_ms = 500
//! sector_size = 0x1000
//!
//! [erase.kind]
//! code = 0x01
//! name = "NOR"
//! sector_size = 0x1000
//!
//! [[sections]]
//! name = "firmware"
//! address = 0x0080_0000
//! size = 0x0004_0000
//! virtual = false
//! big_endian_header = false
//! ```

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use log::{debug, warn};
use mapflash::{EraseConfig, MemoryKind, Section};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_timeout_ms() -> u64 {
    1000
}

/// Erase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraseSettings {
    /// Trigger address for erasing virtual sections.
    pub virtual_trigger: u32,
    /// Trigger address for erasing physical sections.
    pub physical_trigger: u32,
    /// Per-sector erase delay in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Sector size in bytes when no memory kind is configured.
    pub sector_size: u32,
    /// Expected memory kind, checked against the device before erasing.
    #[serde(default)]
    pub kind: Option<KindSettings>,
}

impl Default for EraseSettings {
    fn default() -> Self {
        Self {
            virtual_trigger: 0x0000_FFF0,
            physical_trigger: 0x0000_FFF4,
            timeout_ms: default_timeout_ms(),
            sector_size: 0x1000,
            kind: None,
        }
    }
}

/// Memory kind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindSettings {
    /// Kind code as reported by the device.
    pub code: u8,
    /// Human-readable name.
    pub name: String,
    /// Erase sector size in bytes.
    pub sector_size: u32,
}

/// One named section of the device address space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSettings {
    /// Section name used on the command line.
    pub name: String,
    /// Base address.
    pub address: u32,
    /// Capacity in bytes.
    pub size: u32,
    /// Virtual (translated) vs physical addressing.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    /// Big-endian file headers in this section.
    #[serde(default)]
    pub big_endian_header: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reply timeout for read requests in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Reply timeout for write requests in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Erase settings.
    #[serde(default)]
    pub erase: EraseSettings,
    /// Known sections.
    #[serde(default)]
    pub sections: Vec<SectionSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            erase: EraseSettings::default(),
            sections: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default locations.
    pub fn load() -> Self {
        let local = Path::new("mapflash.toml");
        if local.exists() {
            if let Some(config) = Self::load_from_file(local) {
                debug!("Loaded config from mapflash.toml");
                return config;
            }
        }

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(config) = Self::load_from_file(&global_path) {
                    debug!("Loaded config from {}", global_path.display());
                    return config;
                }
            }
        }

        debug!("No config file found, using defaults");
        Self::default()
    }

    /// Load configuration from an explicit path (`--config` flag).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {e}", path.display());
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {e}", path.display());
                None
            },
        }
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mapflash").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Result<Section> {
        let settings = self
            .sections
            .iter()
            .find(|s| s.name == name)
            .with_context(|| {
                let known: Vec<&str> = self.sections.iter().map(|s| s.name.as_str()).collect();
                format!(
                    "unknown section \"{name}\" (known sections: {})",
                    if known.is_empty() {
                        "none configured".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            })?;

        Ok(Section {
            name: settings.name.clone(),
            address: settings.address,
            size: settings.size,
            is_virtual: settings.is_virtual,
            big_endian_header: settings.big_endian_header,
        })
    }

    /// Erase configuration for the library.
    pub fn erase_config(&self) -> EraseConfig {
        EraseConfig {
            virtual_trigger: self.erase.virtual_trigger,
            physical_trigger: self.erase.physical_trigger,
            sector_timeout: Duration::from_millis(self.erase.timeout_ms),
            kind: self.erase.kind.as_ref().map(|k| MemoryKind {
                code: k.code,
                name: k.name.clone(),
                sector_size: k.sector_size,
            }),
            sector_size: self.erase.sector_size,
        }
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
