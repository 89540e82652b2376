//! Configuration loading and management
//!
//! Handles parsing of `tasksync.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Documents configuration
    #[serde(default)]
    pub docs: DocsConfig,

    /// Notification bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// Mirror worker configuration
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Layout descriptor configuration
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Self-write suppression window in milliseconds: a document write
    /// performed by the engine is not re-ingested by the watcher within
    /// this window.
    #[serde(default = "default_suppress_window_ms")]
    pub suppress_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs: DocsConfig::default(),
            bus: BusConfig::default(),
            mirror: MirrorConfig::default(),
            layout: LayoutConfig::default(),
            suppress_window_ms: default_suppress_window_ms(),
        }
    }
}

fn default_suppress_window_ms() -> u64 {
    2000
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Subdirectory holding one markdown file per task
    #[serde(default = "default_docs_dir")]
    pub dir: String,

    /// Document file extension (without the dot)
    #[serde(default = "default_docs_extension")]
    pub extension: String,
}

fn default_docs_dir() -> String {
    "flows".to_string()
}

fn default_docs_extension() -> String {
    "md".to_string()
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            dir: default_docs_dir(),
            extension: default_docs_extension(),
        }
    }
}

/// Notification bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Address the relay listens on (serve) or connects to (mirror)
    #[serde(default = "default_bus_addr")]
    pub addr: String,

    /// Broadcast channel capacity; slow subscribers past this lag drop
    /// events
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

fn default_bus_addr() -> String {
    "127.0.0.1:7440".to_string()
}

fn default_bus_capacity() -> usize {
    256
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            addr: default_bus_addr(),
            capacity: default_bus_capacity(),
        }
    }
}

/// Mirror worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Root of the mirrored document tree
    #[serde(default = "default_mirror_dir")]
    pub dir: String,
}

fn default_mirror_dir() -> String {
    "mirror".to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            dir: default_mirror_dir(),
        }
    }
}

/// Layout descriptor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Path of the graph layout descriptor, relative to the workspace
    #[serde(default = "default_layout_file")]
    pub file: String,
}

fn default_layout_file() -> String {
    "config/layout.json".to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            file: default_layout_file(),
        }
    }
}

/// Name of the configuration file inside a workspace
pub const CONFIG_FILE: &str = "tasksync.toml";

impl Config {
    /// Load configuration from a `tasksync.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a workspace root, or return defaults
    pub fn load_from_workspace(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        validate_subdir(&self.docs.dir, "docs.dir")?;
        validate_subdir(&self.mirror.dir, "mirror.dir")?;

        let ext = self.docs.extension.trim();
        if ext.is_empty() || !ext.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(crate::error::Error::InvalidConfig(
                "docs.extension must be alphanumeric".to_string(),
            ));
        }

        if self.bus.addr.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "bus.addr cannot be empty".to_string(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "bus.capacity must be > 0".to_string(),
            ));
        }

        if self.layout.file.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "layout.file cannot be empty".to_string(),
            ));
        }
        if Path::new(&self.layout.file).is_absolute() {
            return Err(crate::error::Error::InvalidConfig(
                "layout.file must be relative to the workspace".to_string(),
            ));
        }

        if self.suppress_window_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "suppress_window_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the document directory under a workspace root
    pub fn docs_root(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.docs.dir)
    }

    /// Resolve the mirror document directory under a mirror root
    pub fn mirror_docs_root(&self, mirror_root: &Path) -> PathBuf {
        mirror_root.join(&self.docs.dir)
    }

    /// Resolve the layout descriptor path under a root
    pub fn layout_path(&self, root: &Path) -> PathBuf {
        root.join(&self.layout.file)
    }
}

fn validate_subdir(value: &str, field: &str) -> crate::error::Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::Error::InvalidConfig(format!(
            "{field} cannot be empty"
        )));
    }
    if Path::new(trimmed).is_absolute() || trimmed.contains("..") {
        return Err(crate::error::Error::InvalidConfig(format!(
            "{field} must be a relative path without '..'"
        )));
    }
    Ok(())
}
