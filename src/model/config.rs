use serde::{Deserialize, Serialize};

use super::color::ListColor;

/// Configuration from lists.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: StorageConfig,
    #[serde(default)]
    pub lists: ListsConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File extension of list documents, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListsConfig {
    /// Color given to new lists when none is specified
    #[serde(default)]
    pub default_color: ListColor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Upper bound on concurrent content reads during color resolution
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Fetch colors for newly discovered lists right away
    #[serde(default = "default_true")]
    pub eager_colors: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            eager_colors: true,
        }
    }
}

fn default_extension() -> String {
    "list".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_true() -> bool {
    true
}
