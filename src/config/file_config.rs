//! Optional TOML configuration file. Values present in the file override
//! the corresponding CLI arguments.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Path to the SQLite library database file.
    pub db_path: Option<String>,
    /// Directory owning the physical file storage (`<root>/files`).
    pub storage_root: Option<String>,
    /// Library root directories to walk for song files.
    pub library_roots: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
