mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments subject to config-file resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub storage_root: Option<PathBuf>,
    pub library_roots: Vec<PathBuf>,
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub storage_root: PathBuf,
    pub library_roots: Vec<PathBuf>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and an optional TOML file.
    /// File values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in the config file")
            })?;

        let storage_root = file
            .storage_root
            .map(PathBuf::from)
            .or_else(|| cli.storage_root.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "storage_root must be specified via --storage-root or in the config file"
                )
            })?;

        let library_roots: Vec<PathBuf> = file
            .library_roots
            .map(|roots| roots.into_iter().map(PathBuf::from).collect())
            .unwrap_or_else(|| cli.library_roots.clone());

        for root in &library_roots {
            if !root.is_dir() {
                bail!("Library root is not a directory: {:?}", root);
            }
        }

        Ok(Self {
            db_path,
            storage_root,
            library_roots,
        })
    }
}
