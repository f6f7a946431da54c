use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The save command references a missing or directory source. Nothing
    /// was mutated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem copy/move/mkdir failure. Any partially written target has
    /// been cleaned up best-effort before this surfaced.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// How the source file reaches the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Source file is retained.
    Copy,
    /// Source file is removed after the transfer.
    Move,
}

/// Input to [`FileStore::save`](super::FileStore::save).
#[derive(Debug, Clone)]
pub struct StoreFileCommand {
    pub source: PathBuf,
    pub transfer: TransferKind,
    /// Display name; the source file name is used when absent.
    pub name: Option<String>,
    pub mime_type: String,
    pub checksum: String,
    /// Logical bucket, e.g. external vs embedded artwork.
    pub tag: String,
    /// Opaque caller data, e.g. the external source path of an artwork file.
    pub user_data: Option<String>,
}

impl StoreFileCommand {
    pub fn new(
        source: impl Into<PathBuf>,
        transfer: TransferKind,
        mime_type: impl Into<String>,
        checksum: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            transfer,
            name: None,
            mime_type: mime_type.into(),
            checksum: checksum.into(),
            tag: tag.into(),
            user_data: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }
}

/// Catalog row describing one stored physical asset. The physical file lives
/// under the storage root at `relative_path`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub id: i64,
    pub name: Option<String>,
    pub mime_type: String,
    pub checksum: String,
    pub size: i64,
    pub tag: String,
    pub user_data: Option<String>,
    pub relative_path: String,
    pub created_at: DateTime<Utc>,
}
