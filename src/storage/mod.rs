//! Checksum/tag-addressed storage for imported binary assets (artwork and
//! related files): a physical storage root owned by [`FileStore`] plus the
//! `stored_files` catalog rows describing what lives in it.

mod models;
mod store;

pub use models::{StoreFileCommand, StorageError, StoredFile, TransferKind};
pub use store::FileStore;
