//! fonoteca — content-addressable media storage and library reconciliation.
//!
//! The crate keeps three things consistent: a physical storage root of
//! imported binary assets (artwork), the relational catalog rows describing
//! them, and the media catalog (songs, albums, artists, genres) referencing
//! them. The filesystem is not transactional, so every physical mutation is
//! tied to the outcome of its catalog transaction (see [`db`]).

pub mod config;
pub mod db;
pub mod event_log;
pub mod file_types;
pub mod library;
pub mod paging;
pub mod storage;

// Re-export commonly used types for convenience
pub use db::Database;
pub use event_log::{EventSink, LogEvent, LogLevel, NullEventSink, SqliteEventLog};
pub use library::{
    LibraryManager, LibraryStore, LibraryWalker, WalkdirLibraryWalker, TAG_ARTWORK_EMBEDDED,
    TAG_ARTWORK_EXTERNAL,
};
pub use paging::{process_pages, Page, PageRequest};
pub use storage::{FileStore, StoreFileCommand, StorageError, StoredFile, TransferKind};
