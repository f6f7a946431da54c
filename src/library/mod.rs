//! The media catalog (songs, albums, artists, genres) and the maintenance
//! operations that keep it consistent with the filesystem and the stored
//! artwork it references.

mod manager;
mod metadata;
mod models;
mod store;
mod walker;

pub use manager::{LibraryManager, SongImportOutcome, TAG_ARTWORK_EMBEDDED, TAG_ARTWORK_EXTERNAL};
pub use metadata::{EmbeddedArtwork, FileNameMetadataCodec, SongMetadata, SongMetadataCodec, SongPatch};
pub use models::{Album, Artist, Genre, NewSong, Song};
pub use store::LibraryStore;
pub use walker::{LibraryWalker, WalkdirLibraryWalker};
