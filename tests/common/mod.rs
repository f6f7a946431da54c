//! Common test infrastructure
//!
//! Builds the full stack (database, file store, library store, manager) on a
//! temporary directory, with test doubles for the metadata codec, the
//! library walker and the event sink.

#![allow(dead_code)]

use fonoteca::db::Database;
use fonoteca::event_log::{EventSink, LogEvent};
use fonoteca::library::{
    LibraryManager, LibraryStore, LibraryWalker, SongMetadata, SongMetadataCodec, SongPatch,
};
use fonoteca::paging::PageRequest;
use fonoteca::storage::FileStore;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Minimal PNG: the 8-byte signature plus filler so content sniffing sees a
/// real image file.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
];

/// Event sink keeping recorded events in memory for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn keys(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.key.clone())
            .collect()
    }

    pub fn count_key(&self, key: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.key == key)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Metadata codec backed by a map, so tests control exactly what tags a
/// given file "contains". Unconfigured paths read as empty metadata.
pub struct StubCodec {
    entries: Mutex<HashMap<PathBuf, SongMetadata>>,
}

impl StubCodec {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, path: impl Into<PathBuf>, metadata: SongMetadata) {
        self.entries.lock().unwrap().insert(path.into(), metadata);
    }
}

impl SongMetadataCodec for StubCodec {
    fn read(&self, path: &Path) -> anyhow::Result<SongMetadata> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    fn write(&self, path: &Path, patch: &SongPatch) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(path.to_path_buf()).or_default();
        if let Some(title) = &patch.title {
            entry.title = Some(title.clone());
        }
        if let Some(artist) = &patch.artist {
            entry.artist = Some(artist.clone());
        }
        if let Some(album) = &patch.album {
            entry.album = Some(album.clone());
        }
        if let Some(genre) = &patch.genre {
            entry.genre = Some(genre.clone());
        }
        if let Some(year) = patch.year {
            entry.year = Some(year);
        }
        Ok(())
    }
}

/// Walker returning a fixed snapshot of song paths.
pub struct FixedWalker {
    paths: Vec<PathBuf>,
}

impl FixedWalker {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl LibraryWalker for FixedWalker {
    fn discover_songs(&self) -> anyhow::Result<Vec<PathBuf>> {
        Ok(self.paths.clone())
    }
}

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub db: Database,
    pub files: Arc<FileStore>,
    pub library: LibraryStore,
    pub events: Arc<RecordingSink>,
    pub codec: Arc<StubCodec>,
    pub manager: LibraryManager,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("library.sqlite")).unwrap();
        let files =
            Arc::new(FileStore::new(db.clone(), dir.path().join("storage")).unwrap());
        let library = LibraryStore::new(db.clone());
        let events = Arc::new(RecordingSink::default());
        let codec = Arc::new(StubCodec::new());
        let events_sink: Arc<dyn EventSink> = events.clone();
        let codec_seam: Arc<dyn SongMetadataCodec> = codec.clone();
        let manager = LibraryManager::new(
            db.clone(),
            Arc::clone(&files),
            library.clone(),
            events_sink,
            codec_seam,
        );
        fs::create_dir_all(dir.path().join("music")).unwrap();
        Self {
            dir,
            db,
            files,
            library,
            events,
            codec,
            manager,
        }
    }

    pub fn music_dir(&self) -> PathBuf {
        self.dir.path().join("music")
    }

    /// Write a file under the music directory and return its path.
    pub fn write_music_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.music_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn song_count(&self) -> u64 {
        self.library
            .songs_page(PageRequest {
                number: 0,
                size: 1,
            })
            .unwrap()
            .total_elements
    }
}
