use crate::file_types;
use anyhow::Result;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Produces, on demand, the set of currently discoverable song files under
/// the configured library roots. `clean_songs` treats this as the source of
/// truth for what still exists on disk.
pub trait LibraryWalker: Send + Sync {
    fn discover_songs(&self) -> Result<Vec<PathBuf>>;
}

/// Filesystem walker over one or more library root directories, keeping
/// files with a known audio extension.
pub struct WalkdirLibraryWalker {
    roots: Vec<PathBuf>,
}

impl WalkdirLibraryWalker {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl LibraryWalker for WalkdirLibraryWalker {
    fn discover_songs(&self) -> Result<Vec<PathBuf>> {
        let mut songs = Vec::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = entry?;
                if entry.file_type().is_file() && file_types::is_audio_file(entry.path()) {
                    songs.push(entry.path().to_path_buf());
                }
            }
        }
        Ok(songs)
    }
}
